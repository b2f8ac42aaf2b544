pub mod container_encoder;
pub mod metadata;
pub mod raw_stream_writer;
