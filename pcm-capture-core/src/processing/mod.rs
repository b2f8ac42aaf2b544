pub mod sample_gain;
pub mod wav_format;
