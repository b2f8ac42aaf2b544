use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::state::TerminationReason;
use crate::processing::sample_gain::GainParameters;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_source::{CaptureSource, ReadOutcome};

/// Summary of one drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterReport {
    pub reason: TerminationReason,
    pub bytes_written: u64,
    pub read_errors: u64,
}

/// Drains a capture source into an append-only sink.
///
/// The sink receives headerless PCM exactly as read (or gain-limited when
/// `gain` is set). Bytes are only ever appended; nothing written is revisited.
///
/// Read errors are reported to the delegate and the loop keeps going. Only a
/// stop request or the source leaving its recording state ends it.
pub struct RawStreamWriter {
    buffer_size: usize,
    gain: Option<GainParameters>,
    stop_requested: Arc<AtomicBool>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
}

impl RawStreamWriter {
    pub fn new(buffer_size: usize, gain: Option<GainParameters>) -> Self {
        Self {
            buffer_size: buffer_size.max(2),
            gain,
            stop_requested: Arc::new(AtomicBool::new(false)),
            delegate: None,
        }
    }

    pub fn with_delegate(mut self, delegate: Arc<dyn CaptureDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Flag checked before every read; raising it ends the loop.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_requested)
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Run the drain loop until stopped, then flush and close `sink`.
    ///
    /// A failed write to the sink ends the loop with `IoError`.
    pub fn run<S, W>(&self, source: &mut S, mut sink: W) -> Result<WriterReport, CaptureError>
    where
        S: CaptureSource + ?Sized,
        W: Write,
    {
        // One spare byte in front holds a half sample carried over from the
        // previous read when gain is applied.
        let mut buf = vec![0u8; self.buffer_size + 1];
        let mut carry: Option<u8> = None;
        let mut bytes_written = 0u64;
        let mut read_errors = 0u64;

        log::debug!(
            "Draining {} ({} byte reads, gain {:?})",
            source.description(),
            self.buffer_size,
            self.gain.map(|g| g.scale)
        );

        let reason = loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                break TerminationReason::StoppedByRequest;
            }
            if !source.is_recording() {
                break TerminationReason::SourceEnded;
            }

            let offset = match carry {
                Some(byte) => {
                    buf[0] = byte;
                    1
                }
                None => 0,
            };

            match source.read(&mut buf[offset..offset + self.buffer_size]) {
                ReadOutcome::Data(n) => {
                    let filled = offset + n.min(self.buffer_size);
                    let chunk = &mut buf[..filled];

                    let ready = match &self.gain {
                        Some(gain) => {
                            let even = filled & !1;
                            gain.apply_le_bytes(&mut chunk[..even]);
                            carry = (even < filled).then(|| chunk[even]);
                            even
                        }
                        None => {
                            carry = None;
                            filled
                        }
                    };

                    if ready > 0 {
                        sink.write_all(&chunk[..ready])
                            .map_err(|e| CaptureError::IoError(format!("raw stream write failed: {}", e)))?;
                        bytes_written += ready as u64;
                    }
                }
                ReadOutcome::Error(code) => {
                    read_errors += 1;
                    log::warn!("Capture read returned {}", code);
                    if let Some(ref delegate) = self.delegate {
                        delegate.on_error(&CaptureError::TransientRead(code));
                    }
                }
            }
        };

        if let Some(byte) = carry {
            sink.write_all(&[byte])
                .map_err(|e| CaptureError::IoError(format!("raw stream write failed: {}", e)))?;
            bytes_written += 1;
        }

        sink.flush()
            .map_err(|e| CaptureError::IoError(format!("raw stream flush failed: {}", e)))?;
        drop(sink);

        log::info!(
            "Capture loop ended ({:?}): {} bytes written, {} read errors",
            reason,
            bytes_written,
            read_errors
        );

        Ok(WriterReport {
            reason,
            bytes_written,
            read_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    use parking_lot::Mutex;

    use crate::models::error::ReadError;
    use crate::models::state::CaptureState;
    use crate::traits::capture_source::RecordingSwitch;

    enum Step {
        Data(Vec<u8>),
        Fail(ReadError),
    }

    /// Plays back a fixed script of reads, then leaves the recording state.
    struct ScriptedSource {
        switch: RecordingSwitch,
        script: VecDeque<Step>,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Step>) -> Self {
            let switch = RecordingSwitch::new();
            switch.turn_on();
            Self {
                switch,
                script: script.into(),
                reads: 0,
            }
        }
    }

    impl CaptureSource for ScriptedSource {
        fn switch(&self) -> RecordingSwitch {
            self.switch.clone()
        }

        fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
            self.reads += 1;
            match self.script.pop_front() {
                Some(Step::Data(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    ReadOutcome::Data(data.len())
                }
                Some(Step::Fail(code)) => ReadOutcome::Error(code),
                None => {
                    self.switch.turn_off();
                    ReadOutcome::Data(0)
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingDelegate {
        errors: Mutex<Vec<CaptureError>>,
    }

    impl CaptureDelegate for RecordingDelegate {
        fn on_state_changed(&self, _state: &CaptureState) {}

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }

        fn on_capture_finished(&self, _state: &CaptureState) {}
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn passthrough_writes_exactly_what_was_read() {
        let mut source = ScriptedSource::new(vec![
            Step::Data(vec![1, 2, 3, 4]),
            Step::Data(vec![5, 6]),
            Step::Data(vec![7, 8, 9]),
        ]);
        let mut sink = Vec::new();

        let report = RawStreamWriter::new(8, None).run(&mut source, &mut sink).unwrap();

        assert_eq!(sink, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(report.bytes_written, 9);
        assert_eq!(report.reason, TerminationReason::SourceEnded);
        assert_eq!(report.read_errors, 0);
    }

    #[test]
    fn read_errors_are_reported_and_capture_continues() {
        let mut source = ScriptedSource::new(vec![
            Step::Data(vec![1, 0]),
            Step::Fail(ReadError::InvalidOperation),
            Step::Fail(ReadError::DeadObject),
            Step::Data(vec![2, 0]),
        ]);
        let delegate = Arc::new(RecordingDelegate::default());
        let writer = RawStreamWriter::new(4, None).with_delegate(delegate.clone());
        let mut sink = Vec::new();

        let report = writer.run(&mut source, &mut sink).unwrap();

        assert_eq!(sink, vec![1, 0, 2, 0]);
        assert_eq!(report.read_errors, 2);
        assert_eq!(
            *delegate.errors.lock(),
            vec![
                CaptureError::TransientRead(ReadError::InvalidOperation),
                CaptureError::TransientRead(ReadError::DeadObject),
            ]
        );
    }

    #[test]
    fn gain_is_applied_to_each_sample() {
        let input = samples_to_bytes(&[1000, -1000, 20000]);
        let mut source = ScriptedSource::new(vec![Step::Data(input)]);
        let mut sink = Vec::new();

        RawStreamWriter::new(16, Some(GainParameters::new(2.0)))
            .run(&mut source, &mut sink)
            .unwrap();

        let expected = samples_to_bytes(&[2000, -2000, crate::processing::sample_gain::gain(20000, 2.0)]);
        assert_eq!(sink, expected);
    }

    #[test]
    fn gain_keeps_alignment_across_split_samples() {
        let input = samples_to_bytes(&[1000, -1000, 3000]);
        let mut source = ScriptedSource::new(vec![
            Step::Data(input[..1].to_vec()),
            Step::Data(input[1..4].to_vec()),
            Step::Fail(ReadError::Generic),
            Step::Data(input[4..5].to_vec()),
            Step::Data(input[5..].to_vec()),
        ]);
        let mut sink = Vec::new();

        let report = RawStreamWriter::new(4, Some(GainParameters::new(2.0)))
            .run(&mut source, &mut sink)
            .unwrap();

        assert_eq!(sink, samples_to_bytes(&[2000, -2000, 6000]));
        assert_eq!(report.bytes_written, 6);
    }

    #[test]
    fn dangling_byte_is_written_unchanged_at_exit() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![0xE8, 0x03, 0x7f])]);
        let mut sink = Vec::new();

        let report = RawStreamWriter::new(4, Some(GainParameters::new(2.0)))
            .run(&mut source, &mut sink)
            .unwrap();

        assert_eq!(sink, vec![0xD0, 0x07, 0x7f]); // 1000 -> 2000, then the odd byte
        assert_eq!(report.bytes_written, 3);
    }

    #[test]
    fn stop_request_ends_loop_before_next_read() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![1, 2])]);
        let writer = RawStreamWriter::new(4, None);
        writer.request_stop();
        let mut sink = Vec::new();

        let report = writer.run(&mut source, &mut sink).unwrap();

        assert_eq!(report.reason, TerminationReason::StoppedByRequest);
        assert_eq!(source.reads, 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn stop_flag_clone_controls_the_writer() {
        let writer = RawStreamWriter::new(4, None);
        let flag = writer.stop_flag();
        flag.store(true, Ordering::SeqCst);

        let mut source = ScriptedSource::new(vec![]);
        let report = writer.run(&mut source, Vec::new()).unwrap();
        assert_eq!(report.reason, TerminationReason::StoppedByRequest);
    }

    #[test]
    fn sink_failure_is_fatal() {
        let mut source = ScriptedSource::new(vec![Step::Data(vec![1, 2])]);

        let err = RawStreamWriter::new(4, None).run(&mut source, BrokenSink).unwrap_err();

        assert!(matches!(err, CaptureError::IoError(_)));
    }
}
