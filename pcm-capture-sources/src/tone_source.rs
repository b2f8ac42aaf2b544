//! Synthetic sine-wave capture source.
//!
//! Produces mono 16-bit PCM at the capture rate. Useful for exercising the
//! pipeline without a recorder attached.

use std::f64::consts::TAU;
use std::thread;
use std::time::{Duration, Instant};

use pcm_capture_core::{CaptureError, CaptureSource, PcmFormat, ReadOutcome, RecordingSwitch};

pub struct ToneSource {
    switch: RecordingSwitch,
    frequency: f64,
    amplitude: f64,
    phase: f64,
    emitted: u64,
    limit: Option<u64>,
    realtime: bool,
    started_at: Option<Instant>,
}

impl ToneSource {
    /// Full-scale-ish tone (-6 dBFS) at `frequency` Hz that runs until stopped.
    pub fn new(frequency: f64) -> Result<Self, CaptureError> {
        let nyquist = PcmFormat::CAPTURE.sample_rate as f64 / 2.0;
        if !frequency.is_finite() || frequency <= 0.0 || frequency >= nyquist {
            return Err(CaptureError::ConfigurationFailed(format!(
                "tone frequency must be in (0, {}) Hz, got {}",
                nyquist, frequency
            )));
        }
        Ok(Self {
            switch: RecordingSwitch::new(),
            frequency,
            amplitude: 16384.0,
            phase: 0.0,
            emitted: 0,
            limit: None,
            realtime: false,
            started_at: None,
        })
    }

    /// Peak amplitude in sample units.
    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = f64::from(amplitude.unsigned_abs().min(i16::MAX as u16));
        self
    }

    /// Leave the recording state after `duration` worth of samples.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        let samples = duration.as_secs_f64() * PcmFormat::CAPTURE.sample_rate as f64;
        self.limit = Some(samples.round() as u64);
        self
    }

    /// Pace reads to the capture rate instead of returning as fast as possible.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn next_sample(&mut self) -> i16 {
        let value = (self.phase.sin() * self.amplitude).round() as i16;
        self.phase += TAU * self.frequency / PcmFormat::CAPTURE.sample_rate as f64;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        value
    }

    fn pace(&mut self) {
        let started_at = *self.started_at.get_or_insert_with(Instant::now);
        let due = Duration::from_secs_f64(self.emitted as f64 / PcmFormat::CAPTURE.sample_rate as f64);
        if let Some(wait) = due.checked_sub(started_at.elapsed()) {
            thread::sleep(wait);
        }
    }
}

impl CaptureSource for ToneSource {
    fn switch(&self) -> RecordingSwitch {
        self.switch.clone()
    }

    fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        let mut count = (buf.len() / 2) as u64;
        if let Some(limit) = self.limit {
            count = count.min(limit.saturating_sub(self.emitted));
            if count == 0 {
                self.switch.turn_off();
                return ReadOutcome::Data(0);
            }
        }

        for frame in buf.chunks_exact_mut(2).take(count as usize) {
            frame.copy_from_slice(&self.next_sample().to_le_bytes());
        }
        self.emitted += count;

        if self.realtime {
            self.pace();
        }
        ReadOutcome::Data(count as usize * 2)
    }

    fn description(&self) -> String {
        format!("{} Hz tone", self.frequency)
    }
}
