use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::CaptureConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingMetadata, RecordingResult};
use crate::models::state::CaptureState;
use crate::processing::wav_format::PcmFormat;
use crate::storage::container_encoder::ContainerEncoder;
use crate::storage::metadata;
use crate::storage::raw_stream_writer::{RawStreamWriter, WriterReport};
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_source::{CaptureSource, RecordingSwitch};

type CaptureHandle = thread::JoinHandle<Result<WriterReport, CaptureError>>;

/// Delegate notification waiting to be delivered.
enum SessionEvent {
    StateChanged(CaptureState),
    Error(CaptureError),
    Finished(CaptureState),
}

/// Internal mutable session state, protected by `parking_lot::Mutex`.
struct SessionState {
    state: CaptureState,
    pending_source: Option<Box<dyn CaptureSource>>,
    switch: Option<RecordingSwitch>,
    stop_flag: Option<Arc<AtomicBool>>,
    capture_handle: Option<CaptureHandle>,
    starting: bool,

    // Events are queued under the lock in transition order and delivered
    // outside it by whichever thread finds no dispatch in progress.
    events: VecDeque<SessionEvent>,
    dispatching: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            pending_source: None,
            switch: None,
            stop_flag: None,
            capture_handle: None,
            starting: false,
            events: VecDeque::new(),
            dispatching: false,
        }
    }

    fn transition(&mut self, new_state: CaptureState) {
        self.events.push_back(SessionEvent::StateChanged(new_state.clone()));
        if new_state.is_terminal() {
            self.events.push_back(SessionEvent::Finished(new_state.clone()));
        }
        self.state = new_state;
    }

    fn settled(&self) -> bool {
        !self.state.is_active() && !self.dispatching && self.events.is_empty()
    }
}

/// State shared between the session handle and its worker threads.
struct Shared {
    config: CaptureConfiguration,
    session: Mutex<SessionState>,
    state_changed: Condvar,
    delegate: Mutex<Option<Arc<dyn CaptureDelegate>>>,
}

impl Shared {
    fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.lock().clone()
    }

    /// Deliver queued events unless another thread is already doing so.
    fn dispatch(&self) {
        {
            let mut s = self.session.lock();
            if s.dispatching {
                return;
            }
            s.dispatching = true;
        }

        loop {
            let event = {
                let mut s = self.session.lock();
                match s.events.pop_front() {
                    Some(event) => event,
                    None => {
                        s.dispatching = false;
                        self.state_changed.notify_all();
                        return;
                    }
                }
            };

            let Some(delegate) = self.delegate() else {
                continue;
            };
            match event {
                SessionEvent::StateChanged(state) => delegate.on_state_changed(&state),
                SessionEvent::Error(error) => delegate.on_error(&error),
                SessionEvent::Finished(state) => delegate.on_capture_finished(&state),
            }
        }
    }

    fn post_error(&self, error: CaptureError) {
        self.session.lock().events.push_back(SessionEvent::Error(error));
        self.dispatch();
    }

    fn set_state(&self, new_state: CaptureState) {
        match &new_state {
            CaptureState::Completed(result) => log::info!(
                "Capture completed: {} ({:.2}s)",
                result.container_path.display(),
                result.duration_secs
            ),
            CaptureState::Failed(error) => log::error!("Capture failed: {}", error),
            other => log::debug!("Session state: {}", other.name()),
        }
        {
            let mut s = self.session.lock();
            s.transition(new_state);
            self.state_changed.notify_all();
        }
        self.dispatch();
    }

    /// Hand the capture worker to a fresh encode thread. Caller holds the lock
    /// and has already moved the state to `Stopping`.
    fn begin_finalize(shared: &Arc<Shared>, s: &mut SessionState) {
        let capture = s.capture_handle.take();
        s.switch = None;
        s.stop_flag = None;

        let worker_shared = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("pcm-encode".into())
            .spawn(move || worker_shared.finalize(capture));

        if let Err(e) = spawned {
            let error = CaptureError::Unknown(format!("failed to spawn encode thread: {}", e));
            log::error!("Capture failed: {}", error);
            s.transition(CaptureState::Failed(error));
        }
    }

    /// Runs on the encode thread: join the capture worker, then encode.
    fn finalize(&self, capture: Option<CaptureHandle>) {
        let report = match capture.map(|handle| handle.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(CaptureError::Unknown("capture worker panicked".into())),
            None => Err(CaptureError::Unknown("capture worker missing".into())),
        };
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                self.set_state(CaptureState::Failed(e));
                return;
            }
        };

        self.set_state(CaptureState::Encoding);

        let terminal = match self.encode(report) {
            Ok(result) => CaptureState::Completed(result),
            Err(e) => CaptureState::Failed(e),
        };
        self.set_state(terminal);
    }

    fn encode(&self, report: WriterReport) -> Result<RecordingResult, CaptureError> {
        let raw_path = self.config.raw_path();
        let container_path = self.config.container_path();

        let summary = ContainerEncoder::new(self.config.buffer_size).convert(&raw_path, &container_path)?;

        let metadata = RecordingMetadata::new_mono(
            &container_path.to_string_lossy(),
            summary.payload_bytes,
            &summary.checksum,
            self.config.gain,
            report.reason,
            report.read_errors,
        );

        if self.config.write_metadata {
            match metadata::write_metadata(&metadata, &container_path) {
                Ok(path) => log::debug!("Wrote metadata sidecar {}", path.display()),
                Err(e) => {
                    log::warn!("Metadata sidecar not written: {}", e);
                    self.post_error(e);
                }
            }
        }

        Ok(RecordingResult {
            container_path,
            raw_path,
            payload_bytes: summary.payload_bytes,
            duration_secs: PcmFormat::CAPTURE.duration_secs(summary.payload_bytes),
            checksum: summary.checksum,
            termination: report.reason,
            read_errors: report.read_errors,
            metadata,
        })
    }

    /// Called by the capture worker after its loop has exited and the sink is
    /// closed. If no stop was issued the session finalizes on its own.
    fn on_capture_ended(shared: &Arc<Shared>) {
        {
            let mut s = shared.session.lock();
            if !s.state.is_recording() {
                return;
            }
            log::info!("Capture source left the recording state; finalizing");
            s.transition(CaptureState::Stopping);
            Shared::begin_finalize(shared, &mut s);
            shared.state_changed.notify_all();
        }
        shared.dispatch();
    }
}

/// Forwards writer errors into the session's ordered event queue.
struct WriterEvents(Arc<Shared>);

impl CaptureDelegate for WriterEvents {
    fn on_state_changed(&self, _state: &CaptureState) {}

    fn on_error(&self, error: &CaptureError) {
        self.0.post_error(error.clone());
    }

    fn on_capture_finished(&self, _state: &CaptureState) {}
}

/// Coordinates one capture at a time: drain the source into a raw file, then
/// wrap that file in a WAV container.
///
/// Data flow:
/// ```text
/// [CaptureSource] → pcm-capture thread → [RawStreamWriter] → record.pcm
///                                                              │ (after join)
///                   pcm-encode thread  → [ContainerEncoder] → output.wav → delegate
/// ```
///
/// Commands never block on I/O beyond creating the raw file; stopping hands
/// the join to the encode thread. Use [`CaptureSession::wait_for_outcome`] to
/// block until a terminal state.
///
/// Delegate callbacks arrive in transition order, never under the session
/// lock, so a delegate may query or command the session.
pub struct CaptureSession {
    shared: Arc<Shared>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfiguration) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                session: Mutex::new(SessionState::new()),
                state_changed: Condvar::new(),
                delegate: Mutex::new(None),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CaptureDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.shared.session.lock().state.clone()
    }

    pub fn configuration(&self) -> &CaptureConfiguration {
        &self.shared.config
    }

    pub fn raw_path(&self) -> PathBuf {
        self.shared.config.raw_path()
    }

    pub fn container_path(&self) -> PathBuf {
        self.shared.config.container_path()
    }

    /// Supply the opened source for the next recording, replacing any source
    /// supplied earlier and not yet used.
    pub fn provide_source<S: CaptureSource + 'static>(&self, source: S) {
        log::debug!("Capture source supplied: {}", source.description());
        self.shared.session.lock().pending_source = Some(Box::new(source));
    }

    pub fn has_source(&self) -> bool {
        self.shared.session.lock().pending_source.is_some()
    }

    /// Start recording. Transitions: idle (or a finished state) → recording.
    ///
    /// Consumes the supplied source. Fails with `SessionBusy` while a capture
    /// is in flight, without touching it. Any other setup failure leaves the
    /// session unchanged and keeps the source for another attempt.
    pub fn start(&self) -> Result<(), CaptureError> {
        let config = &self.shared.config;
        config.validate()?;

        // Claim the session, then do file setup without holding the lock.
        let mut source = {
            let mut s = self.shared.session.lock();
            if s.state.is_active() || s.starting {
                return Err(CaptureError::SessionBusy {
                    action: "start",
                    state: if s.starting { "starting" } else { s.state.name() },
                });
            }
            let source = s.pending_source.take().ok_or(CaptureError::SourceUnavailable)?;
            s.starting = true;
            source
        };

        let prepared = open_raw_sink(config).and_then(|file| source.start_recording().map(|()| file));
        let raw_file = match prepared {
            Ok(file) => file,
            Err(e) => {
                self.abandon_start(source);
                return Err(e);
            }
        };

        let switch = source.switch();
        let writer = RawStreamWriter::new(config.buffer_size, config.gain)
            .with_delegate(Arc::new(WriterEvents(Arc::clone(&self.shared))));
        let stop_flag = writer.stop_flag();

        // The source is handed over only once the worker exists, so a failed
        // spawn can give it back.
        let (source_tx, source_rx) = mpsc::channel::<Box<dyn CaptureSource>>();
        let worker_shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new().name("pcm-capture".into()).spawn(move || {
            let mut source = source_rx
                .recv()
                .map_err(|_| CaptureError::Unknown("capture source was not handed over".into()))?;
            let result = writer.run(&mut source, BufWriter::new(raw_file));
            if let Err(ref e) = result {
                log::error!("Capture worker failed: {}", e);
            }
            drop(source);
            drop(writer);
            Shared::on_capture_ended(&worker_shared);
            result
        });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                switch.turn_off();
                self.abandon_start(source);
                return Err(CaptureError::Unknown(format!("failed to spawn capture thread: {}", e)));
            }
        };

        let mut s = self.shared.session.lock();
        s.starting = false;
        if let Err(mpsc::SendError(source)) = source_tx.send(source) {
            switch.turn_off();
            if s.pending_source.is_none() {
                s.pending_source = Some(source);
            }
            return Err(CaptureError::Unknown("capture worker exited before start".into()));
        }

        log::info!(
            "Recording to {} (gain {:?})",
            config.raw_path().display(),
            config.gain.map(|g| g.scale)
        );

        s.transition(CaptureState::Recording);
        s.switch = Some(switch);
        s.stop_flag = Some(stop_flag);
        s.capture_handle = Some(handle);
        self.shared.state_changed.notify_all();
        drop(s);

        self.shared.dispatch();
        Ok(())
    }

    fn abandon_start(&self, source: Box<dyn CaptureSource>) {
        let mut s = self.shared.session.lock();
        s.starting = false;
        if s.pending_source.is_none() {
            s.pending_source = Some(source);
        }
    }

    /// Stop recording and encode in the background.
    /// Transitions: recording → stopping → encoding → completed / failed.
    ///
    /// A no-op in every other state, so repeated calls are harmless.
    pub fn stop(&self) {
        {
            let mut s = self.shared.session.lock();
            if !s.state.is_recording() {
                log::debug!("Stop ignored while {}", s.state.name());
                return;
            }

            if let Some(flag) = &s.stop_flag {
                flag.store(true, Ordering::SeqCst);
            }
            if let Some(switch) = &s.switch {
                switch.turn_off();
            }

            log::info!("Stopping capture");
            s.transition(CaptureState::Stopping);
            Shared::begin_finalize(&self.shared, &mut s);
            self.shared.state_changed.notify_all();
        }
        self.shared.dispatch();
    }

    /// Block until the session reaches a terminal state or `timeout` elapses.
    ///
    /// Returns None on timeout, or immediately if the session is idle. When an
    /// outcome is returned the delegate has already been told about it.
    /// Calling this from a delegate callback only returns on timeout.
    pub fn wait_for_outcome(&self, timeout: Option<Duration>) -> Option<Result<RecordingResult, CaptureError>> {
        // A timeout too large to represent is the same as no timeout.
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));

        let mut s = self.shared.session.lock();
        while !s.settled() {
            match deadline {
                Some(deadline) => {
                    if self.shared.state_changed.wait_until(&mut s, deadline).timed_out() {
                        break;
                    }
                }
                None => self.shared.state_changed.wait(&mut s),
            }
        }

        if s.settled() {
            s.state.outcome()
        } else {
            None
        }
    }

    /// Return a finished session to idle. Transitions: completed / failed → idle.
    pub fn reset(&self) -> Result<(), CaptureError> {
        {
            let mut s = self.shared.session.lock();
            if s.state.is_active() {
                return Err(CaptureError::SessionBusy {
                    action: "reset",
                    state: s.state.name(),
                });
            }
            if s.state.is_idle() {
                return Ok(());
            }
            s.transition(CaptureState::Idle);
            self.shared.state_changed.notify_all();
        }
        self.shared.dispatch();
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Workers hold their own reference and finish the encode.
        self.stop();
    }
}

fn open_raw_sink(config: &CaptureConfiguration) -> Result<File, CaptureError> {
    fs::create_dir_all(&config.output_directory).map_err(|e| {
        CaptureError::IoError(format!(
            "failed to create {}: {}",
            config.output_directory.display(),
            e
        ))
    })?;
    let raw_path = config.raw_path();
    File::create(&raw_path)
        .map_err(|e| CaptureError::IoError(format!("failed to create {}: {}", raw_path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::error::ReadError;
    use crate::models::state::TerminationReason;
    use crate::traits::capture_source::ReadOutcome;

    /// Hands out queued chunks; once drained it either idles until switched
    /// off or leaves the recording state itself.
    struct QueueSource {
        switch: RecordingSwitch,
        chunks: VecDeque<Result<Vec<u8>, ReadError>>,
        end_when_drained: bool,
        drained: Arc<AtomicBool>,
    }

    impl QueueSource {
        fn new(chunks: Vec<Result<Vec<u8>, ReadError>>, end_when_drained: bool) -> Self {
            Self {
                switch: RecordingSwitch::new(),
                chunks: chunks.into(),
                end_when_drained,
                drained: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl CaptureSource for QueueSource {
        fn switch(&self) -> RecordingSwitch {
            self.switch.clone()
        }

        fn read(&mut self, buf: &mut [u8]) -> ReadOutcome {
            match self.chunks.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    ReadOutcome::Data(chunk.len())
                }
                Some(Err(code)) => ReadOutcome::Error(code),
                None => {
                    self.drained.store(true, Ordering::SeqCst);
                    if self.end_when_drained {
                        self.switch.turn_off();
                    } else {
                        thread::sleep(Duration::from_millis(2));
                    }
                    ReadOutcome::Data(0)
                }
            }
        }
    }

    fn session_in(dir: &std::path::Path) -> CaptureSession {
        CaptureSession::new(CaptureConfiguration {
            output_directory: dir.to_path_buf(),
            ..CaptureConfiguration::default()
        })
    }

    const WAIT: Option<Duration> = Some(Duration::from_secs(10));

    #[test]
    fn start_without_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());

        assert_eq!(session.start(), Err(CaptureError::SourceUnavailable));
        assert!(session.state().is_idle());
        assert!(!session.raw_path().exists());
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());

        session.stop();
        session.stop();

        assert!(session.state().is_idle());
        assert!(session.wait_for_outcome(Some(Duration::ZERO)).is_none());
    }

    #[test]
    fn invalid_configuration_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let session = CaptureSession::new(CaptureConfiguration {
            output_directory: dir.path().to_path_buf(),
            buffer_size: 3,
            ..CaptureConfiguration::default()
        });
        session.provide_source(QueueSource::new(vec![], true));

        assert!(matches!(session.start(), Err(CaptureError::ConfigurationFailed(_))));
        assert!(session.has_source());
        assert!(session.state().is_idle());
    }

    #[test]
    fn stop_produces_container_with_captured_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        let source = QueueSource::new(vec![Ok(vec![1, 0, 2, 0]), Ok(vec![3, 0])], false);
        let drained = Arc::clone(&source.drained);
        session.provide_source(source);

        session.start().unwrap();
        assert!(session.state().is_recording());
        assert!(!session.has_source());

        // Let the worker drain the queue before stopping.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !drained.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        session.stop();

        let result = session.wait_for_outcome(WAIT).unwrap().unwrap();
        assert_eq!(result.payload_bytes, 6);
        assert_eq!(result.termination, TerminationReason::StoppedByRequest);

        let wav = fs::read(session.container_path()).unwrap();
        assert_eq!(wav.len(), 50);
        assert_eq!(&wav[44..], &[1, 0, 2, 0, 3, 0]);
        assert!(matches!(session.state(), CaptureState::Completed(_)));
    }

    #[test]
    fn second_start_while_recording_is_busy() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.provide_source(QueueSource::new(vec![], false));
        session.start().unwrap();

        session.provide_source(QueueSource::new(vec![], false));
        assert_eq!(
            session.start(),
            Err(CaptureError::SessionBusy {
                action: "start",
                state: "recording"
            })
        );
        assert!(session.state().is_recording());
        assert!(session.has_source());

        session.stop();
        assert!(session.wait_for_outcome(WAIT).unwrap().is_ok());
    }

    #[test]
    fn source_ending_finalizes_without_stop() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.provide_source(QueueSource::new(
            vec![Ok(vec![9, 0]), Err(ReadError::BadValue), Ok(vec![8, 0])],
            true,
        ));

        session.start().unwrap();
        let result = session.wait_for_outcome(WAIT).unwrap().unwrap();

        assert_eq!(result.termination, TerminationReason::SourceEnded);
        assert_eq!(result.read_errors, 1);
        assert_eq!(result.payload_bytes, 4);
        assert!(crate::storage::metadata::metadata_path(&result.container_path).exists());
    }

    #[test]
    fn reset_is_refused_while_recording_and_clears_outcome_after() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.provide_source(QueueSource::new(vec![], false));
        session.start().unwrap();

        assert!(matches!(session.reset(), Err(CaptureError::SessionBusy { action: "reset", .. })));

        session.stop();
        session.wait_for_outcome(WAIT).unwrap().unwrap();
        session.reset().unwrap();
        assert!(session.state().is_idle());
    }

    /// Refuses to start, like a recorder whose hardware was taken away.
    struct RefusingSource(RecordingSwitch);

    impl CaptureSource for RefusingSource {
        fn switch(&self) -> RecordingSwitch {
            self.0.clone()
        }

        fn start_recording(&mut self) -> Result<(), CaptureError> {
            Err(CaptureError::SourceUnavailable)
        }

        fn read(&mut self, _buf: &mut [u8]) -> ReadOutcome {
            ReadOutcome::Data(0)
        }
    }

    #[test]
    fn source_refusing_to_start_is_kept_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        session.provide_source(RefusingSource(RecordingSwitch::new()));

        assert_eq!(session.start(), Err(CaptureError::SourceUnavailable));
        assert!(session.state().is_idle());
        assert!(session.has_source());

        // The session is free again for a working source.
        session.provide_source(QueueSource::new(vec![Ok(vec![1, 0])], true));
        session.start().unwrap();
        assert!(session.wait_for_outcome(WAIT).unwrap().is_ok());
    }

    #[test]
    fn unbounded_timeout_waits_for_the_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session_in(dir.path()));
        let source = QueueSource::new(vec![Ok(vec![4, 0, 5, 0])], false);
        let drained = Arc::clone(&source.drained);
        session.provide_source(source);
        session.start().unwrap();

        let waiter = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.wait_for_outcome(Some(Duration::MAX)))
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while !drained.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        session.stop();

        let result = waiter.join().unwrap().unwrap().unwrap();
        assert_eq!(result.payload_bytes, 4);
    }

    #[test]
    fn unbounded_timeout_on_idle_session_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(dir.path());
        assert!(session.wait_for_outcome(Some(Duration::MAX)).is_none());
    }

    /// Blocks in `start_recording` until released, like a recorder warming up.
    struct SlowStartSource {
        switch: RecordingSwitch,
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
    }

    impl CaptureSource for SlowStartSource {
        fn switch(&self) -> RecordingSwitch {
            self.switch.clone()
        }

        fn start_recording(&mut self) -> Result<(), CaptureError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();
            self.switch.turn_on();
            Ok(())
        }

        fn read(&mut self, _buf: &mut [u8]) -> ReadOutcome {
            self.switch.turn_off();
            ReadOutcome::Data(0)
        }
    }

    #[test]
    fn session_stays_responsive_while_start_prepares() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(session_in(dir.path()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        session.provide_source(SlowStartSource {
            switch: RecordingSwitch::new(),
            entered: entered_tx,
            release: release_rx,
        });

        let starter = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.start())
        };
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Queries do not wait on the setup, and a second start is turned away.
        assert!(session.state().is_idle());
        session.provide_source(QueueSource::new(vec![], true));
        assert_eq!(
            session.start(),
            Err(CaptureError::SessionBusy {
                action: "start",
                state: "starting"
            })
        );
        assert!(session.has_source());

        release_tx.send(()).unwrap();
        starter.join().unwrap().unwrap();
        assert!(session.wait_for_outcome(WAIT).unwrap().is_ok());
    }
}
