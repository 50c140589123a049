use super::logs::{EventLog, SensorLog};
use crate::camera::{enumerate_cameras, CaptureBackend, FrameSource};
use crate::config::{InputConfig, RecordingConfig};
use crate::error::SessionError;
use crate::events::{Axis, GestureEvent, RigEvent, SensorSample};
use crate::worker::{RecordingWorker, WorkerNotice};
use chrono::Local;
use crossbeam::channel::{unbounded, Receiver, Sender};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Experiment phases. `Armed` covers both Idle and Recording; the
/// distinction lives in `recording: Option<ActiveRecording>` so the open
/// log handles and workers exist exactly when a session is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    CamerasDetected,
    Armed,
    Ended,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "uninitialized",
            Phase::CamerasDetected => "cameras_detected",
            Phase::Armed => "armed",
            Phase::Ended => "ended",
        }
    }
}

/// What the caller should do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Shutdown,
}

/// The participant's self-reported affective position, clamped to a
/// symmetric range. Owned exclusively by the controller; persists across
/// recording sessions within one experiment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvState {
    pub arousal: f32,
    pub valence: f32,
}

impl AvState {
    pub fn new() -> Self {
        Self {
            arousal: 0.0,
            valence: 0.0,
        }
    }

    /// Apply a delta with saturation - a step past the bound clamps,
    /// never wraps.
    pub fn apply(&mut self, axis: Axis, delta: f32, max: f32) {
        let value = match axis {
            Axis::Arousal => &mut self.arousal,
            Axis::Valence => &mut self.valence,
        };
        *value = (*value + delta).clamp(-max, max);
    }
}

impl Default for AvState {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything that exists only while a recording session is open.
/// Dropping this closes the log files; the controller drops it only after
/// every worker has stopped writing.
struct ActiveRecording {
    session_dir: PathBuf,
    event_log: EventLog,
    sensor_log: SensorLog,
    workers: Vec<RecordingWorker>,
}

/// Host-side session controller: the single serialization point for every
/// state transition. Both input channels (serial and keyboard) feed the
/// same queue; the owning loop applies events one at a time in arrival
/// order, so concurrent record-toggles cannot double-toggle.
pub struct SessionController {
    recording_config: RecordingConfig,
    input_config: InputConfig,
    backend: Arc<dyn CaptureBackend>,

    phase: Phase,
    available_cameras: Vec<u32>,
    selected_cameras: Vec<u32>,
    experiment_dir: Option<PathBuf>,
    session_count: u32,
    recording: Option<ActiveRecording>,
    av: AvState,
    latest_sensor: Option<u16>,

    preview: Option<PreviewHandle>,
    notice_tx: Sender<WorkerNotice>,
    notice_rx: Receiver<WorkerNotice>,
}

/// An open low-rate preview handle, independent of recording
struct PreviewHandle {
    camera_index: u32,
    _source: Box<dyn FrameSource>,
}

impl SessionController {
    pub fn new(
        recording_config: RecordingConfig,
        input_config: InputConfig,
        backend: Arc<dyn CaptureBackend>,
    ) -> Self {
        let (notice_tx, notice_rx) = unbounded();
        Self {
            recording_config,
            input_config,
            backend,
            phase: Phase::Uninitialized,
            available_cameras: Vec::new(),
            selected_cameras: Vec::new(),
            experiment_dir: None,
            session_count: 0,
            recording: None,
            av: AvState::new(),
            latest_sensor: None,
            preview: None,
            notice_tx,
            notice_rx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn av_state(&self) -> AvState {
        self.av
    }

    pub fn latest_sensor(&self) -> Option<u16> {
        self.latest_sensor
    }

    pub fn experiment_dir(&self) -> Option<&PathBuf> {
        self.experiment_dir.as_ref()
    }

    /// Probe for usable cameras. Rejects an empty result - an experiment
    /// cannot be set up without at least one camera.
    pub fn detect_cameras(&mut self) -> Result<&[u32], SessionError> {
        let available = enumerate_cameras(
            self.backend.as_ref(),
            self.recording_config.max_probe_index,
            self.recording_config.fps,
        );
        if available.is_empty() {
            return Err(SessionError::NoCamerasAvailable);
        }

        info!("Cameras detected: {:?}", available);
        self.available_cameras = available;
        if self.phase == Phase::Uninitialized {
            self.phase = Phase::CamerasDetected;
        }
        Ok(&self.available_cameras)
    }

    pub fn available_cameras(&self) -> &[u32] {
        &self.available_cameras
    }

    /// Arm the experiment: validate the camera selection, create the
    /// timestamped root directory, and reset the session counter.
    pub fn arm_experiment(
        &mut self,
        experiment_id: &str,
        selection: &[u32],
    ) -> Result<PathBuf, SessionError> {
        if self.phase != Phase::CamerasDetected {
            return Err(SessionError::WrongPhase {
                phase: self.phase.name(),
            });
        }
        if selection.is_empty() {
            return Err(SessionError::NoCamerasSelected);
        }
        for &index in selection {
            if !self.available_cameras.contains(&index) {
                return Err(SessionError::UnknownCamera { index });
            }
        }

        let timestamp = Local::now().format("%Y%m%d-%H%M%S");
        let dir = PathBuf::from(&self.recording_config.root)
            .join(format!("{}_{}", timestamp, experiment_id));
        fs::create_dir_all(&dir).map_err(|e| SessionError::DirectoryCreation {
            path: dir.display().to_string(),
            source: e,
        })?;

        info!("Experiment armed: {}", dir.display());
        self.selected_cameras = selection.to_vec();
        self.experiment_dir = Some(dir.clone());
        self.session_count = 0;
        self.phase = Phase::Armed;
        Ok(dir)
    }

    /// Apply one event from the queue. Returns `Directive::Shutdown` when
    /// the application should terminate (SessionEnd or an explicit
    /// shutdown request).
    pub fn handle_event(&mut self, event: &RigEvent) -> Directive {
        self.drain_worker_notices();

        match event {
            RigEvent::Gesture { gesture, .. } => self.handle_gesture(*gesture),
            RigEvent::Sensor(sample) => {
                self.handle_sensor(sample);
                Directive::Continue
            }
            RigEvent::WorkerError {
                camera_index,
                error,
            } => {
                // Partial-failure semantics: surface it, keep the other
                // cameras recording.
                error!(
                    "Camera {} failed during session: {}",
                    camera_index, error
                );
                Directive::Continue
            }
            RigEvent::SerialStatusChanged { .. } => Directive::Continue,
            RigEvent::ShutdownRequested { .. } => {
                self.shutdown();
                Directive::Shutdown
            }
        }
    }

    fn handle_gesture(&mut self, gesture: GestureEvent) -> Directive {
        match gesture {
            GestureEvent::DirectionChange { axis, delta } => {
                self.av.apply(axis, delta, self.input_config.av_max);
                info!(
                    "AV updated: arousal={:.1} valence={:.1}",
                    self.av.arousal, self.av.valence
                );
                if let Some(recording) = self.recording.as_mut() {
                    let payload = json!({
                        "axis": axis.as_str(),
                        "delta": delta,
                        "arousal": self.av.arousal,
                        "valence": self.av.valence,
                    });
                    if let Err(e) = recording.event_log.append("av_change", payload) {
                        error!("Failed to log av_change: {}", e);
                    }
                }
                Directive::Continue
            }
            GestureEvent::Marker => {
                if let Some(recording) = self.recording.as_mut() {
                    if let Err(e) = recording
                        .event_log
                        .append("morph_awareness_marker", json!({}))
                    {
                        error!("Failed to log marker: {}", e);
                    }
                } else {
                    // A marker outside a recording window is not an error
                    debug!("Marker received while not recording - ignored");
                }
                Directive::Continue
            }
            GestureEvent::RecordToggle => {
                if let Err(e) = self.toggle_recording() {
                    warn!("Record toggle rejected: {}", e);
                }
                Directive::Continue
            }
            GestureEvent::SessionEnd => {
                info!("Session end requested by controller device");
                self.shutdown();
                Directive::Shutdown
            }
        }
    }

    fn handle_sensor(&mut self, sample: &SensorSample) {
        self.latest_sensor = Some(sample.raw_value);
        if let Some(recording) = self.recording.as_mut() {
            if let Err(e) = recording.sensor_log.append(sample) {
                error!("Failed to log sensor sample: {}", e);
            }
        }
    }

    /// Flip between Idle and Recording within the armed phase
    pub fn toggle_recording(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Armed {
            return Err(SessionError::WrongPhase {
                phase: self.phase.name(),
            });
        }
        if self.recording.is_some() {
            self.stop_recording()
        } else {
            self.start_recording()
        }
    }

    /// Start a recording session. Atomic from the caller's perspective:
    /// any directory or log failure rolls everything back, no workers are
    /// started, and the phase stays Idle. The session counter only
    /// advances on success, so numbers are never burned.
    fn start_recording(&mut self) -> Result<(), SessionError> {
        let experiment_dir = self
            .experiment_dir
            .clone()
            .ok_or(SessionError::WrongPhase {
                phase: self.phase.name(),
            })?;
        if self.selected_cameras.is_empty() {
            return Err(SessionError::NoCamerasSelected);
        }

        if self.preview_blocks_recording() {
            warn!("Closing preview - it holds a camera selected for recording");
            self.close_preview();
        }

        let next_count = self.session_count + 1;
        let session_dir = experiment_dir.join(format!("session_{:02}", next_count));
        let video_dir = session_dir.join("video");

        let opened = self
            .open_session_files(&session_dir, &video_dir)
            .and_then(|(mut event_log, sensor_log)| {
                event_log.append("record_start", json!({ "session": next_count }))?;
                Ok((event_log, sensor_log))
            });

        match opened {
            Ok((event_log, sensor_log)) => {
                let mut recording = ActiveRecording {
                    session_dir: session_dir.clone(),
                    event_log,
                    sensor_log,
                    workers: Vec::new(),
                };

                for &index in &self.selected_cameras {
                    let path = video_dir.join(format!(
                        "camera_{}.{}",
                        index, self.recording_config.video_ext
                    ));
                    recording.workers.push(RecordingWorker::start(
                        Arc::clone(&self.backend),
                        index,
                        path,
                        self.recording_config.fps,
                        self.notice_tx.clone(),
                    ));
                }

                self.session_count = next_count;
                self.recording = Some(recording);
                info!(
                    "Recording session {} started in {}",
                    next_count,
                    session_dir.display()
                );
                Ok(())
            }
            Err(e) => {
                // Roll back the partially created session directory
                if session_dir.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&session_dir) {
                        warn!(
                            "Failed to clean up {} after aborted start: {}",
                            session_dir.display(),
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn open_session_files(
        &self,
        session_dir: &std::path::Path,
        video_dir: &std::path::Path,
    ) -> Result<(EventLog, SensorLog), SessionError> {
        fs::create_dir_all(video_dir).map_err(|e| SessionError::DirectoryCreation {
            path: video_dir.display().to_string(),
            source: e,
        })?;
        let event_log = EventLog::create(&session_dir.join("events.jsonl"))?;
        let sensor_log = SensorLog::create(&session_dir.join("gsr_data.csv"))?;
        Ok((event_log, sensor_log))
    }

    /// Stop the running session: write the `record_stop` row, stop and
    /// join every worker, and only then close the log handles.
    fn stop_recording(&mut self) -> Result<(), SessionError> {
        let mut recording = match self.recording.take() {
            Some(recording) => recording,
            None => return Ok(()), // stop without start is a no-op
        };

        recording
            .event_log
            .append("record_stop", json!({ "session": self.session_count }))?;

        for worker in recording.workers.iter_mut() {
            worker.stop();
        }
        self.drain_worker_notices();

        info!(
            "Recording session {} stopped ({})",
            self.session_count,
            recording.session_dir.display()
        );
        // Dropping `recording` closes both log files - after the joins
        // above, nothing is still writing into the session directory.
        Ok(())
    }

    /// Surface asynchronous worker notices to the operator
    pub fn drain_worker_notices(&mut self) {
        while let Ok(notice) = self.notice_rx.try_recv() {
            match notice {
                WorkerNotice::Error {
                    camera_index,
                    message,
                } => {
                    error!("Camera {} worker error: {}", camera_index, message);
                }
                WorkerNotice::Finished {
                    camera_index,
                    frames,
                } => {
                    debug!("Camera {} worker finished ({} frames)", camera_index, frames);
                }
            }
        }
    }

    /// Open a live preview on one camera. Preview and recording on the
    /// same index are mutually exclusive - concurrent open is
    /// driver-dependent and not assumed to work.
    pub fn open_preview(&mut self, camera_index: u32) -> Result<(), SessionError> {
        if !self.available_cameras.contains(&camera_index) {
            return Err(SessionError::UnknownCamera {
                index: camera_index,
            });
        }
        if self.recording.is_some() && self.selected_cameras.contains(&camera_index) {
            return Err(SessionError::PreviewBusy {
                index: camera_index,
            });
        }

        self.close_preview();
        let source = match self
            .backend
            .open(camera_index, self.recording_config.preview_fps)
        {
            Ok(source) => source,
            Err(e) => {
                warn!("Preview open failed on camera {}: {}", camera_index, e);
                return Err(SessionError::PreviewBusy {
                    index: camera_index,
                });
            }
        };

        info!("Preview opened on camera {}", camera_index);
        self.preview = Some(PreviewHandle {
            camera_index,
            _source: source,
        });
        Ok(())
    }

    pub fn close_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            info!("Preview closed on camera {}", preview.camera_index);
        }
    }

    pub fn preview_camera(&self) -> Option<u32> {
        self.preview.as_ref().map(|p| p.camera_index)
    }

    /// True when the open preview holds a camera selected for recording;
    /// such a preview is closed before workers start.
    pub fn preview_blocks_recording(&self) -> bool {
        matches!(
            self.preview.as_ref(),
            Some(preview) if self.selected_cameras.contains(&preview.camera_index)
        )
    }

    /// Drive the controller to `Ended`, closing a running recording
    /// session first so nothing half-written is left behind.
    pub fn shutdown(&mut self) {
        self.close_preview();
        if self.recording.is_some() {
            if let Err(e) = self.stop_recording() {
                error!("Error stopping recording during shutdown: {}", e);
            }
        }
        if self.phase != Phase::Ended {
            info!("Session controller ended");
            self.phase = Phase::Ended;
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.recording.is_some() {
            warn!("Controller dropped while recording - closing session");
            let _ = self.stop_recording();
        }
    }
}
