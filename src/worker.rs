use crate::camera::CaptureBackend;
use crate::error::WorkerError;
use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Asynchronous notifications from a recording worker thread
#[derive(Debug, Clone)]
pub enum WorkerNotice {
    Error { camera_index: u32, message: String },
    Finished { camera_index: u32, frames: u64 },
}

/// Consecutive frame-read failures tolerated before the worker gives up
const MAX_CONSECUTIVE_FRAME_ERRORS: u32 = 5;

/// One recording worker: a dedicated thread owning one capture device and
/// one output file for the duration of a recording session.
///
/// The controller only sees `start`/`stop` and the asynchronous notice
/// channel. A device that fails to open reports its error on that channel
/// and never blocks the controller's own transition.
pub struct RecordingWorker {
    camera_index: u32,
    output_path: PathBuf,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RecordingWorker {
    pub fn camera_index(&self) -> u32 {
        self.camera_index
    }

    pub fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// Spawn the worker thread. Returns immediately; open failures arrive
    /// on `notice_tx`.
    pub fn start(
        backend: Arc<dyn CaptureBackend>,
        camera_index: u32,
        output_path: PathBuf,
        fps: u32,
        notice_tx: Sender<WorkerNotice>,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let path = output_path.clone();

        let handle = std::thread::Builder::new()
            .name(format!("record-cam{}", camera_index))
            .spawn(move || {
                run_worker(backend, camera_index, path, fps, stop_rx, notice_tx);
            })
            .ok();

        if handle.is_none() {
            warn!("Failed to spawn recording thread for camera {}", camera_index);
        }

        Self {
            camera_index,
            output_path,
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Signal the worker and block until its thread has exited and the
    /// output file is flushed. Idempotent: a second call, or stopping a
    /// worker whose thread never started, is a no-op.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The worker polls this channel once per frame period;
            // a dropped receiver (thread already dead) is fine.
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Recording thread for camera {} panicked", self.camera_index);
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for RecordingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    backend: Arc<dyn CaptureBackend>,
    camera_index: u32,
    output_path: PathBuf,
    fps: u32,
    stop_rx: Receiver<()>,
    notice_tx: Sender<WorkerNotice>,
) {
    let mut source = match backend.open(camera_index, fps) {
        Ok(source) => source,
        Err(e) => {
            let _ = notice_tx.send(WorkerNotice::Error {
                camera_index,
                message: e.to_string(),
            });
            return;
        }
    };

    let file = match File::create(&output_path) {
        Ok(file) => file,
        Err(e) => {
            let _ = notice_tx.send(WorkerNotice::Error {
                camera_index,
                message: WorkerError::OutputOpen {
                    path: output_path.display().to_string(),
                    details: e.to_string(),
                }
                .to_string(),
            });
            return;
        }
    };
    let mut writer = BufWriter::new(file);

    info!(
        "Recording camera {} to {}",
        camera_index,
        output_path.display()
    );

    let mut frames: u64 = 0;
    let mut consecutive_errors: u32 = 0;

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match source.next_frame() {
            Ok(frame) => {
                consecutive_errors = 0;
                if let Err(e) = writer.write_all(&frame.data) {
                    let _ = notice_tx.send(WorkerNotice::Error {
                        camera_index,
                        message: WorkerError::OutputWrite {
                            path: output_path.display().to_string(),
                            details: e.to_string(),
                        }
                        .to_string(),
                    });
                    break;
                }
                frames += 1;
            }
            Err(e) => {
                // Transient: drop the frame and keep going, up to a cap
                consecutive_errors += 1;
                debug!(
                    "Frame read failed on camera {} (attempt {}): {}",
                    camera_index, consecutive_errors, e
                );
                if consecutive_errors >= MAX_CONSECUTIVE_FRAME_ERRORS {
                    let _ = notice_tx.send(WorkerNotice::Error {
                        camera_index,
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }
    }

    if let Err(e) = writer.flush() {
        warn!(
            "Failed to flush recording for camera {}: {}",
            camera_index, e
        );
    }

    info!(
        "Recording for camera {} finished ({} frames)",
        camera_index, frames
    );
    let _ = notice_tx.send(WorkerNotice::Finished {
        camera_index,
        frames,
    });
}
