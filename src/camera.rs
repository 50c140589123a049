use crate::error::WorkerError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// One captured frame. The byte payload is container-opaque: the backend
/// defines the encoding and the recording worker streams it to disk as-is.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub timestamp: SystemTime,
}

/// A live capture handle for one device. Owned exclusively by the thread
/// that opened it.
pub trait FrameSource: Send + Sync {
    /// Block until the next frame (paced at the source's frame rate).
    fn next_frame(&mut self) -> Result<Frame, WorkerError>;
}

/// The capture collaborator boundary. The controller and workers never
/// touch device internals; a concrete backend lives behind this trait.
pub trait CaptureBackend: Send + Sync {
    fn open(&self, index: u32, fps: u32) -> Result<Box<dyn FrameSource>, WorkerError>;
}

/// Probe device indices and return those that actually deliver a frame.
/// Merely opening is not enough - a device that opens but produces nothing
/// is unusable for recording.
pub fn enumerate_cameras(backend: &dyn CaptureBackend, max_index: u32, fps: u32) -> Vec<u32> {
    let mut available = Vec::new();

    for index in 0..max_index {
        match backend.open(index, fps) {
            Ok(mut source) => match source.next_frame() {
                Ok(_) => {
                    info!("Detected camera {}", index);
                    available.push(index);
                }
                Err(e) => {
                    debug!("Camera {} opens but delivers no frame: {}", index, e);
                }
            },
            Err(e) => {
                debug!("Camera {} probe failed: {}", index, e);
            }
        }
    }

    if available.is_empty() {
        warn!("No usable cameras found during probe");
    }
    available
}

/// Deterministic software camera used by tests, the simulator, and as the
/// default runtime backend when no hardware capture layer is wired in.
pub struct SyntheticBackend {
    /// Device indices that exist in this synthetic universe
    present: Vec<u32>,
    /// Indices that open but fail on every frame read
    broken: Vec<u32>,
    frame_bytes: usize,
}

impl SyntheticBackend {
    pub fn new(present: Vec<u32>) -> Self {
        Self {
            present,
            broken: Vec::new(),
            frame_bytes: 64,
        }
    }

    /// Mark an index as present but failing on frame reads
    pub fn with_broken(mut self, broken: Vec<u32>) -> Self {
        self.broken = broken;
        self
    }
}

impl CaptureBackend for SyntheticBackend {
    fn open(&self, index: u32, fps: u32) -> Result<Box<dyn FrameSource>, WorkerError> {
        if !self.present.contains(&index) {
            return Err(WorkerError::DeviceOpen {
                index,
                details: "no such device".to_string(),
            });
        }
        Ok(Box::new(SyntheticSource {
            index,
            broken: self.broken.contains(&index),
            frame_period: std::time::Duration::from_millis(1000 / u64::from(fps.max(1))),
            frame_bytes: self.frame_bytes,
            counter: Arc::new(AtomicU64::new(0)),
        }))
    }
}

struct SyntheticSource {
    index: u32,
    broken: bool,
    frame_period: std::time::Duration,
    frame_bytes: usize,
    counter: Arc<AtomicU64>,
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Frame, WorkerError> {
        if self.broken {
            return Err(WorkerError::FrameRead {
                index: self.index,
                details: "synthetic device configured to fail".to_string(),
            });
        }

        std::thread::sleep(self.frame_period);

        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut data = vec![0u8; self.frame_bytes];
        data[..8].copy_from_slice(&sequence.to_le_bytes());
        data[8..12].copy_from_slice(&self.index.to_le_bytes());

        Ok(Frame {
            data,
            timestamp: SystemTime::now(),
        })
    }
}
