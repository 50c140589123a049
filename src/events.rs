use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// The two self-report axes adjusted by the direction inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Arousal,
    Valence,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Arousal => "arousal",
            Axis::Valence => "valence",
        }
    }
}

/// Discrete semantic events produced by the controller device or keyboard.
///
/// Ordering as generated is authoritative; events are never reordered or
/// coalesced downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GestureEvent {
    DirectionChange { axis: Axis, delta: f32 },
    Marker,
    RecordToggle,
    SessionEnd,
}

/// One raw analog reading from the GSR sensor (raw ADC counts, uncalibrated)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: SystemTime,
    pub raw_value: u16,
}

impl SensorSample {
    pub fn now(raw_value: u16) -> Self {
        Self {
            timestamp: SystemTime::now(),
            raw_value,
        }
    }
}

/// Events that can occur in the rig
#[derive(Debug, Clone)]
pub enum RigEvent {
    /// A gesture arrived from the serial channel or a keyboard shortcut
    Gesture {
        gesture: GestureEvent,
        timestamp: SystemTime,
    },
    /// A sensor sample arrived from the serial channel
    Sensor(SensorSample),
    /// A recording worker reported an asynchronous failure
    WorkerError { camera_index: u32, error: String },
    /// Serial connection status changed
    SerialStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl RigEvent {
    pub fn gesture(gesture: GestureEvent) -> Self {
        Self::Gesture {
            gesture,
            timestamp: SystemTime::now(),
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            RigEvent::Gesture { timestamp, .. } => *timestamp,
            RigEvent::Sensor(sample) => sample.timestamp,
            RigEvent::WorkerError { .. } => SystemTime::now(),
            RigEvent::SerialStatusChanged { timestamp, .. } => *timestamp,
            RigEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string for filtering and logging
    pub fn event_type(&self) -> &'static str {
        match self {
            RigEvent::Gesture { gesture, .. } => match gesture {
                GestureEvent::DirectionChange { .. } => "direction_change",
                GestureEvent::Marker => "marker",
                GestureEvent::RecordToggle => "record_toggle",
                GestureEvent::SessionEnd => "session_end",
            },
            RigEvent::Sensor(_) => "sensor_sample",
            RigEvent::WorkerError { .. } => "worker_error",
            RigEvent::SerialStatusChanged { .. } => "serial_status_changed",
            RigEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            RigEvent::Gesture { gesture, .. } => match gesture {
                GestureEvent::DirectionChange { axis, delta } => {
                    format!("{} {:+.1}", axis.as_str(), delta)
                }
                GestureEvent::Marker => "Morph awareness marker".to_string(),
                GestureEvent::RecordToggle => "Record toggle".to_string(),
                GestureEvent::SessionEnd => "Session end".to_string(),
            },
            RigEvent::Sensor(sample) => format!("GSR sample: {}", sample.raw_value),
            RigEvent::WorkerError {
                camera_index,
                error,
            } => format!("Worker error on camera {}: {}", camera_index, error),
            RigEvent::SerialStatusChanged { connected, .. } => {
                format!(
                    "Serial {}",
                    if *connected {
                        "connected"
                    } else {
                        "disconnected"
                    }
                )
            }
            RigEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }
}

/// Async event bus feeding the session controller.
///
/// Both input channels (serial and keyboard) publish here; the controller
/// loop is the single consumer, so events apply in arrival order.
pub struct EventBus {
    sender: broadcast::Sender<RigEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RigEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: RigEvent) -> Result<usize, EventBusError> {
        match &event {
            RigEvent::Gesture { gesture, .. } => {
                info!("Gesture: {}", event.description());
                debug!("Gesture detail: {:?}", gesture);
            }
            RigEvent::Sensor(sample) => {
                debug!("Sensor sample: {}", sample.raw_value);
            }
            RigEvent::WorkerError {
                camera_index,
                error,
            } => {
                error!("Recording worker {} failed: {}", camera_index, error);
            }
            RigEvent::SerialStatusChanged { connected, .. } => {
                if *connected {
                    info!("Serial link connected");
                } else {
                    warn!("Serial link disconnected");
                }
            }
            RigEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
