pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod keyboard;
pub mod serial_link;
pub mod session;
pub mod transport;
pub mod worker;

pub use app::{ComponentState, RigOrchestrator, ShutdownReason};
pub use camera::{enumerate_cameras, CaptureBackend, Frame, FrameSource, SyntheticBackend};
pub use config::RigConfig;
pub use error::{Result, RigError};
pub use events::{Axis, EventBus, GestureEvent, RigEvent, SensorSample};
pub use input::{
    AnalogReader, Button, Clock, DeviceEvent, FakeClock, GestureEngine, GestureTiming,
    InputSampler, MonotonicClock, PinId, PinReader, RawPinSample,
};
pub use keyboard::KeyboardHandler;
pub use serial_link::SerialLink;
pub use session::{AvState, Directive, EventLog, Phase, SensorLog, SessionController};
pub use transport::{encode_line, parse_line, DeviceLine, LineAssembler};
pub use worker::{RecordingWorker, WorkerNotice};
