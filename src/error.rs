use thiserror::Error;

#[derive(Error, Debug)]
pub enum RigError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Serial link error: {0}")]
    Serial(#[from] SerialError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Recording worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl RigError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors from the serial link to the controller device
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("Serial port {port} not found")]
    PortNotFound { port: String },

    #[error("Failed to open serial port {port}: {details}")]
    PortOpen { port: String, details: String },

    #[error("Serial read failed on {port}: {details}")]
    Read { port: String, details: String },
}

/// Errors from the session/recording controller
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No cameras available - connect at least one camera and re-detect")]
    NoCamerasAvailable,

    #[error("No cameras selected - select at least one camera before arming")]
    NoCamerasSelected,

    #[error("Camera {index} is not in the detected set")]
    UnknownCamera { index: u32 },

    #[error("Operation not valid in the {phase} phase")]
    WrongPhase { phase: &'static str },

    #[error("Failed to create {path}: {source}")]
    DirectoryCreation {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to open log file {path}: {source}")]
    LogOpen {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write log row: {0}")]
    LogWrite(#[from] std::io::Error),

    #[error("Failed to write sensor row: {0}")]
    SensorWrite(#[from] csv::Error),

    #[error("Camera {index} is recording - close the recording session before previewing it")]
    PreviewBusy { index: u32 },
}

/// Errors from a recording worker or the capture backend
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to open capture device {index}: {details}")]
    DeviceOpen { index: u32, details: String },

    #[error("Capture device {index} stopped delivering frames: {details}")]
    FrameRead { index: u32, details: String },

    #[error("Failed to open output file {path}: {details}")]
    OutputOpen { path: String, details: String },

    #[error("Failed to write output file {path}: {details}")]
    OutputWrite { path: String, details: String },
}

/// Errors from the event bus
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, RigError>;
