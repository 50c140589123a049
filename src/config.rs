use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RigConfig {
    pub serial: SerialConfig,
    pub input: InputConfig,
    pub recording: RecordingConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SerialConfig {
    /// Serial port the controller device is attached to
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate of the controller's serial output
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Per-read timeout in milliseconds (keeps the ingest loop responsive)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InputConfig {
    /// Minimum interval between accepted record-toggle presses, milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long both special buttons must be held to end the session, seconds
    #[serde(default = "default_long_press_secs")]
    pub long_press_secs: f64,

    /// Pin scan period in milliseconds
    #[serde(default = "default_pin_tick_ms")]
    pub pin_tick_ms: u64,

    /// Analog sensor report interval in milliseconds
    #[serde(default = "default_sensor_interval_ms")]
    pub sensor_interval_ms: u64,

    /// Arousal/valence adjustment per direction press
    #[serde(default = "default_av_step")]
    pub av_step: f32,

    /// Symmetric clamp bound for arousal/valence
    #[serde(default = "default_av_max")]
    pub av_max: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Root directory for experiment data
    #[serde(default = "default_recording_root")]
    pub root: String,

    /// Container extension written by the capture backend
    #[serde(default = "default_video_ext")]
    pub video_ext: String,

    /// Nominal capture frame rate
    #[serde(default = "default_capture_fps")]
    pub fps: u32,

    /// Preview frame rate (independent low-rate handle)
    #[serde(default = "default_preview_fps")]
    pub preview_fps: u32,

    /// Highest device index probed during camera detection
    #[serde(default = "default_max_probe_index")]
    pub max_probe_index: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl RigConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("affectrig.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("serial.port", default_serial_port())?
            .set_default("serial.baud_rate", default_baud_rate())?
            .set_default("serial.read_timeout_ms", default_read_timeout_ms())?
            .set_default("input.debounce_ms", default_debounce_ms())?
            .set_default("input.long_press_secs", default_long_press_secs())?
            .set_default("input.pin_tick_ms", default_pin_tick_ms())?
            .set_default("input.sensor_interval_ms", default_sensor_interval_ms())?
            .set_default("input.av_step", default_av_step() as f64)?
            .set_default("input.av_max", default_av_max() as f64)?
            .set_default("recording.root", default_recording_root())?
            .set_default("recording.video_ext", default_video_ext())?
            .set_default("recording.fps", default_capture_fps())?
            .set_default("recording.preview_fps", default_preview_fps())?
            .set_default("recording.max_probe_index", default_max_probe_index())?
            .set_default("system.event_bus_capacity", default_event_bus_capacity() as u64)?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("AFFECTRIG").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration values that serde defaults cannot catch
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.av_step <= 0.0 {
            return Err(ConfigError::Message(
                "input.av_step must be positive".to_string(),
            ));
        }
        if self.input.av_max <= 0.0 {
            return Err(ConfigError::Message(
                "input.av_max must be positive".to_string(),
            ));
        }
        if self.input.long_press_secs <= 0.0 {
            return Err(ConfigError::Message(
                "input.long_press_secs must be positive".to_string(),
            ));
        }
        if self.recording.fps == 0 {
            return Err(ConfigError::Message(
                "recording.fps must be at least 1".to_string(),
            ));
        }
        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "system.event_bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            input: InputConfig::default(),
            recording: RecordingConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            long_press_secs: default_long_press_secs(),
            pin_tick_ms: default_pin_tick_ms(),
            sensor_interval_ms: default_sensor_interval_ms(),
            av_step: default_av_step(),
            av_max: default_av_max(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            root: default_recording_root(),
            video_ext: default_video_ext(),
            fps: default_capture_fps(),
            preview_fps: default_preview_fps(),
            max_probe_index: default_max_probe_index(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

fn default_serial_port() -> String {
    if cfg!(windows) {
        "COM3".to_string()
    } else {
        "/dev/ttyACM0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    100
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_long_press_secs() -> f64 {
    3.0
}

fn default_pin_tick_ms() -> u64 {
    10
}

fn default_sensor_interval_ms() -> u64 {
    100
}

fn default_av_step() -> f32 {
    0.5
}

fn default_av_max() -> f32 {
    2.5
}

fn default_recording_root() -> String {
    "experiment_data".to_string()
}

fn default_video_ext() -> String {
    "mp4".to_string()
}

fn default_capture_fps() -> u32 {
    20
}

fn default_preview_fps() -> u32 {
    5
}

fn default_max_probe_index() -> u32 {
    10
}

fn default_event_bus_capacity() -> usize {
    256
}
