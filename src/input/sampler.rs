use crate::events::SensorSample;
use std::time::Duration;
use tracing::{debug, warn};

/// Logical identifier of a digital input pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinId {
    Up,
    Down,
    Left,
    Right,
    Marker,
    RecordToggle,
}

impl PinId {
    pub const ALL: [PinId; 6] = [
        PinId::Up,
        PinId::Down,
        PinId::Left,
        PinId::Right,
        PinId::Marker,
        PinId::RecordToggle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PinId::Up => "UP",
            PinId::Down => "DOWN",
            PinId::Left => "LEFT",
            PinId::Right => "RIGHT",
            PinId::Marker => "MARKER",
            PinId::RecordToggle => "RECORD",
        }
    }
}

/// One raw digital reading. Pull-up wiring: physical press reads logic low.
#[derive(Debug, Clone, Copy)]
pub struct RawPinSample {
    pub pin: PinId,
    /// Raw logic level (true = high = released on pull-up wiring)
    pub level: bool,
    /// Monotonic timestamp of the scan that produced this sample
    pub at: Duration,
}

impl RawPinSample {
    pub fn pressed(&self) -> bool {
        !self.level
    }
}

/// A digital input pin handle. Ownership is passed into the sampler
/// constructor; the sampler is the only reader.
pub trait PinReader: Send {
    fn level(&self) -> bool;
}

/// The analog sensor channel. Returns raw ADC counts (0..=65535).
pub trait AnalogReader: Send {
    fn read(&mut self) -> Result<u16, String>;
}

/// Raw input layer: scans digital pins at a fast cadence and the analog
/// channel at a slower one. No debounce logic lives here.
pub struct InputSampler {
    pins: Vec<(PinId, Box<dyn PinReader>)>,
    analog: Option<Box<dyn AnalogReader>>,
    analog_warned: bool,
    sensor_interval: Duration,
    last_sensor_at: Option<Duration>,
}

impl InputSampler {
    /// Create a sampler owning the given pin handles. `analog` may be
    /// `None` when the sensor failed to initialize; digital scanning
    /// continues and sensor data is reported as unavailable.
    pub fn new(
        pins: Vec<(PinId, Box<dyn PinReader>)>,
        analog: Option<Box<dyn AnalogReader>>,
        sensor_interval: Duration,
    ) -> Self {
        if analog.is_none() {
            warn!("Analog sensor unavailable - continuing with digital pins only");
        }
        Self {
            pins,
            analog,
            analog_warned: false,
            sensor_interval,
            last_sensor_at: None,
        }
    }

    pub fn sensor_available(&self) -> bool {
        self.analog.is_some()
    }

    /// Scan every digital pin once. Produces one ephemeral sample per pin;
    /// the gesture engine consumes them immediately.
    pub fn scan_pins(&self, now: Duration) -> Vec<RawPinSample> {
        self.pins
            .iter()
            .map(|(pin, reader)| RawPinSample {
                pin: *pin,
                level: reader.level(),
                at: now,
            })
            .collect()
    }

    /// Read the analog channel if its report interval has elapsed.
    ///
    /// A single failed read is dropped; the sampler keeps running.
    pub fn poll_sensor(&mut self, now: Duration) -> Option<SensorSample> {
        let analog = self.analog.as_mut()?;

        if let Some(last) = self.last_sensor_at {
            if now.saturating_sub(last) < self.sensor_interval {
                return None;
            }
        }
        self.last_sensor_at = Some(now);

        match analog.read() {
            Ok(raw_value) => Some(SensorSample::now(raw_value)),
            Err(e) => {
                if !self.analog_warned {
                    warn!("Analog sensor read failed: {}", e);
                    self.analog_warned = true;
                } else {
                    debug!("Analog sensor read failed: {}", e);
                }
                None
            }
        }
    }
}
