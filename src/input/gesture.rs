use super::sampler::{PinId, RawPinSample};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Buttons carried on the wire. Direction buttons and the marker button
/// report both edges; the record-toggle pin only reports accepted presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Marker,
}

impl Button {
    pub fn name(&self) -> &'static str {
        match self {
            Button::Up => "UP",
            Button::Down => "DOWN",
            Button::Left => "LEFT",
            Button::Right => "RIGHT",
            Button::Marker => "MARKER",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "UP" => Some(Button::Up),
            "DOWN" => Some(Button::Down),
            "LEFT" => Some(Button::Left),
            "RIGHT" => Some(Button::Right),
            "MARKER" => Some(Button::Marker),
            _ => None,
        }
    }

    fn from_pin(pin: PinId) -> Option<Self> {
        match pin {
            PinId::Up => Some(Button::Up),
            PinId::Down => Some(Button::Down),
            PinId::Left => Some(Button::Left),
            PinId::Right => Some(Button::Right),
            PinId::Marker => Some(Button::Marker),
            PinId::RecordToggle => None,
        }
    }
}

/// Output of the gesture engine, one entry per emitted wire line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Edge { button: Button, pressed: bool },
    RecordToggle,
    SessionEnd,
}

/// Timing parameters for the debounce and long-press detectors
#[derive(Debug, Clone, Copy)]
pub struct GestureTiming {
    pub debounce: Duration,
    pub long_press: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            long_press: Duration::from_secs(3),
        }
    }
}

/// Composite long-press detector state (Marker + RecordToggle held together)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldState {
    Idle,
    Holding { since: Duration },
    Fired,
}

/// Converts raw pin samples into discrete semantic events.
///
/// Per-pin edge tracking plus two cross-pin detectors: the debounced
/// record-toggle and the both-buttons long press. All timing comes from
/// the caller-supplied monotonic timestamps; nothing here blocks.
pub struct GestureEngine {
    timing: GestureTiming,
    last_level: HashMap<PinId, bool>,
    last_toggle_accept: Option<Duration>,
    hold: HoldState,
}

impl GestureEngine {
    pub fn new(timing: GestureTiming) -> Self {
        Self {
            timing,
            last_level: HashMap::new(),
            last_toggle_accept: None,
            hold: HoldState::Idle,
        }
    }

    pub fn hold_state(&self) -> HoldState {
        self.hold
    }

    /// Process one full pin scan. Events are returned in detection order.
    pub fn update(&mut self, samples: &[RawPinSample], now: Duration) -> Vec<DeviceEvent> {
        let mut events = Vec::new();

        for sample in samples {
            let last = *self.last_level.entry(sample.pin).or_insert(true);
            if sample.level == last {
                continue;
            }
            self.last_level.insert(sample.pin, sample.level);

            match sample.pin {
                PinId::RecordToggle => {
                    // Only the accepted press edge matters; releases and
                    // bounced presses inside the debounce window are dropped.
                    if sample.pressed() && self.debounce_accepts(now) {
                        self.last_toggle_accept = Some(now);
                        debug!("Record toggle accepted at {:?}", now);
                        events.push(DeviceEvent::RecordToggle);
                    }
                }
                pin => {
                    if let Some(button) = Button::from_pin(pin) {
                        events.push(DeviceEvent::Edge {
                            button,
                            pressed: sample.pressed(),
                        });
                    }
                }
            }
        }

        if let Some(event) = self.update_hold(samples, now) {
            events.push(event);
        }

        events
    }

    fn debounce_accepts(&self, now: Duration) -> bool {
        match self.last_toggle_accept {
            Some(last) => now.saturating_sub(last) >= self.timing.debounce,
            None => true,
        }
    }

    /// Composite detector: Idle -> Holding on both-pressed, Holding -> Fired
    /// after the threshold (emitting SessionEnd once), any release -> Idle.
    fn update_hold(&mut self, samples: &[RawPinSample], now: Duration) -> Option<DeviceEvent> {
        let marker_pressed = self.pin_pressed(samples, PinId::Marker)?;
        let toggle_pressed = self.pin_pressed(samples, PinId::RecordToggle)?;
        let both_pressed = marker_pressed && toggle_pressed;

        match self.hold {
            HoldState::Idle => {
                if both_pressed {
                    debug!("Long press started at {:?}", now);
                    self.hold = HoldState::Holding { since: now };
                }
                None
            }
            HoldState::Holding { since } => {
                if !both_pressed {
                    debug!("Long press cancelled");
                    self.hold = HoldState::Idle;
                    None
                } else if now.saturating_sub(since) >= self.timing.long_press {
                    self.hold = HoldState::Fired;
                    Some(DeviceEvent::SessionEnd)
                } else {
                    None
                }
            }
            HoldState::Fired => {
                // The fired flag holds until either button releases,
                // preventing repeat firing during one continuous hold.
                if !both_pressed {
                    self.hold = HoldState::Idle;
                }
                None
            }
        }
    }

    fn pin_pressed(&self, samples: &[RawPinSample], pin: PinId) -> Option<bool> {
        samples
            .iter()
            .find(|s| s.pin == pin)
            .map(RawPinSample::pressed)
    }
}
