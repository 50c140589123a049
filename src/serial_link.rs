use crate::config::{InputConfig, SerialConfig};
use crate::events::{Axis, EventBus, GestureEvent, RigEvent, SensorSample};
use crate::input::Button;
use crate::transport::{parse_line, DeviceLine, LineAssembler};
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_RETRIES: u32 = 10;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Serial ingestion: reads the controller device's line stream, decodes
/// it, and publishes typed events on the bus.
///
/// A missing port degrades rather than fails - keyboard input keeps the
/// rig usable - with a one-time warning and periodic reconnect attempts.
pub struct SerialLink {
    serial_config: SerialConfig,
    input_config: InputConfig,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl SerialLink {
    pub fn new(
        serial_config: SerialConfig,
        input_config: InputConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            serial_config,
            input_config,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start the ingestion loop on a blocking task
    pub fn start(&self) {
        info!(
            "Starting serial link on {} @ {} baud",
            self.serial_config.port, self.serial_config.baud_rate
        );

        let serial_config = self.serial_config.clone();
        let input_config = self.input_config.clone();
        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            let mut retry_count = 0;

            while !cancellation_token.is_cancelled() {
                match Self::run_port(
                    &serial_config,
                    &input_config,
                    &event_bus,
                    &cancellation_token,
                ) {
                    Ok(()) => break, // cancelled
                    Err(e) => {
                        retry_count += 1;
                        if retry_count == 1 {
                            warn!(
                                "Serial port {} unavailable: {} - continuing with keyboard input only",
                                serial_config.port, e
                            );
                            let _ = event_bus.publish(RigEvent::SerialStatusChanged {
                                connected: false,
                                timestamp: SystemTime::now(),
                            });
                        } else {
                            debug!(
                                "Serial reconnect attempt {}/{} failed: {}",
                                retry_count, MAX_RETRIES, e
                            );
                        }

                        if retry_count >= MAX_RETRIES {
                            warn!(
                                "Giving up on serial port {} after {} attempts",
                                serial_config.port, MAX_RETRIES
                            );
                            break;
                        }

                        let delay = RETRY_DELAY * 2_u32.pow(retry_count.min(4));
                        if Self::wait_or_cancel(&cancellation_token, delay) {
                            break;
                        }
                    }
                }
            }

            debug!("Serial link task exited");
        });
    }

    /// Stop the ingestion loop
    pub fn stop(&self) {
        info!("Stopping serial link");
        self.cancellation_token.cancel();
    }

    fn wait_or_cancel(token: &CancellationToken, delay: Duration) -> bool {
        let step = Duration::from_millis(100);
        let mut waited = Duration::ZERO;
        while waited < delay {
            if token.is_cancelled() {
                return true;
            }
            std::thread::sleep(step);
            waited += step;
        }
        token.is_cancelled()
    }

    /// Read from the open port until cancelled or the port errors out
    fn run_port(
        serial_config: &SerialConfig,
        input_config: &InputConfig,
        event_bus: &EventBus,
        cancellation_token: &CancellationToken,
    ) -> Result<(), String> {
        let mut port = serialport::new(&serial_config.port, serial_config.baud_rate)
            .timeout(Duration::from_millis(serial_config.read_timeout_ms))
            .open()
            .map_err(|e| e.to_string())?;

        info!("Serial port {} opened", serial_config.port);
        let _ = event_bus.publish(RigEvent::SerialStatusChanged {
            connected: true,
            timestamp: SystemTime::now(),
        });

        let mut assembler = LineAssembler::new();
        let mut buf = [0u8; 256];
        let mut consecutive_errors = 0u32;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        while !cancellation_token.is_cancelled() {
            match port.read(&mut buf) {
                Ok(0) => continue,
                Ok(n) => {
                    consecutive_errors = 0;
                    for line in assembler.push(&buf[..n]) {
                        match parse_line(&line) {
                            Some(device_line) => {
                                Self::publish_line(device_line, input_config, event_bus)
                            }
                            None => debug!("Dropped unrecognized line: {:?}", line),
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        let _ = event_bus.publish(RigEvent::SerialStatusChanged {
                            connected: false,
                            timestamp: SystemTime::now(),
                        });
                        return Err(format!("read failed repeatedly: {}", e));
                    }
                    warn!("Serial read error ({}): {}", consecutive_errors, e);
                }
            }
        }

        Ok(())
    }

    /// Map one decoded wire line to a bus event. Direction and marker
    /// releases are dropped host-side - only press edges carry meaning
    /// for the session controller.
    fn publish_line(line: DeviceLine, input_config: &InputConfig, event_bus: &EventBus) {
        let event = match line {
            DeviceLine::Sensor(raw_value) => RigEvent::Sensor(SensorSample::now(raw_value)),
            DeviceLine::Edge { pressed: false, .. } => return,
            DeviceLine::Edge { button, .. } => {
                let step = input_config.av_step;
                let gesture = match button {
                    Button::Up => GestureEvent::DirectionChange {
                        axis: Axis::Arousal,
                        delta: step,
                    },
                    Button::Down => GestureEvent::DirectionChange {
                        axis: Axis::Arousal,
                        delta: -step,
                    },
                    Button::Right => GestureEvent::DirectionChange {
                        axis: Axis::Valence,
                        delta: step,
                    },
                    Button::Left => GestureEvent::DirectionChange {
                        axis: Axis::Valence,
                        delta: -step,
                    },
                    Button::Marker => GestureEvent::Marker,
                };
                RigEvent::gesture(gesture)
            }
            DeviceLine::RecordToggle => RigEvent::gesture(GestureEvent::RecordToggle),
            DeviceLine::SessionEnd => RigEvent::gesture(GestureEvent::SessionEnd),
        };

        if let Err(e) = event_bus.publish(event) {
            warn!("Failed to publish serial event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigConfig;

    fn input_config() -> InputConfig {
        RigConfig::default().input
    }

    #[tokio::test]
    async fn sensor_line_publishes_sample() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        SerialLink::publish_line(DeviceLine::Sensor(12_345), &input_config(), &bus);

        match rx.recv().await.unwrap() {
            RigEvent::Sensor(sample) => assert_eq!(sample.raw_value, 12_345),
            other => panic!("Expected sensor event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn press_edges_map_to_direction_changes() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        SerialLink::publish_line(
            DeviceLine::Edge {
                button: Button::Down,
                pressed: true,
            },
            &input_config(),
            &bus,
        );

        match rx.recv().await.unwrap() {
            RigEvent::Gesture {
                gesture: GestureEvent::DirectionChange { axis, delta },
                ..
            } => {
                assert_eq!(axis, Axis::Arousal);
                assert_eq!(delta, -0.5);
            }
            other => panic!("Expected direction change, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn release_edges_are_dropped() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        SerialLink::publish_line(
            DeviceLine::Edge {
                button: Button::Up,
                pressed: false,
            },
            &input_config(),
            &bus,
        );
        SerialLink::publish_line(DeviceLine::RecordToggle, &input_config(), &bus);

        // Only the toggle arrives
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "record_toggle");
    }
}
