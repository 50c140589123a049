use crate::config::InputConfig;
use crate::error::Result;
use crate::events::{Axis, EventBus, GestureEvent, RigEvent};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Keyboard fallback for driving a session without the controller
/// device attached. Mirrors the device's gestures: arrow keys move the
/// arousal/valence state, 'p' drops a marker, 'r' toggles recording.
pub struct KeyboardHandler {
    input_config: InputConfig,
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
}

impl KeyboardHandler {
    pub fn new(input_config: InputConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            input_config,
            event_bus,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard handler - arrows adjust A/V, 'p' marks, 'r' toggles recording, 'q' quits");

        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();
        let av_step = self.input_config.av_step;

        // Spawn a blocking task to handle keyboard input
        task::spawn_blocking(move || {
            // Enable raw mode to capture individual key presses
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            info!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard handler stopping");
                    break;
                }

                // Poll for keyboard events with a timeout
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        if let Ok(Event::Key(key_event)) = event::read() {
                            // Only handle key press events (not release)
                            if key_event.kind != KeyEventKind::Press {
                                continue;
                            }

                            let Some(rig_event) = map_key(key_event.code, av_step) else {
                                debug!("Key pressed: {:?}", key_event.code);
                                continue;
                            };

                            let is_shutdown =
                                matches!(rig_event, RigEvent::ShutdownRequested { .. });
                            if let Err(e) = event_bus.publish(rig_event) {
                                warn!("Failed to publish keyboard event: {}", e);
                            }
                            if is_shutdown {
                                info!("Quit key pressed - requesting shutdown");
                                break;
                            }
                        }
                    }
                    Ok(false) => {
                        // No event available, continue polling
                    }
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            // Disable raw mode when exiting
            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}

/// Translate a key press into a bus event, if the key is bound
fn map_key(code: KeyCode, av_step: f32) -> Option<RigEvent> {
    let direction = |axis, delta| RigEvent::gesture(GestureEvent::DirectionChange { axis, delta });

    match code {
        KeyCode::Up => Some(direction(Axis::Arousal, av_step)),
        KeyCode::Down => Some(direction(Axis::Arousal, -av_step)),
        KeyCode::Right => Some(direction(Axis::Valence, av_step)),
        KeyCode::Left => Some(direction(Axis::Valence, -av_step)),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(RigEvent::gesture(GestureEvent::Marker)),
        // F13/F15 match the dedicated keys the controller device presents
        // when enumerated as a USB keyboard
        KeyCode::Char('r') | KeyCode::Char('R') | KeyCode::F(13) => {
            Some(RigEvent::gesture(GestureEvent::RecordToggle))
        }
        KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::F(15) => {
            Some(RigEvent::gesture(GestureEvent::SessionEnd))
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(RigEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "User requested via keyboard".to_string(),
        }),
        _ => None,
    }
}
