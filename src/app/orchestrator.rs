use super::types::ComponentState;
use crate::camera::CaptureBackend;
use crate::config::RigConfig;
use crate::error::Result;
use crate::events::{EventBus, RigEvent};
use crate::keyboard::KeyboardHandler;
use crate::serial_link::SerialLink;
use crate::session::SessionController;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Main application coordinator that manages all rig components
pub struct RigOrchestrator {
    pub(super) config: RigConfig,
    pub(super) event_bus: Arc<EventBus>,

    // Components
    pub(super) controller: SessionController,
    pub(super) serial_link: Option<SerialLink>,
    pub(super) serial_enabled: bool,
    pub(super) keyboard_handler: Option<KeyboardHandler>,
    pub(super) keyboard_enabled: bool,

    // Subscribed at construction so no event published during startup
    // can be missed by the run loop
    pub(super) event_rx: Option<broadcast::Receiver<RigEvent>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<super::types::ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<super::types::ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl RigOrchestrator {
    /// Create a new orchestrator with the given configuration and
    /// capture backend
    pub fn new(config: RigConfig, backend: Arc<dyn CaptureBackend>) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let controller = SessionController::new(
            config.recording.clone(),
            config.input.clone(),
            backend,
        );

        let serial_link = Some(SerialLink::new(
            config.serial.clone(),
            config.input.clone(),
            Arc::clone(&event_bus),
        ));

        let keyboard_handler = Some(KeyboardHandler::new(
            config.input.clone(),
            Arc::clone(&event_bus),
        ));

        let event_rx = Some(event_bus.subscribe());

        Ok(Self {
            config,
            event_bus,
            event_rx,
            controller,
            serial_link,
            serial_enabled: true,
            keyboard_handler,
            keyboard_enabled: true,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the serial link
    pub fn set_serial_enabled(&mut self, enabled: bool) {
        self.serial_enabled = enabled;
    }

    /// Enable or disable the keyboard fallback
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Access the session controller
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Access the active configuration
    pub fn config(&self) -> &RigConfig {
        &self.config
    }
}
