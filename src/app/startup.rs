use super::{ComponentState, RigOrchestrator};
use crate::error::Result;
use tracing::{error, info};

impl RigOrchestrator {
    /// Initialize all rig components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing rig components");

        // Set initial component states
        let mut states = self.component_states.lock().await;
        states.insert("session".to_string(), ComponentState::Stopped);

        if self.serial_enabled {
            states.insert("serial".to_string(), ComponentState::Stopped);
        }
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all rig components: probe cameras, arm the experiment,
    /// then bring up the input sources.
    ///
    /// An empty `camera_selection` selects every detected camera.
    pub async fn start(&mut self, experiment_id: &str, camera_selection: &[u32]) -> Result<()> {
        info!("Starting rig for experiment '{}'", experiment_id);

        // Camera detection and arming come first so input events never
        // arrive at an unarmed controller
        self.set_component_state("session", ComponentState::Starting)
            .await;

        let detected = self.controller.detect_cameras().map_err(|e| {
            error!("Camera detection failed: {}", e);
            e
        })?;
        info!("Detected cameras: {:?}", detected);

        let selection: Vec<u32> = if camera_selection.is_empty() {
            detected.to_vec()
        } else {
            camera_selection.to_vec()
        };

        let experiment_dir = self
            .controller
            .arm_experiment(experiment_id, &selection)
            .map_err(|e| {
                error!("Failed to arm experiment: {}", e);
                e
            })?;

        self.set_component_state("session", ComponentState::Running)
            .await;
        info!(
            "Experiment armed - data directory {}",
            experiment_dir.display()
        );

        // Start serial ingestion
        if self.serial_enabled {
            if let Some(serial_link) = &self.serial_link {
                self.set_component_state("serial", ComponentState::Starting)
                    .await;
                serial_link.start();
                self.set_component_state("serial", ComponentState::Running)
                    .await;
                info!("Serial link started");
            }
        }

        // Start keyboard fallback
        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;

                keyboard_handler.start().await.map_err(|e| {
                    error!("Failed to start keyboard handler: {}", e);
                    e
                })?;

                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
                info!("Keyboard handler started");
            }
        }

        info!("Rig started successfully");
        Ok(())
    }
}
