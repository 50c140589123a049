use super::{ComponentState, RigOrchestrator};
use crate::error::{Result, RigError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

impl RigOrchestrator {
    /// Perform graceful shutdown of all components
    ///
    /// Input sources stop first so no further events can reach the
    /// controller while it closes logs and joins recording workers.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            if let Err(e) = self.stop_component("keyboard").await {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        if self.serial_enabled {
            if let Err(e) = self.stop_component("serial").await {
                error!("Error stopping serial: {}", e);
                exit_code = 1;
            }
        }

        if let Err(e) = self.stop_component("session").await {
            error!("Error stopping session: {}", e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop a specific component
    async fn stop_component(&mut self, component: &str) -> Result<()> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match component {
            "keyboard" => {
                if let Some(keyboard_handler) = &self.keyboard_handler {
                    match timeout(Duration::from_secs(2), keyboard_handler.stop()).await {
                        Ok(Ok(())) => {
                            self.set_component_state(component, ComponentState::Stopped)
                                .await;
                            info!("{} component stopped", component);
                            Ok(())
                        }
                        Ok(Err(e)) => {
                            self.set_component_state(component, ComponentState::Failed)
                                .await;
                            error!("Error stopping {} component: {}", component, e);
                            Err(e)
                        }
                        Err(_) => {
                            self.set_component_state(component, ComponentState::Failed)
                                .await;
                            error!("{} component stop timeout", component);
                            Err(RigError::system(format!(
                                "{} component stop timeout",
                                component
                            )))
                        }
                    }
                } else {
                    self.set_component_state(component, ComponentState::Stopped)
                        .await;
                    Ok(())
                }
            }
            "serial" => {
                if let Some(serial_link) = &self.serial_link {
                    serial_link.stop();
                }
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            "session" => {
                // Stops recording workers and closes session logs.
                // Joining the worker threads blocks, but each worker
                // honors its stop signal within one frame period.
                self.controller.shutdown();
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            _ => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                Ok(())
            }
        }
    }
}
