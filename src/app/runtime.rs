use super::{RigOrchestrator, ShutdownReason};
use crate::error::{Result, RigError};
use crate::events::RigEvent;
use crate::session::Directive;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

impl RigOrchestrator {
    /// Run the main event loop with signal handling
    ///
    /// Every bus event is applied to the session controller here, on
    /// one task, so session state never needs a lock.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Rig is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| RigError::system("Shutdown sender already taken"))?;

        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| RigError::system("Shutdown receiver already taken"))?;

        // Spawn signal handlers
        self.setup_signal_handlers(shutdown_sender).await;

        let mut event_rx = match self.event_rx.take() {
            Some(event_rx) => event_rx,
            None => self.event_bus.subscribe(),
        };

        let shutdown_reason = loop {
            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.unwrap_or_else(|_| {
                        ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
                    });
                }
                event = event_rx.recv() => {
                    match event {
                        Ok(RigEvent::ShutdownRequested { reason, .. }) => {
                            info!("Shutdown requested: {}", reason);
                            break ShutdownReason::UserRequest;
                        }
                        Ok(event) => {
                            if self.controller.handle_event(&event) == Directive::Shutdown {
                                break ShutdownReason::SessionEnded;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Event loop lagged, {} events dropped", skipped);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            break ShutdownReason::Error("Event bus closed".to_string());
                        }
                    }
                }
            }
        };

        info!("Shutdown initiated: {:?}", shutdown_reason);

        // Perform graceful shutdown
        let exit_code = self.shutdown().await?;

        info!("Rig shutdown complete");
        Ok(exit_code)
    }

    /// Set up signal handlers for graceful shutdown
    async fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
