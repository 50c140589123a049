use super::*;
use crate::camera::SyntheticBackend;
use crate::config::RigConfig;
use crate::session::Phase;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_config(root: &TempDir) -> RigConfig {
    let mut config = RigConfig::default();
    config.recording.root = root.path().to_string_lossy().into_owned();
    config.recording.fps = 100;
    config
}

fn create_orchestrator(root: &TempDir, cameras: Vec<u32>) -> RigOrchestrator {
    let backend = Arc::new(SyntheticBackend::new(cameras));
    let mut orchestrator =
        RigOrchestrator::new(create_test_config(root), backend).expect("orchestrator creation");
    // Input sources touch real devices, keep them out of tests
    orchestrator.set_serial_enabled(false);
    orchestrator.set_keyboard_enabled(false);
    orchestrator
}

#[tokio::test]
async fn orchestrator_creation() {
    let root = TempDir::new().unwrap();
    let orchestrator = create_orchestrator(&root, vec![0]);

    let states = orchestrator.get_all_component_states().await;
    assert!(states.is_empty()); // No components started yet
    assert_eq!(orchestrator.controller().phase(), Phase::Uninitialized);
    assert_eq!(orchestrator.config().recording.fps, 100);
}

#[tokio::test]
async fn initialize_registers_enabled_components() {
    let root = TempDir::new().unwrap();
    let mut orchestrator = create_orchestrator(&root, vec![0]);
    orchestrator.initialize().await.unwrap();

    let states = orchestrator.get_all_component_states().await;
    assert_eq!(states.get("session"), Some(&ComponentState::Stopped));
    assert!(!states.contains_key("serial"));
    assert!(!states.contains_key("keyboard"));
}

#[tokio::test]
async fn start_arms_the_experiment() {
    let root = TempDir::new().unwrap();
    let mut orchestrator = create_orchestrator(&root, vec![0, 2]);
    orchestrator.initialize().await.unwrap();
    orchestrator.start("EXP042", &[]).await.unwrap();

    assert_eq!(orchestrator.controller().phase(), Phase::Armed);
    assert_eq!(orchestrator.controller().available_cameras(), &[0, 2]);
    assert_eq!(
        orchestrator.get_component_state("session").await,
        Some(ComponentState::Running)
    );
}

#[tokio::test]
async fn start_fails_without_cameras() {
    let root = TempDir::new().unwrap();
    let mut orchestrator = create_orchestrator(&root, vec![]);
    orchestrator.initialize().await.unwrap();

    assert!(orchestrator.start("EXP042", &[]).await.is_err());
    assert_eq!(orchestrator.controller().phase(), Phase::Uninitialized);
}

#[tokio::test]
async fn start_rejects_unknown_camera_selection() {
    let root = TempDir::new().unwrap();
    let mut orchestrator = create_orchestrator(&root, vec![0]);
    orchestrator.initialize().await.unwrap();

    assert!(orchestrator.start("EXP042", &[7]).await.is_err());
    assert_ne!(orchestrator.controller().phase(), Phase::Armed);
}

#[tokio::test]
async fn shutdown_after_start_ends_the_session() {
    let root = TempDir::new().unwrap();
    let mut orchestrator = create_orchestrator(&root, vec![0]);
    orchestrator.initialize().await.unwrap();
    orchestrator.start("EXP042", &[]).await.unwrap();

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);
    assert_eq!(orchestrator.controller().phase(), Phase::Ended);
    assert_eq!(
        orchestrator.get_component_state("session").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn component_state_management() {
    let root = TempDir::new().unwrap();
    let orchestrator = create_orchestrator(&root, vec![0]);

    orchestrator
        .set_component_state("session", ComponentState::Starting)
        .await;
    assert_eq!(
        orchestrator.get_component_state("session").await,
        Some(ComponentState::Starting)
    );

    orchestrator
        .set_component_state("session", ComponentState::Running)
        .await;
    orchestrator
        .set_component_state("serial", ComponentState::Failed)
        .await;

    let all_states = orchestrator.get_all_component_states().await;
    assert_eq!(all_states.len(), 2);
    assert_eq!(all_states.get("session"), Some(&ComponentState::Running));
    assert_eq!(all_states.get("serial"), Some(&ComponentState::Failed));
}

#[tokio::test]
async fn concurrent_component_state_access() {
    let root = TempDir::new().unwrap();
    let orchestrator = Arc::new(create_orchestrator(&root, vec![0]));

    let mut handles = Vec::new();
    for i in 0..10 {
        let orchestrator_clone = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            let component_name = format!("component_{}", i);
            orchestrator_clone
                .set_component_state(&component_name, ComponentState::Running)
                .await;
            orchestrator_clone
                .get_component_state(&component_name)
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(ComponentState::Running));
    }

    let all_states = orchestrator.get_all_component_states().await;
    assert_eq!(all_states.len(), 10);
}

#[test]
fn shutdown_reason_debug_formatting() {
    let reasons = vec![
        ShutdownReason::Signal("SIGTERM".to_string()),
        ShutdownReason::Error("Test error".to_string()),
        ShutdownReason::UserRequest,
        ShutdownReason::SessionEnded,
    ];

    for reason in reasons {
        let debug_str = format!("{:?}", reason);
        assert!(!debug_str.is_empty());

        match reason {
            ShutdownReason::Signal(ref sig) => assert!(debug_str.contains(sig)),
            ShutdownReason::Error(ref msg) => assert!(debug_str.contains(msg)),
            ShutdownReason::UserRequest => assert!(debug_str.contains("UserRequest")),
            ShutdownReason::SessionEnded => assert!(debug_str.contains("SessionEnded")),
        }
    }
}
