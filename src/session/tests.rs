use super::*;
use crate::camera::{CaptureBackend, SyntheticBackend};
use crate::config::{InputConfig, RecordingConfig, RigConfig};
use crate::events::{Axis, GestureEvent, RigEvent, SensorSample};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_configs(root: &Path) -> (RecordingConfig, InputConfig) {
    let defaults = RigConfig::default();
    let mut recording = defaults.recording;
    recording.root = root.to_string_lossy().to_string();
    recording.fps = 100; // fast synthetic frames keep tests quick
    (recording, defaults.input)
}

fn controller_with(root: &Path, cameras: Vec<u32>) -> SessionController {
    let (recording, input) = test_configs(root);
    let backend: Arc<dyn CaptureBackend> = Arc::new(SyntheticBackend::new(cameras));
    SessionController::new(recording, input, backend)
}

fn armed_controller(root: &Path, cameras: Vec<u32>) -> SessionController {
    let selection = cameras.clone();
    let mut controller = controller_with(root, cameras);
    controller.detect_cameras().unwrap();
    controller.arm_experiment("EXP001", &selection).unwrap();
    controller
}

fn read_event_rows(session_dir: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(session_dir.join("events.jsonl")).unwrap();
    text.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn event_types(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .map(|row| row["event_type"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn detect_rejects_empty_camera_set() {
    let dir = TempDir::new().unwrap();
    let mut controller = controller_with(dir.path(), Vec::new());
    assert!(matches!(
        controller.detect_cameras(),
        Err(crate::error::SessionError::NoCamerasAvailable)
    ));
    assert_eq!(controller.phase(), Phase::Uninitialized);
}

#[test]
fn arm_rejects_empty_selection() {
    let dir = TempDir::new().unwrap();
    let mut controller = controller_with(dir.path(), vec![0]);
    controller.detect_cameras().unwrap();
    assert!(matches!(
        controller.arm_experiment("EXP001", &[]),
        Err(crate::error::SessionError::NoCamerasSelected)
    ));
    assert_eq!(controller.phase(), Phase::CamerasDetected);
}

#[test]
fn arm_rejects_unknown_camera() {
    let dir = TempDir::new().unwrap();
    let mut controller = controller_with(dir.path(), vec![0]);
    controller.detect_cameras().unwrap();
    assert!(matches!(
        controller.arm_experiment("EXP001", &[0, 7]),
        Err(crate::error::SessionError::UnknownCamera { index: 7 })
    ));
}

#[test]
fn arm_creates_timestamped_experiment_dir() {
    let dir = TempDir::new().unwrap();
    let controller = armed_controller(dir.path(), vec![0]);
    let experiment_dir = controller.experiment_dir().unwrap();
    assert!(experiment_dir.is_dir());
    let name = experiment_dir.file_name().unwrap().to_string_lossy();
    assert!(name.ends_with("_EXP001"));
    assert_eq!(controller.session_count(), 0);
}

#[test]
fn toggle_before_arming_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut controller = controller_with(dir.path(), vec![0]);
    assert!(controller.toggle_recording().is_err());
    assert!(!controller.is_recording());
}

#[test]
fn session_count_is_monotonic_across_cycles() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);

    for expected in 1..=3u32 {
        controller.toggle_recording().unwrap();
        assert!(controller.is_recording());
        assert_eq!(controller.session_count(), expected);
        controller.toggle_recording().unwrap();
        assert!(!controller.is_recording());
        assert_eq!(controller.session_count(), expected);
    }

    let experiment_dir = controller.experiment_dir().unwrap().clone();
    for n in 1..=3 {
        assert!(experiment_dir.join(format!("session_{:02}", n)).is_dir());
    }
}

#[test]
fn start_and_stop_rows_balance() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);
    let experiment_dir = controller.experiment_dir().unwrap().clone();

    controller.toggle_recording().unwrap();
    controller.toggle_recording().unwrap();
    controller.toggle_recording().unwrap();
    // Currently recording: starts == stops + 1
    let s1 = event_types(&read_event_rows(&experiment_dir.join("session_01")));
    let s2 = event_types(&read_event_rows(&experiment_dir.join("session_02")));
    let all: Vec<&String> = s1.iter().chain(s2.iter()).collect();
    let starts = all.iter().filter(|t| t.as_str() == "record_start").count();
    let stops = all.iter().filter(|t| t.as_str() == "record_stop").count();
    assert_eq!(starts, 2);
    assert_eq!(stops, 1);

    controller.toggle_recording().unwrap();
    let s2 = event_types(&read_event_rows(&experiment_dir.join("session_02")));
    assert_eq!(s2, vec!["record_start", "record_stop"]);
}

#[test]
fn av_state_clamps_saturating() {
    let mut av = AvState::new();
    for _ in 0..20 {
        av.apply(Axis::Arousal, 0.5, 2.5);
    }
    assert_eq!(av.arousal, 2.5);

    for _ in 0..40 {
        av.apply(Axis::Arousal, -0.5, 2.5);
    }
    assert_eq!(av.arousal, -2.5);

    av.apply(Axis::Valence, -100.0, 2.5);
    assert_eq!(av.valence, -2.5);
    av.apply(Axis::Valence, 0.5, 2.5);
    assert_eq!(av.valence, -2.0);
}

#[test]
fn av_state_persists_across_recording_sessions() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);

    controller.handle_event(&RigEvent::gesture(GestureEvent::DirectionChange {
        axis: Axis::Arousal,
        delta: 0.5,
    }));
    controller.toggle_recording().unwrap();
    controller.toggle_recording().unwrap();
    // Not reset by the idle/recording cycle
    assert_eq!(controller.av_state().arousal, 0.5);
}

#[test]
fn marker_outside_recording_is_a_silent_noop() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);
    let directive = controller.handle_event(&RigEvent::gesture(GestureEvent::Marker));
    assert_eq!(directive, Directive::Continue);
    assert!(!controller.is_recording());
}

#[test]
fn failed_start_rolls_back_and_keeps_idle() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);

    // Replace the experiment dir with a plain file so the session
    // subdirectory cannot be created
    let experiment_dir = controller.experiment_dir().unwrap().clone();
    std::fs::remove_dir_all(&experiment_dir).unwrap();
    std::fs::write(&experiment_dir, b"not a directory").unwrap();

    assert!(controller.toggle_recording().is_err());
    assert!(!controller.is_recording());
    // Counter not burned by the failed attempt
    assert_eq!(controller.session_count(), 0);
}

#[test]
fn sensor_samples_only_log_while_recording() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);
    let experiment_dir = controller.experiment_dir().unwrap().clone();

    controller.handle_event(&RigEvent::Sensor(SensorSample::now(11_111)));
    controller.toggle_recording().unwrap();
    controller.handle_event(&RigEvent::Sensor(SensorSample::now(22_222)));
    controller.handle_event(&RigEvent::Sensor(SensorSample::now(33_333)));
    controller.toggle_recording().unwrap();
    controller.handle_event(&RigEvent::Sensor(SensorSample::now(44_444)));

    let csv = std::fs::read_to_string(
        experiment_dir.join("session_01").join("gsr_data.csv"),
    )
    .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "timestamp,elapsed_seconds,gsr_value");
    assert_eq!(lines.len(), 3); // header + the two in-window samples
    assert!(lines[1].ends_with(",22222"));
    assert!(lines[2].ends_with(",33333"));

    // Latest value is retained for the UI regardless of recording state
    assert_eq!(controller.latest_sensor(), Some(44_444));
}

#[test]
fn end_to_end_two_camera_session() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0, 1]);
    let experiment_dir = controller.experiment_dir().unwrap().clone();

    controller.handle_event(&RigEvent::gesture(GestureEvent::RecordToggle));
    assert!(controller.is_recording());

    // Let the workers write a few frames
    std::thread::sleep(Duration::from_millis(100));

    controller.handle_event(&RigEvent::gesture(GestureEvent::DirectionChange {
        axis: Axis::Arousal,
        delta: 0.5,
    }));
    controller.handle_event(&RigEvent::gesture(GestureEvent::Marker));
    controller.handle_event(&RigEvent::gesture(GestureEvent::RecordToggle));
    assert!(!controller.is_recording());

    let session_dir = experiment_dir.join("session_01");
    for index in [0u32, 1] {
        let video = session_dir.join("video").join(format!("camera_{}.mp4", index));
        let data = std::fs::read(&video).unwrap();
        assert!(!data.is_empty(), "camera {} wrote no frames", index);
    }

    let rows = read_event_rows(&session_dir);
    assert_eq!(
        event_types(&rows),
        vec![
            "record_start",
            "av_change",
            "morph_awareness_marker",
            "record_stop"
        ]
    );
    assert_eq!(rows[1]["payload"]["arousal"].as_f64().unwrap(), 0.5);
    assert!(rows.iter().all(|row| row["pc_timestamp_ns"].is_i64()));

    let csv = std::fs::read_to_string(session_dir.join("gsr_data.csv")).unwrap();
    assert!(csv.starts_with("timestamp,elapsed_seconds,gsr_value"));
}

#[test]
fn session_end_while_recording_stops_cleanly() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);
    let experiment_dir = controller.experiment_dir().unwrap().clone();

    controller.handle_event(&RigEvent::gesture(GestureEvent::RecordToggle));
    std::thread::sleep(Duration::from_millis(50));

    let directive = controller.handle_event(&RigEvent::gesture(GestureEvent::SessionEnd));
    assert_eq!(directive, Directive::Shutdown);
    assert_eq!(controller.phase(), Phase::Ended);
    assert!(!controller.is_recording());

    let types = event_types(&read_event_rows(&experiment_dir.join("session_01")));
    assert_eq!(
        types.iter().filter(|t| t.as_str() == "record_stop").count(),
        1
    );
}

#[test]
fn worker_failure_does_not_stop_the_session() {
    let dir = TempDir::new().unwrap();
    let (recording, input) = test_configs(dir.path());
    let backend: Arc<dyn CaptureBackend> =
        Arc::new(SyntheticBackend::new(vec![0, 1]).with_broken(vec![1]));
    let mut controller = SessionController::new(recording, input, backend);
    controller.detect_cameras().unwrap();
    // Camera 1 fails enumeration (no frame), so select only what probed
    controller.arm_experiment("EXP001", &[0]).unwrap();

    controller.toggle_recording().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    // A worker failure surfaces but does not tear the session down
    let directive = controller.handle_event(&RigEvent::WorkerError {
        camera_index: 1,
        error: "device unplugged".to_string(),
    });
    assert_eq!(directive, Directive::Continue);
    assert!(controller.is_recording());
    controller.toggle_recording().unwrap();
}

#[test]
fn preview_and_recording_are_mutually_exclusive() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0, 1]);

    controller.toggle_recording().unwrap();
    // Camera 0 is recording: preview on it is refused
    assert!(matches!(
        controller.open_preview(0),
        Err(crate::error::SessionError::PreviewBusy { index: 0 })
    ));
    controller.toggle_recording().unwrap();

    // Idle again: preview opens, and starting a recording session
    // reclaims the device by closing the preview first
    controller.open_preview(0).unwrap();
    assert_eq!(controller.preview_camera(), Some(0));
    controller.toggle_recording().unwrap();
    assert_eq!(controller.preview_camera(), None);
    controller.toggle_recording().unwrap();
}

#[test]
fn shutdown_without_recording_is_a_noop_transition() {
    let dir = TempDir::new().unwrap();
    let mut controller = armed_controller(dir.path(), vec![0]);
    controller.shutdown();
    assert_eq!(controller.phase(), Phase::Ended);
    // Idempotent
    controller.shutdown();
    assert_eq!(controller.phase(), Phase::Ended);
}
