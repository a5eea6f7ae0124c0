// Integration tests for the recording half of a session
//
// These tests drive the session through a scripted backend with the tokio
// clock paused, so progress ticks land at exact, repeatable instants.

mod common;

use anyhow::Result;
use common::{error_observer, full_observer, settle, test_config, ScriptedBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use voice_session::audio::{AudioRoute, DeviceEvent};
use voice_session::session::ClockMode;
use voice_session::{AudioSession, ErrorKind, RecordingState, SessionError};

fn spawn(backend: &ScriptedBackend) -> AudioSession {
    AudioSession::spawn(test_config("/docs"), Arc::new(backend.clone()))
}

#[tokio::test(start_paused = true)]
async fn test_start_recording_uses_default_path() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    let path = session.start_recording(None).await?;
    assert_eq!(path, PathBuf::from("/docs/recordedVoice.m4a"));

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Recording);
    assert_eq!(snapshot.recording_duration, 0);
    assert_eq!(snapshot.recording_current_time, 0);
    assert_eq!(snapshot.clock_mode, Some(ClockMode::Recording));
    assert_eq!(snapshot.last_recording, Some(path));
    assert_eq!(
        backend.last_route(),
        Some(AudioRoute::PlayAndRecord {
            default_to_speaker: true
        })
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_explicit_destination_is_used() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    let path = session
        .start_recording(Some(PathBuf::from("/tmp/take-2.m4a")))
        .await?;
    assert_eq!(path, PathBuf::from("/tmp/take-2.m4a"));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recording_ticks_and_meter_samples() -> Result<()> {
    let backend = ScriptedBackend::new();
    backend.script().level_db = -12.5;
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    session.start_recording(None).await?;

    // Recording ticks every 500ms: three ticks by 1.55s
    tokio::time::sleep(Duration::from_millis(1550)).await;

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.elapsed_ticks, 3);
    assert_eq!(snapshot.recording_current_time, 1, "3 ticks / 2 = 1s");

    let log = log.lock().unwrap();
    assert_eq!(log.meters, vec![-12.5, -12.5, -12.5]);
    assert!(log.errors.is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_meter_not_sampled_without_meter_handler() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, _log) = error_observer();
    session.set_observer(&observer).await?;

    session.start_recording(None).await?;
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert_eq!(session.snapshot().await?.elapsed_ticks, 4);
    assert_eq!(backend.journal().meter_reads, 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_snaps_current_time_to_device_duration() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    session.start_recording(None).await?;
    tokio::time::sleep(Duration::from_millis(1550)).await;

    // Device clock drifted ahead of the tick count
    backend.script().recorder_elapsed = Duration::from_millis(7_400);

    let duration = session.stop_recording().await?;
    assert_eq!(duration, 7);

    settle().await;
    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.recording_duration, 7);
    assert_eq!(snapshot.recording_current_time, snapshot.recording_duration);
    assert_eq!(snapshot.clock_mode, None);
    assert_eq!(backend.last_route(), Some(AudioRoute::Inactive));

    let log = log.lock().unwrap();
    assert_eq!(log.record_finishes, vec![true], "finish forwarded exactly once");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_after_stop() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    session.start_recording(None).await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    session.stop_recording().await?;

    let ticks = session.snapshot().await?.elapsed_ticks;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.snapshot().await?.elapsed_ticks, ticks);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_recorder_reports_once() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    let err = session.stop_recording().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RecorderStopFailed));

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.recording_duration, 0);
    assert_eq!(snapshot.recording_current_time, 0);

    assert_eq!(
        log.lock().unwrap().error_kinds(),
        vec![ErrorKind::RecorderStopFailed]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_double_stop_is_reported_not_fatal() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    session.start_recording(None).await?;
    session.stop_recording().await?;

    let err = session.stop_recording().await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RecorderStopFailed));

    // The session is still usable
    session.start_recording(None).await?;
    assert_eq!(
        session.snapshot().await?.recording_state,
        RecordingState::Recording
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_leaves_session_idle() -> Result<()> {
    let backend = ScriptedBackend::new();
    backend.script().recorder_init_fails = true;
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    let err = session.start_recording(None).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::RecorderInitFailed));
    assert!(err.to_string().contains("capture device unavailable"));

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.clock_mode, None);
    assert_eq!(
        log.lock().unwrap().error_kinds(),
        vec![ErrorKind::RecorderInitFailed]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_init_failure_releases_route() -> Result<()> {
    let backend = ScriptedBackend::new();
    backend.script().recorder_init_fails = true;
    let session = spawn(&backend);

    session.start_recording(None).await.unwrap_err();

    assert_eq!(
        backend.journal().routes,
        vec![
            AudioRoute::PlayAndRecord {
                default_to_speaker: true
            },
            AudioRoute::Inactive
        ]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_returned_without_observer() -> Result<()> {
    let backend = ScriptedBackend::new();
    backend.script().recorder_init_fails = true;
    let session = spawn(&backend);

    let err = session.start_recording(None).await.unwrap_err();
    assert!(matches!(err, SessionError::Failed(ref e) if e.kind == ErrorKind::RecorderInitFailed));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_dropped_observer_is_not_called() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;
    drop(observer);

    session.start_recording(None).await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    session.stop_recording().await?;
    settle().await;

    let log = log.lock().unwrap();
    assert!(log.meters.is_empty());
    assert!(log.record_finishes.is_empty());
    assert_eq!(backend.journal().meter_reads, 0);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_capture_ending_on_its_own_settles_idle() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    session.start_recording(None).await?;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    backend.script().recorder_elapsed = Duration::from_secs(1);
    backend.recorder_event(DeviceEvent::RecordingFinished {
        successfully: false,
    });
    settle().await;

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Idle);
    assert_eq!(snapshot.clock_mode, None);
    assert_eq!(snapshot.recording_current_time, snapshot.recording_duration);
    assert_eq!(log.lock().unwrap().record_finishes, vec![false]);

    // A stop afterwards still collects the device duration
    assert_eq!(session.stop_recording().await?, 1);
    settle().await;
    assert_eq!(log.lock().unwrap().record_finishes, vec![false]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_encode_error_reported_without_state_change() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);
    let (observer, log) = full_observer();
    session.set_observer(&observer).await?;

    session.start_recording(None).await?;
    backend.recorder_event(DeviceEvent::EncodeError("bitstream overflow".to_string()));
    settle().await;

    let snapshot = session.snapshot().await?;
    assert_eq!(snapshot.recording_state, RecordingState::Recording);

    let log = log.lock().unwrap();
    assert_eq!(log.error_kinds(), vec![ErrorKind::PlayDecodeError]);
    assert_eq!(log.errors[0].kind.code(), -5);
    assert_eq!(log.errors[0].context, "bitstream overflow");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recording_state_across_start_stop_sequences() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    assert_eq!(
        session.snapshot().await?.recording_state,
        RecordingState::Idle
    );

    for round in 1..=3u64 {
        session.start_recording(None).await?;
        assert_eq!(
            session.snapshot().await?.recording_state,
            RecordingState::Recording
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        backend.script().recorder_elapsed = Duration::from_secs(round);

        assert_eq!(session.stop_recording().await?, round);
        let snapshot = session.snapshot().await?;
        assert_eq!(snapshot.recording_state, RecordingState::Idle);
        assert_eq!(snapshot.recording_current_time, round);
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_start_while_recording_is_busy() -> Result<()> {
    let backend = ScriptedBackend::new();
    let session = spawn(&backend);

    session.start_recording(None).await?;
    let err = session.start_recording(None).await.unwrap_err();
    assert!(matches!(err, SessionError::Busy { .. }));

    Ok(())
}
