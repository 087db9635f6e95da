use super::*;
use crate::auth::Verdict;
use crate::camera::{CameraDevice, CapabilityNegotiator, Facing, MockMediaDevices};
use crate::config::AuthscanConfig;
use crate::decode::DecodeResult;
use crate::error::{AuthscanError, CameraError};
use crate::events::EventBus;
use crate::pipeline::ScanPipelineBuilder;
use crate::session::{IndeterminateReason, ResultPage};
use crate::testing::{square_symbol, ScriptedAuthenticator, ScriptedDecoder};
use std::sync::Arc;

fn rear_camera() -> MockMediaDevices {
    MockMediaDevices::new(vec![CameraDevice::video(
        "rear",
        "Back Camera",
        Facing::Rear,
    )])
}

fn large_symbol() -> Option<DecodeResult> {
    Some(square_symbol("https://example.com/p/9", 10.0, 30.4))
}

fn create_test_orchestrator(
    devices: &MockMediaDevices,
    decoder: ScriptedDecoder,
    verdict: Verdict,
) -> AuthscanOrchestrator {
    let config = AuthscanConfig::default();
    let pipeline = ScanPipelineBuilder::new(config.clone())
        .negotiator(CapabilityNegotiator::new(
            Arc::new(devices.clone()),
            config.camera.clone(),
        ))
        .decoder(Arc::new(decoder))
        .authenticator(Arc::new(ScriptedAuthenticator::verdicts([verdict])))
        .event_bus(EventBus::new(64))
        .device_id("kiosk-1")
        .build()
        .unwrap();
    AuthscanOrchestrator::from_pipeline(pipeline)
}

#[tokio::test(start_paused = true)]
async fn test_run_reports_genuine() {
    let devices = rear_camera();
    let mut orchestrator = create_test_orchestrator(
        &devices,
        ScriptedDecoder::new(vec![large_symbol()]),
        Verdict::Genuine,
    );

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.page, ResultPage::Genuine);
    assert_eq!(report.exit_code(), 0);
    assert!(report.shutdown.is_none());
    let published = report.published.unwrap();
    assert_eq!(published.device_id, "kiosk-1");
    // The result view consumed the outcome
    assert!(orchestrator.context().is_empty());
    assert_eq!(devices.active_tracks(), 0);
    assert_eq!(
        orchestrator.get_component_state("pipeline"),
        Some(ComponentState::Stopped)
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_reports_counterfeit() {
    let devices = rear_camera();
    let mut orchestrator = create_test_orchestrator(
        &devices,
        ScriptedDecoder::new(vec![large_symbol()]),
        Verdict::Counterfeit,
    );

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.page, ResultPage::Counterfeit);
    assert_eq!(report.exit_code(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_times_out_as_indeterminate() {
    let devices = rear_camera();
    let mut orchestrator =
        create_test_orchestrator(&devices, ScriptedDecoder::new(vec![]), Verdict::Genuine);

    let report = orchestrator.run().await.unwrap();

    assert_eq!(
        report.page,
        ResultPage::Indeterminate(IndeterminateReason::Timeout)
    );
    assert_eq!(report.exit_code(), 3);
    assert_eq!(orchestrator.pipeline().pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_and_redirects() {
    let devices = rear_camera();
    let mut orchestrator =
        create_test_orchestrator(&devices, ScriptedDecoder::new(vec![]), Verdict::Genuine);

    orchestrator.shutdown(ShutdownReason::UserRequest);
    orchestrator.shutdown(ShutdownReason::Signal("SIGINT".to_string()));
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.page, ResultPage::RedirectToScan);
    assert_eq!(report.exit_code(), 1);
    assert!(report.published.is_none());
    assert_eq!(report.shutdown, Some(ShutdownReason::UserRequest));
    assert_eq!(devices.active_tracks(), 0);
    assert_eq!(orchestrator.pipeline().pending_timers(), 0);
}

#[tokio::test]
async fn test_camera_error_fails_pipeline() {
    let devices = MockMediaDevices::new(vec![]);
    let mut orchestrator =
        create_test_orchestrator(&devices, ScriptedDecoder::new(vec![]), Verdict::Genuine);

    let result = orchestrator.run().await;

    assert!(matches!(
        result,
        Err(AuthscanError::Camera(CameraError::NoCameraAvailable))
    ));
    assert_eq!(
        orchestrator.get_component_state("pipeline"),
        Some(ComponentState::Failed)
    );
}

#[tokio::test]
async fn test_new_with_still_image_applies_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let options = LaunchOptions {
        image: Some(dir.path().join("label.png")),
        device_label: Some("still".to_string()),
        batch: Some("LOT-42".to_string()),
    };

    let orchestrator = AuthscanOrchestrator::new(AuthscanConfig::default(), options).unwrap();

    assert_eq!(
        orchestrator.config().camera.device_label.as_deref(),
        Some("still")
    );
    assert_eq!(orchestrator.get_all_component_states().len(), 1);
}

#[cfg(not(all(target_os = "linux", feature = "camera")))]
#[tokio::test]
async fn test_new_without_camera_backend() {
    let result = AuthscanOrchestrator::new(AuthscanConfig::default(), LaunchOptions::default());
    assert!(matches!(result, Err(AuthscanError::System { .. })));
}
