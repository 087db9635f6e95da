use super::*;
use crate::config::{AuthConfig, RetryConfig};
use crate::error::AuthError;
use crate::events::{EventBus, EventFilter};
use crate::frame::{FrameBuffer, RawFrame};
use crate::session::{AuthenticationOutcome, IndeterminateReason};
use crate::testing::{AuthStep, ScriptedAuthenticator, StubServer};
use std::sync::Arc;

/// Hands out a new frame per call, optionally running dry after `limit`
struct CountingCapture {
    captured: u32,
    limit: Option<u32>,
}

impl CountingCapture {
    fn unlimited() -> Self {
        Self {
            captured: 0,
            limit: None,
        }
    }
}

#[async_trait::async_trait]
impl FrameCapture for CountingCapture {
    async fn capture(&mut self) -> Option<FrameBuffer> {
        if self.limit.is_some_and(|limit| self.captured >= limit) {
            return None;
        }
        let id = self.captured as u64;
        self.captured += 1;
        FrameBuffer::from_raw(id, RawFrame::new(16, 16, vec![128u8; 16 * 16 * 4]))
    }
}

fn client_with(
    authenticator: Arc<ScriptedAuthenticator>,
    max_blur_attempts: u32,
    network_attempts: u32,
) -> AuthenticationClient {
    let auth = AuthConfig {
        network_attempts,
        ..AuthConfig::default()
    };
    let retry = RetryConfig {
        max_blur_attempts,
        ..RetryConfig::default()
    };
    AuthenticationClient::new(authenticator, &auth, &retry, EventBus::new(32))
}

#[tokio::test]
async fn test_blur_blur_genuine_takes_three_calls() {
    let authenticator = Arc::new(ScriptedAuthenticator::verdicts([
        Verdict::Blurry,
        Verdict::Blurry,
        Verdict::Genuine,
    ]));
    let client = client_with(authenticator.clone(), 4, 1);
    let mut capture = CountingCapture::unlimited();

    let outcome = client.authenticate(&mut capture).await;

    assert_eq!(outcome, AuthenticationOutcome::Genuine);
    assert_eq!(authenticator.calls(), 3);
    // Every submission uses a freshly captured frame
    assert_eq!(capture.captured, 3);
}

#[tokio::test]
async fn test_blur_until_bound_is_exhausted() {
    let authenticator = Arc::new(ScriptedAuthenticator::verdicts([Verdict::Blurry]));
    let client = client_with(authenticator.clone(), 4, 1);

    let outcome = client.authenticate(&mut CountingCapture::unlimited()).await;

    assert_eq!(
        outcome,
        AuthenticationOutcome::Indeterminate(IndeterminateReason::BlurRetryExhausted)
    );
    assert_eq!(authenticator.calls(), 4);
}

#[tokio::test]
async fn test_blur_loop_terminates_for_any_bound() {
    for bound in 1..=6 {
        let authenticator = Arc::new(ScriptedAuthenticator::verdicts([Verdict::Blurry]));
        let client = client_with(authenticator.clone(), bound, 1);

        let outcome = client.authenticate(&mut CountingCapture::unlimited()).await;

        assert_eq!(outcome.reason(), Some(IndeterminateReason::BlurRetryExhausted));
        assert_eq!(authenticator.calls(), bound as usize);
    }
}

#[tokio::test]
async fn test_counterfeit_verdict() {
    let authenticator = Arc::new(ScriptedAuthenticator::verdicts([Verdict::Counterfeit]));
    let client = client_with(authenticator.clone(), 4, 1);

    let outcome = client.authenticate(&mut CountingCapture::unlimited()).await;
    assert_eq!(outcome, AuthenticationOutcome::Counterfeit);
    assert_eq!(authenticator.calls(), 1);
}

#[tokio::test]
async fn test_network_failure_is_not_retried_by_default() {
    let authenticator = Arc::new(ScriptedAuthenticator::new([AuthStep::Status(502)]));
    let client = client_with(authenticator.clone(), 4, 1);

    let outcome = client.authenticate(&mut CountingCapture::unlimited()).await;

    assert_eq!(
        outcome,
        AuthenticationOutcome::Indeterminate(IndeterminateReason::NetworkFailure)
    );
    assert_eq!(authenticator.calls(), 1);
}

#[tokio::test]
async fn test_explicit_network_retry_is_bounded() {
    let authenticator = Arc::new(ScriptedAuthenticator::new([
        AuthStep::Status(502),
        AuthStep::Verdict(Verdict::Genuine),
    ]));
    let client = client_with(authenticator.clone(), 4, 2);
    assert_eq!(
        client.authenticate(&mut CountingCapture::unlimited()).await,
        AuthenticationOutcome::Genuine
    );

    let authenticator = Arc::new(ScriptedAuthenticator::new([AuthStep::Status(502)]));
    let client = client_with(authenticator.clone(), 4, 3);
    assert_eq!(
        client.authenticate(&mut CountingCapture::unlimited()).await,
        AuthenticationOutcome::Indeterminate(IndeterminateReason::NetworkFailure)
    );
    assert_eq!(authenticator.calls(), 3);
}

#[tokio::test]
async fn test_invalid_response_is_terminal() {
    let authenticator = Arc::new(ScriptedAuthenticator::new([AuthStep::Invalid]));
    let client = client_with(authenticator.clone(), 4, 3);

    let outcome = client.authenticate(&mut CountingCapture::unlimited()).await;
    assert_eq!(
        outcome,
        AuthenticationOutcome::Indeterminate(IndeterminateReason::InvalidResponse)
    );
    assert_eq!(authenticator.calls(), 1);
}

#[tokio::test]
async fn test_capture_failure_after_blur() {
    let authenticator = Arc::new(ScriptedAuthenticator::verdicts([Verdict::Blurry]));
    let client = client_with(authenticator.clone(), 4, 1);
    let mut capture = CountingCapture {
        captured: 0,
        limit: Some(1),
    };

    let outcome = client.authenticate(&mut capture).await;
    assert_eq!(
        outcome,
        AuthenticationOutcome::Indeterminate(IndeterminateReason::CaptureFailed)
    );
    assert_eq!(authenticator.calls(), 1);
}

#[tokio::test]
async fn test_attempt_events() {
    let bus = EventBus::new(32);
    let mut events = bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["authentication_attempt", "authentication_blurry"]),
        "test",
    );
    let authenticator = Arc::new(ScriptedAuthenticator::verdicts([
        Verdict::Blurry,
        Verdict::Genuine,
    ]));
    let client = AuthenticationClient::new(
        authenticator,
        &AuthConfig::default(),
        &RetryConfig::default(),
        bus.clone(),
    );

    client.authenticate(&mut CountingCapture::unlimited()).await;

    let types: Vec<&str> = events.drain().iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            "authentication_attempt",
            "authentication_blurry",
            "authentication_attempt"
        ]
    );
}

#[test]
fn test_verdict_wire_format() {
    let parse = |body: &str| serde_json::from_str::<types::AuthResponse>(body).map(|r| r.result);
    assert_eq!(parse(r#"{"result":"genuine"}"#).unwrap(), Verdict::Genuine);
    assert_eq!(parse(r#"{"result":"counterfeit"}"#).unwrap(), Verdict::Counterfeit);
    assert_eq!(parse(r#"{"result":"blur"}"#).unwrap(), Verdict::Blurry);
    assert_eq!(parse(r#"{"result":"blurry"}"#).unwrap(), Verdict::Blurry);
    assert!(parse(r#"{"result":"maybe"}"#).is_err());
}

fn payload() -> ImagePayload {
    let frame =
        FrameBuffer::from_raw(7, RawFrame::new(8, 8, vec![200u8; 8 * 8 * 4])).unwrap();
    ImagePayload::jpeg(&frame, 90).unwrap()
}

#[tokio::test]
async fn test_http_authenticator_posts_multipart_jpeg() {
    let server = StubServer::start(|_| (200, r#"{"result":"blur"}"#.to_string())).await;
    let config = AuthConfig {
        endpoint: server.url("/authenticate"),
        ..AuthConfig::default()
    };
    let authenticator = HttpAuthenticator::new(&config).unwrap();

    assert_eq!(authenticator.submit(payload()).await.unwrap(), Verdict::Blurry);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/authenticate");
    assert!(requests[0]
        .header("content-type")
        .is_some_and(|v| v.starts_with("multipart/form-data")));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file""#));
    assert!(body.contains(r#"filename="frame-7.jpg""#));
    assert!(body.contains("image/jpeg"));
}

#[tokio::test]
async fn test_http_authenticator_error_status() {
    let server = StubServer::start(|_| (500, "{}".to_string())).await;
    let config = AuthConfig {
        endpoint: server.url("/authenticate"),
        ..AuthConfig::default()
    };
    let authenticator = HttpAuthenticator::new(&config).unwrap();

    assert!(matches!(
        authenticator.submit(payload()).await,
        Err(AuthError::Status { status: 500 })
    ));
}

#[tokio::test]
async fn test_http_authenticator_invalid_body() {
    let server = StubServer::start(|_| (200, "<html>oops</html>".to_string())).await;
    let config = AuthConfig {
        endpoint: server.url("/authenticate"),
        ..AuthConfig::default()
    };
    let authenticator = HttpAuthenticator::new(&config).unwrap();

    assert!(matches!(
        authenticator.submit(payload()).await,
        Err(AuthError::InvalidResponse { .. })
    ));
}
