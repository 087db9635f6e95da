use super::types::{ImagePayload, Verdict};
use super::Authenticator;
use crate::config::{AuthConfig, RetryConfig};
use crate::error::AuthError;
use crate::events::{EventBus, ScanEvent};
use crate::frame::FrameBuffer;
use crate::session::{AuthenticationOutcome, IndeterminateReason};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of fresh frames for (re)submission
#[async_trait]
pub trait FrameCapture: Send {
    async fn capture(&mut self) -> Option<FrameBuffer>;
}

/// Round-trips captured frames through the authenticator.
///
/// `max_blur_attempts` bounds the total number of submissions while the
/// verdict stays blurry; `network_attempts` bounds submissions that fail in
/// transport. Neither loop is open-ended.
pub struct AuthenticationClient {
    authenticator: Arc<dyn Authenticator>,
    max_blur_attempts: u32,
    network_attempts: u32,
    jpeg_quality: u8,
    event_bus: EventBus,
}

impl AuthenticationClient {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        auth: &AuthConfig,
        retry: &RetryConfig,
        event_bus: EventBus,
    ) -> Self {
        Self {
            authenticator,
            max_blur_attempts: retry.max_blur_attempts.max(1),
            network_attempts: auth.network_attempts.max(1),
            jpeg_quality: auth.jpeg_quality,
            event_bus,
        }
    }

    pub async fn authenticate(&self, capture: &mut dyn FrameCapture) -> AuthenticationOutcome {
        let mut submissions = 0u32;
        let mut blurry = 0u32;
        let mut network_failures = 0u32;

        loop {
            let Some(frame) = capture.capture().await else {
                warn!("No frame available for authentication");
                return AuthenticationOutcome::Indeterminate(IndeterminateReason::CaptureFailed);
            };

            let payload = match ImagePayload::jpeg(&frame, self.jpeg_quality) {
                Ok(payload) => payload,
                Err(e) => {
                    error!("Failed to encode frame {}: {}", frame.id, e);
                    return AuthenticationOutcome::Indeterminate(
                        IndeterminateReason::CaptureFailed,
                    );
                }
            };
            drop(frame);

            submissions += 1;
            self.event_bus.emit(ScanEvent::AuthenticationAttempt {
                attempt: submissions,
            });

            match self.authenticator.submit(payload).await {
                Ok(Verdict::Genuine) => {
                    info!("Authenticator verdict: genuine (attempt {})", submissions);
                    return AuthenticationOutcome::Genuine;
                }
                Ok(Verdict::Counterfeit) => {
                    info!("Authenticator verdict: counterfeit (attempt {})", submissions);
                    return AuthenticationOutcome::Counterfeit;
                }
                Ok(Verdict::Blurry) => {
                    blurry += 1;
                    self.event_bus.emit(ScanEvent::AuthenticationBlurry {
                        attempt: submissions,
                    });
                    if blurry >= self.max_blur_attempts {
                        warn!("Frame still blurry after {} submissions", blurry);
                        return AuthenticationOutcome::Indeterminate(
                            IndeterminateReason::BlurRetryExhausted,
                        );
                    }
                    debug!(
                        "Blurry verdict {}/{}, capturing a new frame",
                        blurry, self.max_blur_attempts
                    );
                }
                Err(AuthError::InvalidResponse { details }) => {
                    error!("Authenticator response rejected: {}", details);
                    return AuthenticationOutcome::Indeterminate(
                        IndeterminateReason::InvalidResponse,
                    );
                }
                Err(e) => {
                    network_failures += 1;
                    warn!(
                        "Authentication request failed ({}/{}): {}",
                        network_failures, self.network_attempts, e
                    );
                    if network_failures >= self.network_attempts {
                        return AuthenticationOutcome::Indeterminate(
                            IndeterminateReason::NetworkFailure,
                        );
                    }
                }
            }
        }
    }
}
