use super::scan::{ScanResult, ScanSession};
use super::timers::PendingTimers;
use crate::auth::{AuthenticationClient, Authenticator};
use crate::camera::CapabilityNegotiator;
use crate::config::AuthscanConfig;
use crate::decode::{DecodeEngine, SymbolDecoder};
use crate::error::Result;
use crate::events::{EventBus, ScanEvent};
use crate::geolocation::{GeolocationLookup, GeolocationProvider};
use crate::session::{
    AuthenticationOutcome, IndeterminateReason, OutcomePublisher, PublishedOutcome,
    SessionContext, Telemetry,
};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a session run ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Published(PublishedOutcome),
    /// Torn down before an outcome was published
    Stopped,
}

/// Camera negotiation through outcome publication, one session per `run`
pub struct ScanPipeline {
    config: AuthscanConfig,
    negotiator: CapabilityNegotiator,
    engine: DecodeEngine,
    client: AuthenticationClient,
    geolocation: Arc<dyn GeolocationProvider>,
    publisher: OutcomePublisher,
    event_bus: EventBus,
    device_id: String,
    batch: Option<String>,
    timers: PendingTimers,
}

impl ScanPipeline {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn assemble(
        config: AuthscanConfig,
        negotiator: CapabilityNegotiator,
        decoder: Arc<dyn SymbolDecoder>,
        authenticator: Arc<dyn Authenticator>,
        geolocation: Arc<dyn GeolocationProvider>,
        publisher: OutcomePublisher,
        event_bus: EventBus,
        device_id: String,
        batch: Option<String>,
    ) -> Self {
        let engine = DecodeEngine::new(decoder, &config.decode);
        let client = AuthenticationClient::new(
            authenticator,
            &config.auth,
            &config.retry,
            event_bus.clone(),
        );
        Self {
            config,
            negotiator,
            engine,
            client,
            geolocation,
            publisher,
            event_bus,
            device_id,
            batch,
            timers: PendingTimers::new(),
        }
    }

    pub fn config(&self) -> &AuthscanConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Timers currently armed by a running session
    pub fn pending_timers(&self) -> usize {
        self.timers.count()
    }

    /// Run one scan session.
    ///
    /// Camera failures are returned as errors and publish nothing. Every other
    /// terminal state publishes exactly one outcome. The stream is released
    /// before publication and on every exit path.
    pub async fn run(&self, context: &SessionContext, cancel: CancellationToken) -> Result<SessionEnd> {
        context.begin_scan();

        let device = self.negotiator.select_rear_camera().await?;
        self.event_bus.emit(ScanEvent::CameraSelected {
            device_id: device.id.clone(),
            label: device.label.clone(),
        });

        let (width, height) = self.config.camera.ideal_resolution;
        let stream = self.negotiator.open_stream(&device, width, height).await?;
        let (actual_width, actual_height) = stream.dimensions();
        self.event_bus.emit(ScanEvent::StreamOpened {
            width: actual_width,
            height: actual_height,
        });

        let mut lookup = GeolocationLookup::spawn(
            Arc::clone(&self.geolocation),
            context.clone(),
            self.event_bus.clone(),
        );

        let mut session = ScanSession::new(
            stream,
            &self.config,
            self.timers.clone(),
            self.event_bus.clone(),
        );

        let outcome = match session.scan(&self.engine, &cancel).await {
            ScanResult::Cancelled => return Ok(self.stopped(&mut session)),
            ScanResult::TimedOut => {
                AuthenticationOutcome::Indeterminate(IndeterminateReason::Timeout)
            }
            ScanResult::Hit(result) => {
                self.event_bus.emit(ScanEvent::SymbolDetected {
                    payload: result.payload.clone(),
                });
                self.event_bus.emit(ScanEvent::Status {
                    message: "Authenticating...".to_string(),
                });

                let authenticated = {
                    let mut capture = session.capture();
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        outcome = self.client.authenticate(&mut capture) => Some(outcome),
                    }
                };
                match authenticated {
                    Some(outcome) => outcome,
                    None => return Ok(self.stopped(&mut session)),
                }
            }
        };

        // Authentication supersedes sampling; the camera is no longer needed
        session.teardown();

        if cancel.is_cancelled() {
            return Ok(self.stopped(&mut session));
        }

        let location = match lookup.settle(self.config.telemetry.geolocation_settle()).await {
            Some(location) => Some(location),
            None => context.location(),
        };
        drop(lookup);

        let telemetry = Telemetry {
            device_id: self.device_id.clone(),
            batch: self.batch.clone(),
            location,
        };

        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(self.stopped(&mut session)),
            published = self.publisher.publish(context, outcome, telemetry) => published?,
        };

        info!("Scan session finished: {}", published.outcome);
        Ok(SessionEnd::Published(published))
    }

    fn stopped(&self, session: &mut ScanSession) -> SessionEnd {
        session.teardown();
        warn!("Scan session stopped before publishing an outcome");
        self.event_bus.emit(ScanEvent::SessionStopped {
            timestamp: SystemTime::now(),
        });
        SessionEnd::Stopped
    }
}
