use super::runner::ScanPipeline;
use crate::auth::Authenticator;
use crate::camera::CapabilityNegotiator;
use crate::config::AuthscanConfig;
use crate::decode::{RqrrDecoder, SymbolDecoder};
use crate::error::{AuthscanError, Result};
use crate::events::EventBus;
use crate::geolocation::{GeolocationProvider, NoGeolocation};
use crate::session::{OutcomePublisher, TelemetryService};
use std::sync::Arc;
use tracing::debug;

/// Builder for [`ScanPipeline`]. Negotiator and authenticator are required.
pub struct ScanPipelineBuilder {
    config: AuthscanConfig,
    negotiator: Option<CapabilityNegotiator>,
    decoder: Option<Arc<dyn SymbolDecoder>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    geolocation: Option<Arc<dyn GeolocationProvider>>,
    telemetry: Option<Arc<dyn TelemetryService>>,
    event_bus: Option<EventBus>,
    device_id: Option<String>,
    batch: Option<String>,
}

impl ScanPipelineBuilder {
    pub fn new(config: AuthscanConfig) -> Self {
        Self {
            config,
            negotiator: None,
            decoder: None,
            authenticator: None,
            geolocation: None,
            telemetry: None,
            event_bus: None,
            device_id: None,
            batch: None,
        }
    }

    pub fn negotiator(mut self, negotiator: CapabilityNegotiator) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    /// Defaults to [`RqrrDecoder`]
    pub fn decoder(mut self, decoder: Arc<dyn SymbolDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Defaults to no location capability
    pub fn geolocation(mut self, geolocation: Arc<dyn GeolocationProvider>) -> Self {
        self.geolocation = Some(geolocation);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetryService>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Overrides `telemetry.device_id`; a random id is generated when neither is set
    pub fn device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn batch(mut self, batch: Option<String>) -> Self {
        self.batch = batch.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn build(self) -> Result<ScanPipeline> {
        let negotiator = self
            .negotiator
            .ok_or_else(|| AuthscanError::system("A capability negotiator must be specified"))?;
        let authenticator = self
            .authenticator
            .ok_or_else(|| AuthscanError::system("An authenticator must be specified"))?;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| EventBus::new(self.config.system.event_bus_capacity));
        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(RqrrDecoder::new()) as Arc<dyn SymbolDecoder>);
        let geolocation = self
            .geolocation
            .unwrap_or_else(|| Arc::new(NoGeolocation) as Arc<dyn GeolocationProvider>);
        let device_id = self
            .device_id
            .or_else(|| self.config.telemetry.device_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!("Scan pipeline device id: {}", device_id);

        let publisher = OutcomePublisher::new(self.telemetry, event_bus.clone());

        Ok(ScanPipeline::assemble(
            self.config,
            negotiator,
            decoder,
            authenticator,
            geolocation,
            publisher,
            event_bus,
            device_id,
            self.batch,
        ))
    }
}
