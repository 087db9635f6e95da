use super::types::{ComponentState, LaunchOptions, ShutdownReason};
use crate::auth::HttpAuthenticator;
use crate::camera::{CapabilityNegotiatorBuilder, MediaDevices, StillImageDevices};
use crate::config::AuthscanConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::geolocation::{GeolocationProvider, HttpGeolocation, NoGeolocation};
use crate::pipeline::{ScanPipeline, ScanPipelineBuilder};
use crate::session::{HttpTelemetry, SessionContext};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Level};

pub(super) const PIPELINE: &str = "pipeline";

/// Wires configuration into a scan pipeline and runs it under signal-driven teardown
pub struct AuthscanOrchestrator {
    pub(super) config: AuthscanConfig,
    pub(super) event_bus: EventBus,
    pub(super) context: SessionContext,
    pub(super) pipeline: ScanPipeline,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_reason: Arc<Mutex<Option<ShutdownReason>>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) handle_signals: bool,
}

impl AuthscanOrchestrator {
    /// Build every collaborator from configuration
    pub fn new(mut config: AuthscanConfig, options: LaunchOptions) -> Result<Self> {
        if let Some(label) = &options.device_label {
            config.camera.device_label = Some(label.clone());
        }

        let event_bus = if tracing::enabled!(Level::DEBUG) {
            EventBus::with_debug_logging(config.system.event_bus_capacity)
        } else {
            EventBus::new(config.system.event_bus_capacity)
        };

        let negotiator = CapabilityNegotiatorBuilder::new()
            .config(config.camera.clone())
            .devices(media_devices(&config, &options)?)
            .build()?;

        let authenticator = Arc::new(HttpAuthenticator::new(&config.auth)?);
        info!("Authentication endpoint: {}", authenticator.endpoint());

        let geolocation: Arc<dyn GeolocationProvider> = match &config.telemetry.geolocation_url {
            Some(url) => Arc::new(HttpGeolocation::new(
                url.clone(),
                config.auth.request_timeout(),
            )?),
            None => {
                debug!("No geolocation source configured");
                Arc::new(NoGeolocation)
            }
        };

        let mut builder = ScanPipelineBuilder::new(config.clone())
            .negotiator(negotiator)
            .authenticator(authenticator)
            .geolocation(geolocation)
            .event_bus(event_bus)
            .batch(options.batch.clone());

        if config.telemetry.enabled {
            let telemetry = HttpTelemetry::new(&config.telemetry, &config.auth)?;
            builder = builder.telemetry(Arc::new(telemetry));
        } else {
            info!("Telemetry disabled");
        }

        let mut orchestrator = Self::from_pipeline(builder.build()?);
        orchestrator.handle_signals = true;
        Ok(orchestrator)
    }

    /// Wrap an already assembled pipeline. Signal handling is off.
    pub fn from_pipeline(pipeline: ScanPipeline) -> Self {
        let orchestrator = Self {
            config: pipeline.config().clone(),
            event_bus: pipeline.event_bus().clone(),
            context: SessionContext::default(),
            pipeline,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_reason: Arc::new(Mutex::new(None)),
            cancellation_token: CancellationToken::new(),
            handle_signals: false,
        };
        orchestrator.set_component_state(PIPELINE, ComponentState::Stopped);
        orchestrator
    }

    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn config(&self) -> &AuthscanConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn pipeline(&self) -> &ScanPipeline {
        &self.pipeline
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}

fn media_devices(config: &AuthscanConfig, options: &LaunchOptions) -> Result<Arc<dyn MediaDevices>> {
    if let Some(path) = &options.image {
        info!("Using still image camera: {}", path.display());
        let devices = StillImageDevices::new(path).with_max_zoom(config.retry.max_zoom);
        return Ok(Arc::new(devices));
    }

    #[cfg(all(target_os = "linux", feature = "camera"))]
    {
        let devices =
            crate::camera::GstMediaDevices::new()?.with_zoom_range(config.camera.zoom_range);
        Ok(Arc::new(devices))
    }

    #[cfg(not(all(target_os = "linux", feature = "camera")))]
    {
        Err(crate::error::AuthscanError::system(
            "No camera backend available: pass --image or build with the `camera` feature",
        ))
    }
}
