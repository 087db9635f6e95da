use super::context::SessionContext;
use super::outcome::{AuthenticationOutcome, PublishedOutcome, Telemetry};
use crate::config::{AuthConfig, TelemetryConfig};
use crate::error::PublishError;
use crate::events::{EventBus, ScanEvent};
use crate::geolocation::Coordinates;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Counter and location logging endpoints
#[async_trait]
pub trait TelemetryService: Send + Sync {
    /// Next value of the per-device request counter
    async fn request_count(&self, device_id: &str) -> Result<u64, PublishError>;

    async fn public_ip(&self) -> Result<String, PublishError>;

    async fn log_location(
        &self,
        device_id: &str,
        location: Coordinates,
        ip: &str,
        result: &str,
        count: u64,
    ) -> Result<(), PublishError>;
}

/// HTTP telemetry: `GET {base}/counter/{id} -> [count]`,
/// `GET {base}/latlon/{id}/{lat}/{lon}/{ip}/{result}/{count}`, and an IP
/// lookup returning `{"ip": ..}`.
pub struct HttpTelemetry {
    client: reqwest::Client,
    base_url: String,
    ip_lookup_url: String,
}

#[derive(Deserialize)]
struct IpResponse {
    ip: String,
}

impl HttpTelemetry {
    pub fn new(config: &TelemetryConfig, auth: &AuthConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(auth.request_timeout())
            .build()
            .map_err(telemetry_error)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ip_lookup_url: config.ip_lookup_url.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, PublishError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(telemetry_error)?;
        if !response.status().is_success() {
            return Err(PublishError::Telemetry {
                details: format!("{} returned HTTP {}", url, response.status().as_u16()),
            });
        }
        Ok(response)
    }
}

fn telemetry_error(e: reqwest::Error) -> PublishError {
    PublishError::Telemetry {
        details: e.to_string(),
    }
}

#[async_trait]
impl TelemetryService for HttpTelemetry {
    async fn request_count(&self, device_id: &str) -> Result<u64, PublishError> {
        let url = format!("{}/counter/{}", self.base_url, device_id);
        let counts: Vec<u64> = self
            .get(&url)
            .await?
            .json()
            .await
            .map_err(telemetry_error)?;
        counts.first().copied().ok_or_else(|| PublishError::Telemetry {
            details: "counter endpoint returned an empty list".to_string(),
        })
    }

    async fn public_ip(&self) -> Result<String, PublishError> {
        let response: IpResponse = self
            .get(&self.ip_lookup_url)
            .await?
            .json()
            .await
            .map_err(telemetry_error)?;
        Ok(response.ip)
    }

    async fn log_location(
        &self,
        device_id: &str,
        location: Coordinates,
        ip: &str,
        result: &str,
        count: u64,
    ) -> Result<(), PublishError> {
        let url = format!(
            "{}/latlon/{}/{}/{}/{}/{}/{}",
            self.base_url, device_id, location.latitude, location.longitude, ip, result, count
        );
        self.get(&url).await?;
        Ok(())
    }
}

/// Writes the terminal outcome into the session context and signals the result view
pub struct OutcomePublisher {
    telemetry: Option<Arc<dyn TelemetryService>>,
    event_bus: EventBus,
}

impl OutcomePublisher {
    pub fn new(telemetry: Option<Arc<dyn TelemetryService>>, event_bus: EventBus) -> Self {
        Self {
            telemetry,
            event_bus,
        }
    }

    /// Write-once per scan: a second call before the context is consumed fails.
    /// Telemetry failures are logged and never block publication.
    pub async fn publish(
        &self,
        context: &SessionContext,
        outcome: AuthenticationOutcome,
        telemetry: Telemetry,
    ) -> Result<PublishedOutcome, PublishError> {
        if context.is_published() {
            return Err(PublishError::AlreadyPublished);
        }

        let count = match &self.telemetry {
            Some(service) => self.report(service.as_ref(), &outcome, &telemetry).await,
            None => None,
        };

        let published = PublishedOutcome {
            outcome,
            device_id: telemetry.device_id,
            batch: telemetry.batch,
            location: telemetry.location,
            count,
            published_at: Utc::now(),
        };
        context.store_outcome(&published)?;

        info!("Published outcome {} for {}", outcome, published.device_id);
        self.event_bus.emit(ScanEvent::OutcomePublished {
            outcome: outcome.as_str().to_string(),
            timestamp: SystemTime::now(),
        });
        self.event_bus.emit(ScanEvent::NavigateToResult);

        Ok(published)
    }

    async fn report(
        &self,
        service: &dyn TelemetryService,
        outcome: &AuthenticationOutcome,
        telemetry: &Telemetry,
    ) -> Option<u64> {
        let count = match service.request_count(&telemetry.device_id).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Request counter unavailable: {}", e);
                return None;
            }
        };

        let Some(location) = telemetry.location else {
            debug!("No location to log for request {}", count);
            return Some(count);
        };

        let result = match service.public_ip().await {
            Ok(ip) => {
                service
                    .log_location(&telemetry.device_id, location, &ip, outcome.as_str(), count)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("Location logging failed: {}", e);
        }

        Some(count)
    }
}
