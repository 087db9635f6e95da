use crate::error::GeolocationError;
use crate::events::{EventBus, ScanEvent};
use crate::session::SessionContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// One-shot position source
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, GeolocationError>;
}

/// Looks the position up from an HTTP endpoint answering `{"latitude": .., "longitude": ..}`
pub struct HttpGeolocation {
    client: reqwest::Client,
    url: String,
}

impl HttpGeolocation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GeolocationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeolocationError::Lookup {
                details: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl GeolocationProvider for HttpGeolocation {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let lookup = |e: reqwest::Error| GeolocationError::Lookup {
            details: e.to_string(),
        };

        let response = self.client.get(&self.url).send().await.map_err(lookup)?;
        let response = response.error_for_status().map_err(lookup)?;
        response.json::<Coordinates>().await.map_err(lookup)
    }
}

/// Always reports the same position
pub struct FixedGeolocation(pub Coordinates);

#[async_trait]
impl GeolocationProvider for FixedGeolocation {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Ok(self.0)
    }
}

/// Device without a location capability
pub struct NoGeolocation;

#[async_trait]
impl GeolocationProvider for NoGeolocation {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        Err(GeolocationError::NotSupported)
    }
}

/// Background location lookup, independent of the scan loop
pub struct GeolocationLookup;

impl GeolocationLookup {
    /// Start a single lookup. The result lands in the session context; a
    /// failure only sets the unavailable flag.
    pub fn spawn(
        provider: Arc<dyn GeolocationProvider>,
        context: SessionContext,
        event_bus: EventBus,
    ) -> LookupHandle {
        let handle = tokio::spawn(async move {
            match provider.locate().await {
                Ok(coordinates) => {
                    info!(
                        "Location resolved: {:.5}, {:.5}",
                        coordinates.latitude, coordinates.longitude
                    );
                    context.record_location(coordinates);
                    event_bus.emit(ScanEvent::LocationResolved {
                        latitude: coordinates.latitude,
                        longitude: coordinates.longitude,
                    });
                    Some(coordinates)
                }
                Err(e) => {
                    context.mark_location_unavailable();
                    event_bus.emit(ScanEvent::LocationUnavailable {
                        reason: e.to_string(),
                    });
                    None
                }
            }
        });

        LookupHandle {
            handle: Some(handle),
            resolved: None,
        }
    }
}

/// Handle to a running lookup. Dropping it aborts the lookup.
pub struct LookupHandle {
    handle: Option<JoinHandle<Option<Coordinates>>>,
    resolved: Option<Coordinates>,
}

impl LookupHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait at most `within` for the lookup; `None` if it failed or is still pending
    pub async fn settle(&mut self, within: Duration) -> Option<Coordinates> {
        let Some(handle) = self.handle.as_mut() else {
            return self.resolved;
        };

        match tokio::time::timeout(within, handle).await {
            Ok(Ok(coordinates)) => {
                self.handle = None;
                self.resolved = coordinates;
                coordinates
            }
            Ok(Err(e)) => {
                self.handle = None;
                warn!("Location lookup task failed: {}", e);
                None
            }
            Err(_) => {
                debug!("Location lookup still pending after {:?}", within);
                None
            }
        }
    }
}

impl Drop for LookupHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventFilter;
    use crate::testing::StubServer;

    /// Never answers
    struct StalledGeolocation;

    #[async_trait]
    impl GeolocationProvider for StalledGeolocation {
        async fn locate(&self) -> Result<Coordinates, GeolocationError> {
            std::future::pending().await
        }
    }

    const HERE: Coordinates = Coordinates {
        latitude: 48.8566,
        longitude: 2.3522,
    };

    #[tokio::test]
    async fn test_lookup_records_location() {
        let context = SessionContext::new();
        let bus = EventBus::new(8);
        let mut events = bus.subscribe_filtered(EventFilter::All, "test");

        let mut lookup =
            GeolocationLookup::spawn(Arc::new(FixedGeolocation(HERE)), context.clone(), bus);

        assert_eq!(lookup.settle(Duration::from_secs(1)).await, Some(HERE));
        assert_eq!(context.location(), Some(HERE));
        assert!(!context.location_unavailable());
        assert_eq!(events.drain()[0].event_type(), "location_resolved");
        // Settled lookups keep answering
        assert_eq!(lookup.settle(Duration::ZERO).await, Some(HERE));
    }

    #[tokio::test]
    async fn test_lookup_failure_sets_unavailable_flag() {
        let context = SessionContext::new();
        let mut lookup =
            GeolocationLookup::spawn(Arc::new(NoGeolocation), context.clone(), EventBus::new(8));

        assert_eq!(lookup.settle(Duration::from_secs(1)).await, None);
        assert!(context.location_unavailable());
        assert!(context.location().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_lookup_never_blocks() {
        let context = SessionContext::new();
        let mut lookup =
            GeolocationLookup::spawn(Arc::new(StalledGeolocation), context.clone(), EventBus::new(8));

        assert_eq!(lookup.settle(Duration::from_secs(3)).await, None);
        assert!(!lookup.is_finished());
        assert!(!context.location_unavailable());
        drop(lookup);
    }

    #[tokio::test]
    async fn test_http_geolocation() {
        let server =
            StubServer::start(|_| (200, r#"{"latitude":1.5,"longitude":-2.25}"#.to_string())).await;
        let provider = HttpGeolocation::new(server.url("/geo"), Duration::from_secs(5)).unwrap();

        let coordinates = provider.locate().await.unwrap();
        assert_eq!(
            coordinates,
            Coordinates {
                latitude: 1.5,
                longitude: -2.25
            }
        );
    }

    #[tokio::test]
    async fn test_http_geolocation_error_status() {
        let server = StubServer::start(|_| (500, "{}".to_string())).await;
        let provider = HttpGeolocation::new(server.url("/geo"), Duration::from_secs(5)).unwrap();

        assert!(matches!(
            provider.locate().await,
            Err(GeolocationError::Lookup { .. })
        ));
    }
}
