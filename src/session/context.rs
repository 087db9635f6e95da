use super::outcome::{AuthenticationOutcome, IndeterminateReason, PublishedOutcome};
use crate::error::PublishError;
use crate::geolocation::Coordinates;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Session storage keys read by the result view
pub mod keys {
    pub const RESULT: &str = "result";
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
    pub const ID: &str = "id";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const LOCATION_UNAVAILABLE: &str = "location_unavailable";
    pub const COUNT: &str = "count";
    pub const BATCH: &str = "batch";
    pub const PUBLISHED_AT: &str = "published_at";
}

#[derive(Debug, Default)]
struct SessionStore {
    values: HashMap<String, String>,
    published: bool,
}

/// Outcome record read back from session storage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOutcome {
    pub outcome: AuthenticationOutcome,
    pub device_id: Option<String>,
    pub count: Option<u64>,
    pub batch: Option<String>,
    pub location: Option<Coordinates>,
}

/// String key/value state shared between the scan pipeline and the result view.
///
/// Cloning shares the same storage. Created once per process; each scan
/// starts with [`SessionContext::begin_scan`] and the result view clears it
/// when it consumes the outcome.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    store: Arc<Mutex<SessionStore>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.lock().values.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.store.lock().values.insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.store.lock().values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.lock().values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().values.is_empty()
    }

    /// Copy of every stored key
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.store.lock().values.clone()
    }

    /// Reset to a clean state for a new scan
    pub fn begin_scan(&self) {
        self.clear();
        debug!("Session context reset for a new scan");
    }

    pub fn clear(&self) {
        let mut store = self.store.lock();
        store.values.clear();
        store.published = false;
    }

    pub fn record_location(&self, coordinates: Coordinates) {
        let mut store = self.store.lock();
        store
            .values
            .insert(keys::LATITUDE.to_string(), coordinates.latitude.to_string());
        store
            .values
            .insert(keys::LONGITUDE.to_string(), coordinates.longitude.to_string());
        store.values.remove(keys::LOCATION_UNAVAILABLE);
    }

    pub fn mark_location_unavailable(&self) {
        self.set(keys::LOCATION_UNAVAILABLE, "true");
    }

    pub fn location(&self) -> Option<Coordinates> {
        let store = self.store.lock();
        let latitude = store.values.get(keys::LATITUDE)?.parse().ok()?;
        let longitude = store.values.get(keys::LONGITUDE)?.parse().ok()?;
        Some(Coordinates {
            latitude,
            longitude,
        })
    }

    pub fn location_unavailable(&self) -> bool {
        self.get(keys::LOCATION_UNAVAILABLE).as_deref() == Some("true")
    }

    pub fn is_published(&self) -> bool {
        self.store.lock().published
    }

    /// Write the terminal outcome. Fails if this scan already published one.
    pub fn store_outcome(&self, published: &PublishedOutcome) -> Result<(), PublishError> {
        let mut store = self.store.lock();
        if store.published {
            return Err(PublishError::AlreadyPublished);
        }

        let values = &mut store.values;
        match published.outcome {
            AuthenticationOutcome::Genuine => {
                values.insert(keys::RESULT.to_string(), "true".to_string());
            }
            AuthenticationOutcome::Counterfeit => {
                values.insert(keys::RESULT.to_string(), "false".to_string());
            }
            AuthenticationOutcome::Indeterminate(reason) => {
                values.remove(keys::RESULT);
                values.insert(keys::REASON.to_string(), reason.as_str().to_string());
            }
        }
        values.insert(
            keys::OUTCOME.to_string(),
            published.outcome.as_str().to_string(),
        );
        values.insert(keys::ID.to_string(), published.device_id.clone());
        if let Some(count) = published.count {
            values.insert(keys::COUNT.to_string(), count.to_string());
        }
        if let Some(batch) = &published.batch {
            values.insert(keys::BATCH.to_string(), batch.clone());
        }
        if let Some(location) = published.location {
            values.insert(keys::LATITUDE.to_string(), location.latitude.to_string());
            values.insert(keys::LONGITUDE.to_string(), location.longitude.to_string());
        }
        values.insert(
            keys::PUBLISHED_AT.to_string(),
            published.published_at.to_rfc3339(),
        );

        store.published = true;
        Ok(())
    }

    /// Read the stored outcome without consuming it
    pub fn peek_outcome(&self) -> Option<StoredOutcome> {
        let store = self.store.lock();
        read_outcome(&store.values)
    }

    /// Read the stored outcome and clear the session. `None` when nothing was published.
    pub fn take_outcome(&self) -> Option<StoredOutcome> {
        let mut store = self.store.lock();
        let outcome = read_outcome(&store.values)?;
        store.values.clear();
        store.published = false;
        Some(outcome)
    }
}

fn read_outcome(values: &HashMap<String, String>) -> Option<StoredOutcome> {
    let outcome = match values.get(keys::OUTCOME).map(String::as_str) {
        Some("genuine") => AuthenticationOutcome::Genuine,
        Some("counterfeit") => AuthenticationOutcome::Counterfeit,
        Some("indeterminate") => {
            let reason = values
                .get(keys::REASON)
                .and_then(|r| r.parse().ok())
                .unwrap_or(IndeterminateReason::InvalidResponse);
            AuthenticationOutcome::Indeterminate(reason)
        }
        // Bare `result` flag without the richer outcome key
        _ => match values.get(keys::RESULT).map(String::as_str) {
            Some("true") => AuthenticationOutcome::Genuine,
            Some("false") => AuthenticationOutcome::Counterfeit,
            _ => return None,
        },
    };

    let location = match (
        values.get(keys::LATITUDE).and_then(|v| v.parse().ok()),
        values.get(keys::LONGITUDE).and_then(|v| v.parse().ok()),
    ) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Some(StoredOutcome {
        outcome,
        device_id: values.get(keys::ID).cloned(),
        count: values.get(keys::COUNT).and_then(|c| c.parse().ok()),
        batch: values.get(keys::BATCH).cloned(),
        location,
    })
}
