use crate::error::EventBusError;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events emitted while a scan session runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A camera was chosen for the session
    CameraSelected { device_id: String, label: String },
    /// The stream is open and bound to the sampler
    StreamOpened { width: u32, height: u32 },
    /// User-facing status line ("Scanning...", "Partial detection, move closer")
    Status { message: String },
    /// Zoom was adjusted after a miss
    ZoomChanged { zoom: f64 },
    /// A validated symbol was decoded
    SymbolDetected { payload: String },
    /// An image was submitted to the authenticator
    AuthenticationAttempt { attempt: u32 },
    /// The authenticator rejected the frame as blurry
    AuthenticationBlurry { attempt: u32 },
    /// The location lookup resolved
    LocationResolved { latitude: f64, longitude: f64 },
    /// The location lookup failed; scanning continues
    LocationUnavailable { reason: String },
    /// Terminal outcome stored in the session context
    OutcomePublished { outcome: String, timestamp: SystemTime },
    /// The result view should be shown
    NavigateToResult,
    /// The session was torn down before reaching an outcome
    SessionStopped { timestamp: SystemTime },
}

impl ScanEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::CameraSelected { label, .. } => format!("Camera selected: {}", label),
            ScanEvent::StreamOpened { width, height } => {
                format!("Stream opened at {}x{}", width, height)
            }
            ScanEvent::Status { message } => message.clone(),
            ScanEvent::ZoomChanged { zoom } => format!("Zoom set to {:.2}", zoom),
            ScanEvent::SymbolDetected { payload } => format!("Symbol detected: {}", payload),
            ScanEvent::AuthenticationAttempt { attempt } => {
                format!("Authentication attempt {}", attempt)
            }
            ScanEvent::AuthenticationBlurry { attempt } => {
                format!("Authentication attempt {} was blurry", attempt)
            }
            ScanEvent::LocationResolved {
                latitude,
                longitude,
            } => format!("Location resolved: {:.5}, {:.5}", latitude, longitude),
            ScanEvent::LocationUnavailable { reason } => {
                format!("Location unavailable: {}", reason)
            }
            ScanEvent::OutcomePublished { outcome, .. } => format!("Outcome published: {}", outcome),
            ScanEvent::NavigateToResult => "Navigate to result".to_string(),
            ScanEvent::SessionStopped { .. } => "Session stopped".to_string(),
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::CameraSelected { .. } => "camera_selected",
            ScanEvent::StreamOpened { .. } => "stream_opened",
            ScanEvent::Status { .. } => "status",
            ScanEvent::ZoomChanged { .. } => "zoom_changed",
            ScanEvent::SymbolDetected { .. } => "symbol_detected",
            ScanEvent::AuthenticationAttempt { .. } => "authentication_attempt",
            ScanEvent::AuthenticationBlurry { .. } => "authentication_blurry",
            ScanEvent::LocationResolved { .. } => "location_resolved",
            ScanEvent::LocationUnavailable { .. } => "location_unavailable",
            ScanEvent::OutcomePublished { .. } => "outcome_published",
            ScanEvent::NavigateToResult => "navigate_to_result",
            ScanEvent::SessionStopped { .. } => "session_stopped",
        }
    }
}

/// Async event bus for pipeline observers using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: ScanEvent) -> Result<usize, EventBusError> {
        match &event {
            ScanEvent::OutcomePublished { outcome, .. } => {
                info!("Outcome published: {}", outcome);
            }
            ScanEvent::LocationUnavailable { reason } => {
                warn!("Location unavailable: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish, ignoring the no-subscriber case
    pub fn emit(&self, event: ScanEvent) {
        if self.has_subscribers() {
            if let Err(e) = self.publish(event) {
                debug!("Dropped scan event: {}", e);
            }
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Drain every pending event that passes the filter
    pub fn drain(&mut self) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}
