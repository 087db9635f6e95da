pub mod app;
pub mod auth;
pub mod camera;
pub mod config;
pub mod decode;
pub mod enhance;
pub mod error;
pub mod events;
pub mod frame;
pub mod geolocation;
pub mod pipeline;
pub mod retry;
pub mod sampler;
pub mod session;

#[cfg(test)]
mod testing;

pub use app::{AuthscanOrchestrator, ComponentState, LaunchOptions, ScanReport, ShutdownReason};
pub use auth::{AuthenticationClient, Authenticator, HttpAuthenticator, ImagePayload, Verdict};
pub use camera::{CapabilityNegotiator, CapabilityNegotiatorBuilder, MediaDevices, MediaStream};
pub use config::AuthscanConfig;
pub use decode::{DecodeEngine, RqrrDecoder, SymbolDecoder};
pub use error::{AuthscanError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, ScanEvent};
pub use frame::{FrameBuffer, RawFrame};
pub use geolocation::{Coordinates, GeolocationLookup, GeolocationProvider};
pub use pipeline::{ScanPipeline, ScanPipelineBuilder, SessionEnd};
pub use retry::{RetryController, ScanPhase, ZoomState};
pub use session::{
    AuthenticationOutcome, IndeterminateReason, OutcomePublisher, ResultPage, ResultView,
    SessionContext,
};
