pub mod context;
pub mod outcome;
pub mod publisher;
pub mod view;


pub use context::{keys, SessionContext, StoredOutcome};
pub use outcome::{AuthenticationOutcome, IndeterminateReason, PublishedOutcome, Telemetry};
pub use publisher::{HttpTelemetry, OutcomePublisher, TelemetryService};
pub use view::{ResultPage, ResultView};
