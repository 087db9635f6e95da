use super::context::{SessionContext, StoredOutcome};
use super::outcome::{AuthenticationOutcome, IndeterminateReason};
use std::fmt;
use tracing::{debug, info};

/// What the result view shows after a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPage {
    Genuine,
    Counterfeit,
    Indeterminate(IndeterminateReason),
    /// Nothing was published; send the user back to the scanner
    RedirectToScan,
}

impl ResultPage {
    pub fn message(&self) -> &'static str {
        match self {
            ResultPage::Genuine => "This is a genuine product!",
            ResultPage::Counterfeit => "This is a counterfeit product.",
            ResultPage::Indeterminate(IndeterminateReason::Timeout) => {
                "No QR code was found. Please try again."
            }
            ResultPage::Indeterminate(IndeterminateReason::BlurRetryExhausted) => {
                "The image was too blurry to authenticate. Please try again."
            }
            ResultPage::Indeterminate(_) => "Unable to authenticate the product.",
            ResultPage::RedirectToScan => "No result available. Returning to the scanner.",
        }
    }
}

impl fmt::Display for ResultPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Consumer of the published outcome
pub struct ResultView;

impl ResultView {
    /// Read and clear the session's outcome so the next scan starts clean
    pub fn consume(context: &SessionContext) -> ResultPage {
        let Some(stored) = context.take_outcome() else {
            debug!("No outcome in session, redirecting to scan");
            return ResultPage::RedirectToScan;
        };
        log_details(&stored);

        match stored.outcome {
            AuthenticationOutcome::Genuine => ResultPage::Genuine,
            AuthenticationOutcome::Counterfeit => ResultPage::Counterfeit,
            AuthenticationOutcome::Indeterminate(reason) => ResultPage::Indeterminate(reason),
        }
    }
}

fn log_details(stored: &StoredOutcome) {
    info!(
        outcome = stored.outcome.as_str(),
        device_id = stored.device_id.as_deref().unwrap_or("-"),
        count = stored.count,
        batch = stored.batch.as_deref().unwrap_or("-"),
        "Showing result"
    );
}
