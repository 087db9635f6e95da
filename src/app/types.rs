use crate::session::{PublishedOutcome, ResultPage};
use std::path::PathBuf;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Why a session was torn down early
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
}

/// Command-line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Serve this picture as the camera instead of a real device
    pub image: Option<PathBuf>,
    pub device_label: Option<String>,
    pub batch: Option<String>,
}

/// What one run of the scanner produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub page: ResultPage,
    pub published: Option<PublishedOutcome>,
    pub shutdown: Option<ShutdownReason>,
}

impl ScanReport {
    /// Process exit code: 0 genuine, 2 counterfeit, 3 indeterminate, 1 anything else
    pub fn exit_code(&self) -> i32 {
        match self.page {
            ResultPage::Genuine => 0,
            ResultPage::Counterfeit => 2,
            ResultPage::Indeterminate(_) => 3,
            ResultPage::RedirectToScan => 1,
        }
    }
}
