mod builder;
mod runner;
mod scan;
mod timers;


pub use builder::ScanPipelineBuilder;
pub use runner::{ScanPipeline, SessionEnd};
pub use scan::{ScanResult, ScanSession, StreamCapture};
pub use timers::PendingTimers;
