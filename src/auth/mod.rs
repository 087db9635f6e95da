pub mod client;
pub mod http;
pub mod types;

#[cfg(test)]
mod tests;

use crate::error::AuthError;
use async_trait::async_trait;

pub use client::{AuthenticationClient, FrameCapture};
pub use http::HttpAuthenticator;
pub use types::{ImagePayload, Verdict};

/// Remote authentication service
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Submit one encoded image. Each call is an independent request.
    async fn submit(&self, payload: ImagePayload) -> Result<Verdict, AuthError>;
}
