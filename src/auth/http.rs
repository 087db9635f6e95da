use super::types::{AuthResponse, ImagePayload, Verdict};
use super::Authenticator;
use crate::config::AuthConfig;
use crate::error::AuthError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

/// Posts the image as a multipart form to the authenticator endpoint
pub struct HttpAuthenticator {
    client: reqwest::Client,
    endpoint: String,
    field: String,
}

impl HttpAuthenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            field: config.image_field.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Authenticator for HttpAuthenticator {
    async fn submit(&self, payload: ImagePayload) -> Result<Verdict, AuthError> {
        debug!(
            "Submitting frame {} ({} bytes) to {}",
            payload.frame_id,
            payload.len(),
            self.endpoint
        );

        let part = Part::bytes(payload.bytes)
            .file_name(payload.file_name)
            .mime_str(payload.mime_type)?;
        let form = Form::new().part(self.field.clone(), part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: AuthResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse {
                details: format!("{}: {}", e, body.chars().take(120).collect::<String>()),
            })?;

        Ok(parsed.result)
    }
}
