use crate::error::AuthError;
use crate::frame::FrameBuffer;
use serde::{Deserialize, Serialize};

/// Authenticator verdict for one submitted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Genuine,
    Counterfeit,
    /// The image is unusable; capture a new one
    #[serde(rename = "blur", alias = "blurry")]
    Blurry,
}

/// Response body of the authenticator endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub result: Verdict,
}

/// Encoded image ready for submission
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub file_name: String,
    pub frame_id: u64,
}

impl ImagePayload {
    pub fn jpeg(frame: &FrameBuffer, quality: u8) -> Result<Self, AuthError> {
        let bytes = frame.encode_jpeg(quality)?;
        Ok(Self {
            bytes,
            mime_type: "image/jpeg",
            file_name: format!("frame-{}.jpg", frame.id),
            frame_id: frame.id,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
