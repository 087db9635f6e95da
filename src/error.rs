use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("System error: {message}")]
    System { message: String },
}

impl AuthscanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// Camera negotiation and stream failures. All of these are fatal to a scan session.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("No camera available")]
    NoCameraAvailable,

    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("Camera device {device} unavailable: {details}")]
    DeviceUnavailable { device: String, details: String },

    #[error("Camera constraint rejected: {details}")]
    Constraint { details: String },

    #[error("Camera backend error: {details}")]
    Backend { details: String },
}

#[derive(Error, Debug)]
pub enum GeolocationError {
    #[error("Geolocation capability not available")]
    NotSupported,

    #[error("Geolocation lookup failed: {details}")]
    Lookup { details: String },
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authenticator returned HTTP {status}")]
    Status { status: u16 },

    #[error("Invalid authenticator response: {details}")]
    InvalidResponse { details: String },

    #[error("Failed to encode frame: {details}")]
    Encode { details: String },
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Outcome already published for this session")]
    AlreadyPublished,

    #[error("Telemetry endpoint error: {details}")]
    Telemetry { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, AuthscanError>;
