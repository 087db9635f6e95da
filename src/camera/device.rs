use crate::error::CameraError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which way a camera points, as far as the platform can tell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Rear,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

/// An enumerated input device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
    pub facing: Facing,
    /// Maximum width reported at enumeration time, when known
    pub max_width: Option<u32>,
}

impl CameraDevice {
    pub fn video(id: impl Into<String>, label: impl Into<String>, facing: Facing) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
            facing,
            max_width: None,
        }
    }

    pub fn is_video_input(&self) -> bool {
        self.kind == DeviceKind::VideoInput
    }

    /// Rear-facing by hint, or by case-insensitive label match on any keyword
    pub fn looks_rear_facing(&self, keywords: &[String]) -> bool {
        if self.facing == Facing::Rear {
            return true;
        }
        let label = self.label.to_lowercase();
        keywords
            .iter()
            .any(|keyword| label.contains(&keyword.to_lowercase()))
    }
}

/// Requested stream parameters; the backend picks the closest match
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamConstraints {
    pub fn ideal(width: u32, height: u32) -> Self {
        Self {
            ideal_width: width,
            ideal_height: height,
        }
    }
}

/// Supported zoom interval of a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

/// Capabilities reported by an open track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCapabilities {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// None when the device cannot zoom
    pub zoom: Option<ZoomRange>,
}

/// Camera enumeration and stream opening capability
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CameraError>;

    async fn open(
        &self,
        device: &CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoTrack>, CameraError>;
}

/// A live, constraint-adjustable video track
#[async_trait]
pub trait VideoTrack: Send {
    /// Decoded frame dimensions; (0, 0) until the stream has warmed up
    fn dimensions(&self) -> (u32, u32);

    fn capabilities(&self) -> TrackCapabilities;

    async fn apply_zoom(&mut self, zoom: f64) -> Result<(), CameraError>;

    /// Latest decoded frame, if one is available
    fn read_frame(&mut self) -> Option<RawFrame>;

    fn stop(&mut self);
}
