use super::device::{CameraDevice, TrackCapabilities, VideoTrack, ZoomRange};
use crate::error::CameraError;
use crate::frame::RawFrame;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info};

/// Exclusively owned live camera feed.
///
/// Holds the negotiator's single stream permit for as long as the track is
/// live. Stopping is idempotent and also happens on drop, so every exit path
/// releases the camera.
pub struct MediaStream {
    device: CameraDevice,
    track: Box<dyn VideoTrack>,
    permit: Option<OwnedSemaphorePermit>,
    stopped: bool,
}

impl MediaStream {
    pub(crate) fn new(
        device: CameraDevice,
        track: Box<dyn VideoTrack>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            device,
            track,
            permit: Some(permit),
            stopped: false,
        }
    }

    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn is_live(&self) -> bool {
        !self.stopped
    }

    /// Decoded dimensions of the video; (0, 0) while warming up or after stop
    pub fn dimensions(&self) -> (u32, u32) {
        if self.stopped {
            return (0, 0);
        }
        self.track.dimensions()
    }

    pub fn capabilities(&self) -> TrackCapabilities {
        self.track.capabilities()
    }

    pub fn zoom_range(&self) -> Option<ZoomRange> {
        self.track.capabilities().zoom
    }

    /// Best-effort zoom. Returns the applied value, or None when the track
    /// has no zoom capability.
    pub async fn apply_zoom(&mut self, zoom: f64) -> Result<Option<f64>, CameraError> {
        if self.stopped {
            return Ok(None);
        }

        let Some(range) = self.zoom_range() else {
            return Ok(None);
        };

        let zoom = zoom.clamp(range.min, range.max);
        self.track.apply_zoom(zoom).await?;
        debug!("Applied zoom {:.2} to {}", zoom, self.device.label);
        Ok(Some(zoom))
    }

    pub fn read_frame(&mut self) -> Option<RawFrame> {
        if self.stopped {
            return None;
        }
        self.track.read_frame()
    }

    /// Stop every track and give the camera back
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.track.stop();
        self.stopped = true;
        self.permit.take();
        info!("Camera stream for {} released", self.device.label);
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("device", &self.device.id)
            .field("stopped", &self.stopped)
            .finish()
    }
}
