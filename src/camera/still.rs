use super::device::{
    CameraDevice, Facing, MediaDevices, StreamConstraints, TrackCapabilities, VideoTrack, ZoomRange,
};
use crate::error::CameraError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use image::{imageops, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const STILL_DEVICE_ID: &str = "still-image";

/// Serves a picture file as a rear-facing camera with digital zoom
pub struct StillImageDevices {
    path: PathBuf,
    max_zoom: f64,
}

impl StillImageDevices {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_zoom: 5.0,
        }
    }

    pub fn with_max_zoom(mut self, max_zoom: f64) -> Self {
        self.max_zoom = max_zoom.max(1.0);
        self
    }
}

#[async_trait]
impl MediaDevices for StillImageDevices {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        let label = format!("Still image {} (back)", self.path.display());
        Ok(vec![CameraDevice::video(STILL_DEVICE_ID, label, Facing::Rear)])
    }

    async fn open(
        &self,
        device: &CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoTrack>, CameraError> {
        if device.id != STILL_DEVICE_ID {
            return Err(CameraError::DeviceUnavailable {
                device: device.id.clone(),
                details: "unknown still image device".to_string(),
            });
        }

        let path = self.path.clone();
        let source = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CameraError::Backend {
                details: format!("image loader task failed: {}", e),
            })?
            .map_err(|e| CameraError::DeviceUnavailable {
                device: device.id.clone(),
                details: format!("failed to load {}: {}", self.path.display(), e),
            })?
            .to_rgba8();

        info!(
            "Still image camera opened at {}x{} (requested {}x{})",
            source.width(),
            source.height(),
            constraints.ideal_width,
            constraints.ideal_height
        );

        Ok(Box::new(StillTrack {
            view: source.clone(),
            source,
            zoom: 1.0,
            max_zoom: self.max_zoom,
            live: true,
        }))
    }
}

struct StillTrack {
    source: RgbaImage,
    view: RgbaImage,
    zoom: f64,
    max_zoom: f64,
    live: bool,
}

impl StillTrack {
    /// Center crop by the zoom factor, resized back to the source dimensions
    fn render(&mut self) {
        let (width, height) = self.source.dimensions();
        if self.zoom <= 1.0 {
            self.view = self.source.clone();
            return;
        }

        let crop_w = ((width as f64 / self.zoom).round() as u32).max(1);
        let crop_h = ((height as f64 / self.zoom).round() as u32).max(1);
        let x = (width - crop_w) / 2;
        let y = (height - crop_h) / 2;

        let cropped = imageops::crop_imm(&self.source, x, y, crop_w, crop_h).to_image();
        self.view = imageops::resize(&cropped, width, height, imageops::FilterType::Triangle);
    }
}

#[async_trait]
impl VideoTrack for StillTrack {
    fn dimensions(&self) -> (u32, u32) {
        if self.live {
            self.view.dimensions()
        } else {
            (0, 0)
        }
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities {
            max_width: Some(self.source.width()),
            max_height: Some(self.source.height()),
            zoom: Some(ZoomRange {
                min: 1.0,
                max: self.max_zoom,
            }),
        }
    }

    async fn apply_zoom(&mut self, zoom: f64) -> Result<(), CameraError> {
        self.zoom = zoom.clamp(1.0, self.max_zoom);
        self.render();
        debug!("Still image zoom set to {:.2}", self.zoom);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<RawFrame> {
        if !self.live {
            return None;
        }
        Some(RawFrame::new(
            self.view.width(),
            self.view.height(),
            self.view.as_raw().clone(),
        ))
    }

    fn stop(&mut self) {
        self.live = false;
    }
}
