use super::device::{CameraDevice, MediaDevices, StreamConstraints};
use super::stream::MediaStream;
use crate::config::CameraConfig;
use crate::error::CameraError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Chooses the best rear camera and opens streams on it.
///
/// Only one stream may be live at a time; a new stream cannot be opened
/// until the previous one has been stopped.
pub struct CapabilityNegotiator {
    devices: Arc<dyn MediaDevices>,
    config: CameraConfig,
    exclusive: Arc<Semaphore>,
}

impl CapabilityNegotiator {
    pub fn new(devices: Arc<dyn MediaDevices>, config: CameraConfig) -> Self {
        Self {
            devices,
            config,
            exclusive: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Whether a stream from this negotiator is currently live
    pub fn stream_active(&self) -> bool {
        self.exclusive.available_permits() == 0
    }

    /// Pick the rear camera with the highest resolution, falling back to the
    /// first video input when nothing is labelled rear-facing.
    pub async fn select_rear_camera(&self) -> Result<CameraDevice, CameraError> {
        let video_inputs: Vec<CameraDevice> = self
            .devices
            .enumerate_devices()
            .await?
            .into_iter()
            .filter(CameraDevice::is_video_input)
            .collect();

        debug!("Enumerated {} video inputs", video_inputs.len());

        if video_inputs.is_empty() {
            return Err(CameraError::NoCameraAvailable);
        }

        if let Some(wanted) = &self.config.device_label {
            let wanted_lower = wanted.to_lowercase();
            if let Some(device) = video_inputs
                .iter()
                .find(|d| d.label.to_lowercase().contains(&wanted_lower))
            {
                info!("Using configured camera '{}'", device.label);
                return Ok(device.clone());
            }
            warn!("Configured camera '{}' not found, selecting automatically", wanted);
        }

        let rear: Vec<&CameraDevice> = video_inputs
            .iter()
            .filter(|d| d.looks_rear_facing(&self.config.rear_keywords))
            .collect();

        match rear.len() {
            0 => {
                let fallback = video_inputs[0].clone();
                info!(
                    "No rear-facing camera found, falling back to '{}'",
                    fallback.label
                );
                Ok(fallback)
            }
            1 => {
                info!("Selected rear camera '{}'", rear[0].label);
                Ok(rear[0].clone())
            }
            _ => Ok(self.widest_by_trial_open(&rear).await),
        }
    }

    /// Briefly open each candidate and keep the widest one. Trial streams are
    /// released before the next candidate is opened.
    async fn widest_by_trial_open(&self, candidates: &[&CameraDevice]) -> CameraDevice {
        let mut best: Option<(u32, &CameraDevice)> = None;

        for candidate in candidates {
            let width = match self.open_stream_inner(candidate).await {
                Ok(mut trial) => {
                    let caps = trial.capabilities();
                    let width = caps
                        .max_width
                        .or(candidate.max_width)
                        .unwrap_or_else(|| trial.dimensions().0);
                    trial.stop();
                    width
                }
                Err(e) => {
                    warn!("Trial open of camera '{}' failed: {}", candidate.label, e);
                    continue;
                }
            };

            debug!("Camera '{}' reports width {}", candidate.label, width);
            if best.map_or(true, |(best_width, _)| width > best_width) {
                best = Some((width, candidate));
            }
        }

        let chosen = best
            .map(|(_, device)| device)
            .unwrap_or(candidates[0])
            .clone();
        info!("Selected rear camera '{}' after probing", chosen.label);
        chosen
    }

    /// Open a stream on the device at the requested resolution
    pub async fn open_stream(
        &self,
        device: &CameraDevice,
        ideal_width: u32,
        ideal_height: u32,
    ) -> Result<MediaStream, CameraError> {
        let permit = self.acquire()?;
        let constraints = StreamConstraints::ideal(ideal_width, ideal_height);
        let track = self.devices.open(device, &constraints).await?;
        info!(
            "Opened stream on '{}' (ideal {}x{})",
            device.label, ideal_width, ideal_height
        );
        Ok(MediaStream::new(device.clone(), track, permit))
    }

    async fn open_stream_inner(&self, device: &CameraDevice) -> Result<MediaStream, CameraError> {
        let (width, height) = self.config.ideal_resolution;
        self.open_stream(device, width, height).await
    }

    fn acquire(&self) -> Result<tokio::sync::OwnedSemaphorePermit, CameraError> {
        Arc::clone(&self.exclusive)
            .try_acquire_owned()
            .map_err(|_| CameraError::Backend {
                details: "a camera stream is still active; stop it before opening another"
                    .to_string(),
            })
    }
}
