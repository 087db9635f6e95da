use super::device::MediaDevices;
use super::negotiator::CapabilityNegotiator;
use crate::config::CameraConfig;
use crate::error::{AuthscanError, Result};
use std::sync::Arc;

/// Builder for the capability negotiator
pub struct CapabilityNegotiatorBuilder {
    config: Option<CameraConfig>,
    devices: Option<Arc<dyn MediaDevices>>,
}

impl CapabilityNegotiatorBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            devices: None,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = Some(devices);
        self
    }

    pub fn build(self) -> Result<CapabilityNegotiator> {
        let devices = self
            .devices
            .ok_or_else(|| AuthscanError::system("A camera backend must be specified"))?;

        Ok(CapabilityNegotiator::new(
            devices,
            self.config.unwrap_or_default(),
        ))
    }
}

impl Default for CapabilityNegotiatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
