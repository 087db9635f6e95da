use super::device::{
    CameraDevice, MediaDevices, StreamConstraints, TrackCapabilities, VideoTrack, ZoomRange,
};
use crate::error::CameraError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::HashMap;
use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// In-memory camera backend for tests and demos.
///
/// Counts live tracks and records every zoom request so callers can assert
/// on resource release and zoom behaviour.
#[derive(Clone)]
pub struct MockMediaDevices {
    devices: Vec<CameraDevice>,
    widths: HashMap<String, u32>,
    zoom: Option<ZoomRange>,
    warmup_reads: usize,
    frame: RawFrame,
    permission_denied: bool,
    failing: Vec<String>,
    stall_zoom_above: Option<f64>,
    active_tracks: Arc<AtomicUsize>,
    opened: Arc<Mutex<Vec<String>>>,
    zoom_requests: Arc<Mutex<Vec<f64>>>,
}

impl MockMediaDevices {
    pub fn new(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            widths: HashMap::new(),
            zoom: Some(ZoomRange { min: 1.0, max: 5.0 }),
            warmup_reads: 0,
            frame: RawFrame::new(64, 48, vec![160u8; 64 * 48 * 4]),
            permission_denied: false,
            failing: Vec::new(),
            stall_zoom_above: None,
            active_tracks: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(Mutex::new(Vec::new())),
            zoom_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Report a capability width for the device with this id
    pub fn with_width(mut self, device_id: &str, width: u32) -> Self {
        self.widths.insert(device_id.to_string(), width);
        self
    }

    pub fn with_zoom(mut self, zoom: Option<ZoomRange>) -> Self {
        self.zoom = zoom;
        self
    }

    /// Number of dimension queries answered with (0, 0) before frames flow
    pub fn with_warmup(mut self, reads: usize) -> Self {
        self.warmup_reads = reads;
        self
    }

    pub fn with_frame(mut self, frame: RawFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    pub fn fail_device(mut self, device_id: &str) -> Self {
        self.failing.push(device_id.to_string());
        self
    }

    /// Zoom requests above this level are recorded but never complete
    pub fn with_stalled_zoom(mut self, above: f64) -> Self {
        self.stall_zoom_above = Some(above);
        self
    }

    pub fn active_tracks(&self) -> usize {
        self.active_tracks.load(Ordering::SeqCst)
    }

    /// Ids of every device opened so far, capability checks included
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn zoom_requests(&self) -> Vec<f64> {
        self.zoom_requests.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        Ok(self.devices.clone())
    }

    async fn open(
        &self,
        device: &CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoTrack>, CameraError> {
        if self.permission_denied {
            return Err(CameraError::PermissionDenied {
                details: "mock permission denied".to_string(),
            });
        }
        if self.failing.contains(&device.id) {
            return Err(CameraError::DeviceUnavailable {
                device: device.id.clone(),
                details: "mock device failure".to_string(),
            });
        }

        debug!(
            "Mock open of {} ({}x{})",
            device.id, constraints.ideal_width, constraints.ideal_height
        );
        self.opened.lock().push(device.id.clone());
        self.active_tracks.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockTrack {
            capabilities: TrackCapabilities {
                max_width: self.widths.get(&device.id).copied(),
                max_height: None,
                zoom: self.zoom,
            },
            warmup_remaining: Cell::new(self.warmup_reads),
            frame: self.frame.clone(),
            live: true,
            stall_zoom_above: self.stall_zoom_above,
            active_tracks: Arc::clone(&self.active_tracks),
            zoom_requests: Arc::clone(&self.zoom_requests),
        }))
    }
}

struct MockTrack {
    capabilities: TrackCapabilities,
    warmup_remaining: Cell<usize>,
    frame: RawFrame,
    live: bool,
    stall_zoom_above: Option<f64>,
    active_tracks: Arc<AtomicUsize>,
    zoom_requests: Arc<Mutex<Vec<f64>>>,
}

#[async_trait]
impl VideoTrack for MockTrack {
    fn dimensions(&self) -> (u32, u32) {
        if !self.live {
            return (0, 0);
        }
        let remaining = self.warmup_remaining.get();
        if remaining > 0 {
            self.warmup_remaining.set(remaining - 1);
            return (0, 0);
        }
        (self.frame.width, self.frame.height)
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    async fn apply_zoom(&mut self, zoom: f64) -> Result<(), CameraError> {
        self.zoom_requests.lock().push(zoom);
        if self.stall_zoom_above.is_some_and(|above| zoom > above) {
            pending::<()>().await;
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Option<RawFrame> {
        if !self.live || self.warmup_remaining.get() > 0 {
            return None;
        }
        Some(self.frame.clone())
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.active_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
