use super::device::{
    CameraDevice, DeviceKind, Facing, MediaDevices, StreamConstraints, TrackCapabilities,
    VideoTrack, ZoomRange,
};
use crate::error::CameraError;
use crate::frame::RawFrame;
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use tracing::{debug, info, trace, warn};

/// GStreamer-backed V4L2 cameras
pub struct GstMediaDevices {
    zoom: Option<ZoomRange>,
}

impl GstMediaDevices {
    /// Initialize GStreamer
    pub fn new() -> Result<Self, CameraError> {
        gstreamer::init().map_err(|e| CameraError::Backend {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;
        Ok(Self { zoom: None })
    }

    /// Declare the `zoom_absolute` range of the devices; without it zoom is unsupported
    pub fn with_zoom_range(mut self, zoom: Option<ZoomRange>) -> Self {
        self.zoom = zoom;
        self
    }

    /// Build GStreamer pipeline string producing RGBA frames at the requested size
    fn build_pipeline_string(device: &CameraDevice, constraints: &StreamConstraints) -> String {
        format!(
            "v4l2src name=src device={} io-mode=mmap ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGBA,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false",
            device.id, constraints.ideal_width, constraints.ideal_height
        )
    }
}

fn enumerate_blocking() -> Result<Vec<CameraDevice>, CameraError> {
    let monitor = gstreamer::DeviceMonitor::new();
    monitor.add_filter(Some("Video/Source"), None);
    monitor.start().map_err(|e| CameraError::Backend {
        details: format!("Failed to start device monitor: {}", e),
    })?;
    let devices = monitor.devices();
    monitor.stop();

    let mut found = Vec::new();
    for device in devices.iter() {
        let Some(props) = device.properties() else {
            continue;
        };
        let path = props
            .get::<String>("api.v4l2.path")
            .or_else(|_| props.get::<String>("device.path"));
        let Ok(path) = path else {
            debug!("Skipping device without a V4L2 path: {}", device.display_name());
            continue;
        };

        found.push(CameraDevice {
            id: path,
            label: device.display_name().to_string(),
            kind: DeviceKind::VideoInput,
            facing: Facing::Unknown,
            max_width: device.caps().and_then(|caps| max_caps_width(&caps)),
        });
    }

    Ok(found)
}

fn max_caps_width(caps: &gstreamer::CapsRef) -> Option<u32> {
    caps.iter()
        .filter_map(|s| {
            s.get::<i32>("width")
                .ok()
                .or_else(|| s.get::<gstreamer::IntRange<i32>>("width").ok().map(|r| r.max()))
        })
        .max()
        .map(|w| w.max(0) as u32)
}

#[async_trait]
impl MediaDevices for GstMediaDevices {
    async fn enumerate_devices(&self) -> Result<Vec<CameraDevice>, CameraError> {
        tokio::task::spawn_blocking(enumerate_blocking)
            .await
            .map_err(|e| CameraError::Backend {
                details: format!("Device enumeration task failed: {}", e),
            })?
    }

    async fn open(
        &self,
        device: &CameraDevice,
        constraints: &StreamConstraints,
    ) -> Result<Box<dyn VideoTrack>, CameraError> {
        let pipeline_desc = Self::build_pipeline_string(device, constraints);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Backend {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Backend {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Backend {
                details: "Failed to get appsink".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Backend {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        let source = pipeline.by_name("src").ok_or_else(|| CameraError::Backend {
            details: "Failed to get v4l2src".to_string(),
        })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceUnavailable {
                device: device.id.clone(),
                details: format!("Failed to start pipeline: {}", e),
            })?;

        Ok(Box::new(GstTrack {
            pipeline,
            appsink,
            source,
            capabilities: TrackCapabilities {
                max_width: device.max_width,
                max_height: None,
                zoom: self.zoom,
            },
            live: true,
        }))
    }
}

struct GstTrack {
    pipeline: Pipeline,
    appsink: AppSink,
    source: gstreamer::Element,
    capabilities: TrackCapabilities,
    live: bool,
}

#[async_trait]
impl VideoTrack for GstTrack {
    fn dimensions(&self) -> (u32, u32) {
        if !self.live {
            return (0, 0);
        }
        self.appsink
            .static_pad("sink")
            .and_then(|pad| pad.current_caps())
            .and_then(|caps| VideoInfo::from_caps(&caps).ok())
            .map(|info| (info.width(), info.height()))
            .unwrap_or((0, 0))
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    async fn apply_zoom(&mut self, zoom: f64) -> Result<(), CameraError> {
        let controls = gstreamer::Structure::builder("c")
            .field("zoom_absolute", zoom.round() as i32)
            .build();
        self.source.set_property("extra-controls", &controls);
        Ok(())
    }

    fn read_frame(&mut self) -> Option<RawFrame> {
        if !self.live {
            return None;
        }

        let sample = self.appsink.try_pull_sample(gstreamer::ClockTime::ZERO)?;
        let caps = sample.caps()?;
        let info = VideoInfo::from_caps(caps).ok()?;
        let buffer = sample.buffer()?;
        let map = buffer.map_readable().ok()?;

        let width = info.width() as usize;
        let height = info.height() as usize;
        let stride = info.stride()[0] as usize;
        let row_bytes = width * 4;

        if map.len() < stride * height.saturating_sub(1) + row_bytes {
            warn!("Short RGBA buffer: {} bytes for {}x{}", map.len(), width, height);
            return None;
        }

        // Strip row padding
        let mut rgba = Vec::with_capacity(row_bytes * height);
        for row in 0..height {
            let start = row * stride;
            rgba.extend_from_slice(&map[start..start + row_bytes]);
        }

        trace!("Pulled RGBA frame {}x{}", width, height);
        Some(RawFrame::new(info.width(), info.height(), rgba))
    }

    fn stop(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline: {}", e);
        }
    }
}

impl Drop for GstTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
