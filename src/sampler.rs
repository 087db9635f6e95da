use crate::camera::MediaStream;
use crate::config::SamplerConfig;
use crate::frame::FrameBuffer;
use tracing::{trace, warn};

/// Result of one sampling attempt
#[derive(Debug)]
pub enum SampleResult {
    Ready(FrameBuffer),
    /// The video has no decoded dimensions yet; reschedule, this is not a miss
    NotReady,
}

/// Copies the current video frame into an off-screen raster
pub struct FrameSampler {
    upscale: u32,
    next_id: u64,
}

impl FrameSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            upscale: config.upscale.max(1),
            next_id: 0,
        }
    }

    /// Frames sampled so far
    pub fn frame_count(&self) -> u64 {
        self.next_id
    }

    pub fn sample(&mut self, stream: &mut MediaStream) -> SampleResult {
        let (width, height) = stream.dimensions();
        if width == 0 || height == 0 {
            trace!("Video not warmed up yet");
            return SampleResult::NotReady;
        }

        let Some(raw) = stream.read_frame() else {
            trace!("No frame available this tick");
            return SampleResult::NotReady;
        };

        let id = self.next_id;
        let Some(mut frame) = FrameBuffer::from_raw(id, raw) else {
            warn!("Discarding incomplete frame from {}", stream.device().label);
            return SampleResult::NotReady;
        };
        self.next_id += 1;

        frame.upscale(self.upscale);
        trace!("Sampled frame {} ({}x{})", id, frame.width(), frame.height());
        SampleResult::Ready(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraDevice, CapabilityNegotiator, Facing, MockMediaDevices};
    use crate::config::CameraConfig;
    use crate::frame::RawFrame;
    use std::sync::Arc;

    async fn open_mock(devices: MockMediaDevices) -> (CapabilityNegotiator, MediaStream) {
        let negotiator = CapabilityNegotiator::new(Arc::new(devices), CameraConfig::default());
        let device = negotiator.select_rear_camera().await.unwrap();
        let stream = negotiator.open_stream(&device, 64, 48).await.unwrap();
        (negotiator, stream)
    }

    fn rear() -> Vec<CameraDevice> {
        vec![CameraDevice::video("rear", "Back Camera", Facing::Rear)]
    }

    #[tokio::test]
    async fn test_not_ready_while_warming_up() {
        let (_negotiator, mut stream) = open_mock(MockMediaDevices::new(rear()).with_warmup(2)).await;
        let mut sampler = FrameSampler::new(&SamplerConfig::default());

        assert!(matches!(sampler.sample(&mut stream), SampleResult::NotReady));
        assert!(matches!(sampler.sample(&mut stream), SampleResult::NotReady));
        assert!(matches!(sampler.sample(&mut stream), SampleResult::Ready(_)));
        assert_eq!(sampler.frame_count(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_frame_is_not_ready() {
        let devices =
            MockMediaDevices::new(rear()).with_frame(RawFrame::new(64, 48, vec![0u8; 100]));
        let (_negotiator, mut stream) = open_mock(devices).await;
        let mut sampler = FrameSampler::new(&SamplerConfig::default());

        assert!(matches!(sampler.sample(&mut stream), SampleResult::NotReady));
    }

    #[tokio::test]
    async fn test_upscale_and_sequence_ids() {
        let (_negotiator, mut stream) = open_mock(MockMediaDevices::new(rear())).await;
        let mut sampler = FrameSampler::new(&SamplerConfig {
            tick_interval_ms: 33,
            upscale: 2,
        });

        let SampleResult::Ready(first) = sampler.sample(&mut stream) else {
            panic!("expected a frame");
        };
        let SampleResult::Ready(second) = sampler.sample(&mut stream) else {
            panic!("expected a frame");
        };

        assert_eq!((first.width(), first.height()), (128, 96));
        assert_eq!((first.id, second.id), (0, 1));
    }

    #[tokio::test]
    async fn test_stopped_stream_is_not_ready() {
        let (_negotiator, mut stream) = open_mock(MockMediaDevices::new(rear())).await;
        let mut sampler = FrameSampler::new(&SamplerConfig::default());
        stream.stop();

        assert!(matches!(sampler.sample(&mut stream), SampleResult::NotReady));
    }
}
