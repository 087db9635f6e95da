use super::timers::{tracked_sleep, Deadline, PendingTimers, SampleSchedule};
use crate::auth::FrameCapture;
use crate::camera::MediaStream;
use crate::config::AuthscanConfig;
use crate::decode::{CycleOutcome, DecodeEngine, DecodeResult};
use crate::enhance::ImageEnhancer;
use crate::events::{EventBus, ScanEvent};
use crate::frame::FrameBuffer;
use crate::retry::{RetryController, ScanPhase};
use crate::sampler::{FrameSampler, SampleResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Ticks spent waiting for a capturable frame before giving up
const CAPTURE_WAIT_TICKS: u32 = 30;

/// How the scanning phase ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResult {
    Hit(DecodeResult),
    TimedOut,
    Cancelled,
}

/// Aggregate root of one scan: owns the stream, zoom and retry state
pub struct ScanSession {
    stream: MediaStream,
    retry: RetryController,
    sampler: FrameSampler,
    enhancer: ImageEnhancer,
    tick: Duration,
    timers: PendingTimers,
    event_bus: EventBus,
}

impl ScanSession {
    pub fn new(
        stream: MediaStream,
        config: &AuthscanConfig,
        timers: PendingTimers,
        event_bus: EventBus,
    ) -> Self {
        Self {
            stream,
            retry: RetryController::new(config.retry.clone()),
            sampler: FrameSampler::new(&config.sampler),
            enhancer: ImageEnhancer::new(&config.enhancement),
            tick: config.sampler.tick_interval(),
            timers,
            event_bus,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.retry.phase()
    }

    pub fn zoom(&self) -> f64 {
        self.retry.zoom().current()
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    /// Sample, enhance and decode until a validated hit, the deadline, or cancellation.
    ///
    /// One cycle is processed before the next tick is awaited. A hit cancels the
    /// deadline and the schedule before anything else can run.
    pub async fn scan(&mut self, engine: &DecodeEngine, cancel: &CancellationToken) -> ScanResult {
        self.retry.start(self.stream.zoom_range());
        self.event_bus.emit(ScanEvent::Status {
            message: "Scanning...".to_string(),
        });

        let mut deadline = Deadline::arm(&self.timers, self.retry.timeout());
        let mut schedule = SampleSchedule::start(&self.timers, self.tick);

        if self.retry.zoom_supported() {
            // No zoom carried over from a previous session
            let zoom = self.retry.zoom().current();
            if let Some(end) = self
                .zoom_within(zoom, &mut deadline, &mut schedule, cancel)
                .await
            {
                return end;
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return self.cancelled(),

                _ = deadline.expired() => return self.timed_out(&mut schedule),

                _ = schedule.tick() => {
                    let mut frame = match self.sampler.sample(&mut self.stream) {
                        SampleResult::Ready(frame) => frame,
                        SampleResult::NotReady => continue,
                    };
                    self.enhancer.enhance(&mut frame);

                    match engine.decode(&frame) {
                        CycleOutcome::Hit(result) => {
                            deadline.cancel();
                            schedule.cancel();
                            self.retry.on_hit();
                            info!(
                                "Symbol hit on frame {} after {:?}",
                                frame.id,
                                self.retry.elapsed()
                            );
                            return ScanResult::Hit(result);
                        }
                        CycleOutcome::PartialDetection(result) => {
                            trace!("Partial detection of {}", result.payload);
                            self.event_bus.emit(ScanEvent::Status {
                                message: "Partial detection, move closer".to_string(),
                            });
                        }
                        CycleOutcome::Miss => {}
                    }

                    if let Some(zoom) = self.retry.on_miss() {
                        if let Some(end) = self
                            .zoom_within(zoom, &mut deadline, &mut schedule, cancel)
                            .await
                        {
                            return end;
                        }
                    }
                }
            }
        }
    }

    /// Apply a zoom step while the deadline and cancellation stay live.
    /// Returns how the scan ended if either fires before the camera answers.
    async fn zoom_within(
        &mut self,
        zoom: f64,
        deadline: &mut Deadline,
        schedule: &mut SampleSchedule,
        cancel: &CancellationToken,
    ) -> Option<ScanResult> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Some(self.cancelled()),

            _ = deadline.expired() => Some(self.timed_out(schedule)),

            _ = self.apply_zoom(zoom) => None,
        }
    }

    fn cancelled(&mut self) -> ScanResult {
        debug!("Scan cancelled after {} misses", self.retry.misses());
        self.retry.stop();
        ScanResult::Cancelled
    }

    fn timed_out(&mut self, schedule: &mut SampleSchedule) -> ScanResult {
        schedule.cancel();
        self.retry.time_out();
        ScanResult::TimedOut
    }

    /// Best effort: a rejected zoom never stops scanning
    async fn apply_zoom(&mut self, zoom: f64) {
        match self.stream.apply_zoom(zoom).await {
            Ok(Some(applied)) => {
                self.event_bus.emit(ScanEvent::ZoomChanged { zoom: applied });
            }
            Ok(None) => {}
            Err(e) => warn!("Zoom {:.2} rejected: {}", zoom, e),
        }
    }

    /// Fresh, unenhanced frames from the live stream at the frozen zoom
    pub fn capture(&mut self) -> StreamCapture<'_> {
        StreamCapture {
            stream: &mut self.stream,
            sampler: &mut self.sampler,
            tick: self.tick,
            timers: &self.timers,
        }
    }

    /// Stop the camera. Idempotent; also happens on drop.
    pub fn teardown(&mut self) {
        self.retry.stop();
        self.stream.stop();
    }
}

pub struct StreamCapture<'a> {
    stream: &'a mut MediaStream,
    sampler: &'a mut FrameSampler,
    tick: Duration,
    timers: &'a PendingTimers,
}

#[async_trait]
impl FrameCapture for StreamCapture<'_> {
    async fn capture(&mut self) -> Option<FrameBuffer> {
        for _ in 0..CAPTURE_WAIT_TICKS {
            if !self.stream.is_live() {
                return None;
            }
            match self.sampler.sample(self.stream) {
                SampleResult::Ready(frame) => return Some(frame),
                SampleResult::NotReady => tracked_sleep(self.timers, self.tick).await,
            }
        }
        None
    }
}
