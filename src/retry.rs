use crate::camera::ZoomRange;
use crate::config::RetryConfig;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Current zoom factor, always within `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    current: f64,
    min: f64,
    max: f64,
}

impl ZoomState {
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            current: min,
            min,
            max,
        }
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.min;
        }
        zoom.clamp(self.min, self.max)
    }

    /// Set a new zoom, clamped to the range; returns the applied value
    pub fn set(&mut self, zoom: f64) -> f64 {
        self.current = self.clamp(zoom);
        self.current
    }

    pub fn at_max(&self) -> bool {
        self.current >= self.max
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Authenticating,
    TimedOut,
    Stopped,
}

/// Drives zoom and phase transitions for one scan session
pub struct RetryController {
    config: RetryConfig,
    phase: ScanPhase,
    zoom: ZoomState,
    zoom_supported: bool,
    misses: u32,
    started_at: Option<Instant>,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        let zoom = ZoomState::new(config.min_zoom, config.max_zoom);
        Self {
            config,
            phase: ScanPhase::Idle,
            zoom,
            zoom_supported: false,
            misses: 0,
            started_at: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn zoom_supported(&self) -> bool {
        self.zoom_supported
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    /// Enter scanning from a clean state. The zoom range is the configured
    /// range narrowed to what the device supports.
    pub fn start(&mut self, device_zoom: Option<ZoomRange>) {
        let (min, max) = (self.config.min_zoom, self.config.max_zoom);
        self.zoom_supported = false;
        self.zoom = ZoomState::new(min, max);

        if let Some(range) = device_zoom {
            let lo = min.max(range.min);
            let hi = max.min(range.max);
            if lo <= hi {
                self.zoom = ZoomState::new(lo, hi);
                self.zoom_supported = true;
            } else {
                warn!(
                    "Device zoom range {:.2}..{:.2} does not overlap {:.2}..{:.2}",
                    range.min, range.max, min, max
                );
            }
        }

        self.misses = 0;
        self.started_at = Some(Instant::now());
        self.phase = ScanPhase::Scanning;
        info!(
            "Scanning started (zoom {}, timeout {:?})",
            if self.zoom_supported { "adaptive" } else { "unsupported" },
            self.config.timeout()
        );
    }

    /// Record a miss. Returns the zoom to apply, if it should change.
    pub fn on_miss(&mut self) -> Option<f64> {
        if self.phase != ScanPhase::Scanning {
            return None;
        }
        self.misses += 1;

        if !self.zoom_supported || self.zoom.at_max() {
            return None;
        }

        let previous = self.zoom.current();
        let next = self.zoom.set(previous + self.config.zoom_step);
        debug!("Miss {}: zoom {:.2} -> {:.2}", self.misses, previous, next);
        (next != previous).then_some(next)
    }

    /// Freeze zoom and hand over to authentication. Ignored unless scanning.
    pub fn on_hit(&mut self) -> bool {
        if self.phase != ScanPhase::Scanning {
            return false;
        }
        self.phase = ScanPhase::Authenticating;
        info!(
            "Symbol accepted after {} misses at zoom {:.2}",
            self.misses,
            self.zoom.current()
        );
        true
    }

    /// Force the timeout transition. Ignored unless scanning.
    pub fn time_out(&mut self) -> bool {
        if self.phase != ScanPhase::Scanning {
            return false;
        }
        self.phase = ScanPhase::TimedOut;
        warn!(
            "No symbol detected within {:?} ({} misses)",
            self.config.timeout(),
            self.misses
        );
        true
    }

    pub fn stop(&mut self) {
        self.phase = ScanPhase::Stopped;
    }
}
