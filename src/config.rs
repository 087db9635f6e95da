use crate::camera::ZoomRange;
use crate::decode::{ErrorCorrection, InversionAttempts};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthscanConfig {
    pub camera: CameraConfig,
    pub sampler: SamplerConfig,
    pub enhancement: EnhancementConfig,
    pub decode: DecodeConfig,
    pub retry: RetryConfig,
    pub auth: AuthConfig,
    pub telemetry: TelemetryConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Requested stream resolution (width, height)
    #[serde(default = "default_ideal_resolution")]
    pub ideal_resolution: (u32, u32),

    /// Case-insensitive label fragments identifying rear-facing cameras
    #[serde(default = "default_rear_keywords")]
    pub rear_keywords: Vec<String>,

    /// Force a specific device by label fragment, bypassing rear camera scoring
    #[serde(default)]
    pub device_label: Option<String>,

    /// Range of the device `zoom_absolute` control, in the same units as `retry` zoom.
    /// V4L2 cameras report no zoom capability without it.
    #[serde(default)]
    pub zoom_range: Option<ZoomRange>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SamplerConfig {
    /// Interval between sampling ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Integer upscale applied to the sampled raster (1 = native size)
    #[serde(default = "default_upscale")]
    pub upscale: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EnhancementConfig {
    /// Apply the contrast/brightness remap before grayscale reduction
    #[serde(default = "default_contrast_remap")]
    pub contrast_remap: bool,

    #[serde(default = "default_contrast")]
    pub contrast: f32,

    #[serde(default = "default_brightness")]
    pub brightness: f32,

    /// RGB weights used for luminance
    #[serde(default = "default_luma_weights")]
    pub luma_weights: [f32; 3],

    /// Base binarization threshold
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Maximum random offset applied to the threshold per frame (0 = fixed threshold)
    #[serde(default)]
    pub jitter: u8,

    /// Seed for the jitter source; unseeded jitter is drawn from the OS
    #[serde(default)]
    pub seed: Option<u64>,

    /// Flip binarization polarity (light symbol on dark background)
    #[serde(default)]
    pub invert: bool,

    /// Warp the largest dark region onto the frame before decoding
    #[serde(default)]
    pub straighten: bool,

    /// Smallest region, as a fraction of the shorter frame side, worth straightening
    #[serde(default = "default_straighten_min_fraction")]
    pub straighten_min_fraction: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DecodeConfig {
    #[serde(default = "default_inversion")]
    pub inversion: InversionAttempts,

    #[serde(default = "default_error_correction")]
    pub error_correction: ErrorCorrection,

    /// Minimum symbol extent as a fraction of the shorter frame dimension
    #[serde(default = "default_size_gate_fraction")]
    pub size_gate_fraction: f64,

    /// Payloads that never count as a hit
    #[serde(default)]
    pub ignored_payloads: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f64,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,

    /// Zoom increment applied after each miss
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Scan timeout in milliseconds, armed when scanning starts
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Total authentication submissions allowed while the verdict stays blurry
    /// The N-th blurry verdict ends the loop; an (N+1)-th request is never sent.
    #[serde(default = "default_max_blur_attempts")]
    pub max_blur_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// Authenticator endpoint receiving the multipart image
    #[serde(default = "default_auth_endpoint")]
    pub endpoint: String,

    /// Multipart field name carrying the image
    #[serde(default = "default_image_field")]
    pub image_field: String,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Submissions allowed after a network failure (1 = no network retry)
    #[serde(default = "default_network_attempts")]
    pub network_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelemetryConfig {
    /// Report counter and location telemetry when publishing
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Base URL of the counter and location logging endpoints
    #[serde(default = "default_telemetry_base_url")]
    pub base_url: String,

    /// Public IP lookup endpoint returning `{"ip": "..."}`
    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    /// Geolocation endpoint returning `{"latitude": .., "longitude": ..}`
    #[serde(default)]
    pub geolocation_url: Option<String>,

    /// How long publication waits for a pending location lookup
    #[serde(default = "default_geolocation_settle_ms")]
    pub geolocation_settle_ms: u64,

    /// Stable device identifier; generated per run when absent
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl AuthscanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("authscan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.ideal_resolution",
                vec![default_ideal_resolution().0, default_ideal_resolution().1],
            )?
            .set_default("camera.rear_keywords", default_rear_keywords())?
            .set_default("sampler.tick_interval_ms", default_tick_interval_ms() as i64)?
            .set_default("sampler.upscale", default_upscale() as i64)?
            .set_default("enhancement.contrast_remap", default_contrast_remap())?
            .set_default("enhancement.contrast", default_contrast() as f64)?
            .set_default("enhancement.brightness", default_brightness() as f64)?
            .set_default(
                "enhancement.luma_weights",
                default_luma_weights()
                    .iter()
                    .map(|w| *w as f64)
                    .collect::<Vec<f64>>(),
            )?
            .set_default("enhancement.threshold", default_threshold() as i64)?
            .set_default("enhancement.jitter", 0i64)?
            .set_default("enhancement.invert", false)?
            .set_default("enhancement.straighten", false)?
            .set_default(
                "enhancement.straighten_min_fraction",
                default_straighten_min_fraction() as f64,
            )?
            .set_default("decode.inversion", "both")?
            .set_default("decode.error_correction", "high")?
            .set_default("decode.size_gate_fraction", default_size_gate_fraction())?
            .set_default("decode.ignored_payloads", Vec::<String>::new())?
            .set_default("retry.min_zoom", default_min_zoom())?
            .set_default("retry.max_zoom", default_max_zoom())?
            .set_default("retry.zoom_step", default_zoom_step())?
            .set_default("retry.timeout_ms", default_timeout_ms() as i64)?
            .set_default("retry.max_blur_attempts", default_max_blur_attempts() as i64)?
            .set_default("auth.endpoint", default_auth_endpoint())?
            .set_default("auth.image_field", default_image_field())?
            .set_default("auth.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("auth.request_timeout_ms", default_request_timeout_ms() as i64)?
            .set_default("auth.network_attempts", default_network_attempts() as i64)?
            .set_default("telemetry.enabled", default_telemetry_enabled())?
            .set_default("telemetry.base_url", default_telemetry_base_url())?
            .set_default("telemetry.ip_lookup_url", default_ip_lookup_url())?
            .set_default(
                "telemetry.geolocation_settle_ms",
                default_geolocation_settle_ms() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // AUTHSCAN_RETRY__TIMEOUT_MS -> retry.timeout_ms
            .add_source(
                Environment::with_prefix("AUTHSCAN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AuthscanConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Message(msg.to_string()));

        if self.camera.ideal_resolution.0 == 0 || self.camera.ideal_resolution.1 == 0 {
            return invalid("Camera resolution must be greater than 0");
        }

        if self.sampler.tick_interval_ms == 0 {
            return invalid("Sampler tick_interval_ms must be greater than 0");
        }

        if self.sampler.upscale == 0 {
            return invalid("Sampler upscale must be at least 1");
        }

        if self.enhancement.contrast < 0.0 {
            return invalid("Enhancement contrast must not be negative");
        }

        if self.enhancement.luma_weights.iter().any(|w| *w < 0.0)
            || self.enhancement.luma_weights.iter().sum::<f32>() <= 0.0
        {
            return invalid("Enhancement luma_weights must be non-negative with a positive sum");
        }

        // Threshold plus jitter must stay inside (0, 255) so pure black and white never flip
        let threshold = self.enhancement.threshold as i32;
        let jitter = self.enhancement.jitter as i32;
        if threshold - jitter < 1 || threshold + jitter > 254 {
            return invalid("Enhancement threshold +/- jitter must stay within 1..=254");
        }

        let fraction = self.enhancement.straighten_min_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return invalid("Enhancement straighten_min_fraction must be in (0, 1]");
        }

        if let Some(range) = self.camera.zoom_range {
            if range.min <= 0.0 || range.min > range.max {
                return invalid("Camera zoom_range must satisfy 0 < min <= max");
            }
        }

        if !(self.decode.size_gate_fraction > 0.0 && self.decode.size_gate_fraction <= 1.0) {
            return invalid("Decode size_gate_fraction must be in (0, 1]");
        }

        if self.retry.min_zoom <= 0.0 || self.retry.min_zoom > self.retry.max_zoom {
            return invalid("Retry zoom range must satisfy 0 < min_zoom <= max_zoom");
        }

        if self.retry.zoom_step <= 0.0 {
            return invalid("Retry zoom_step must be greater than 0");
        }

        if self.retry.timeout_ms == 0 {
            return invalid("Retry timeout_ms must be greater than 0");
        }

        if self.retry.max_blur_attempts == 0 {
            return invalid("Retry max_blur_attempts must be greater than 0");
        }

        if self.auth.network_attempts == 0 {
            return invalid("Auth network_attempts must be greater than 0");
        }

        if self.auth.jpeg_quality == 0 || self.auth.jpeg_quality > 100 {
            return invalid("Auth jpeg_quality must be in 1..=100");
        }

        if self.system.event_bus_capacity == 0 {
            return invalid("Event bus capacity must be greater than 0");
        }

        Ok(())
    }
}

impl SamplerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl RetryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AuthConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TelemetryConfig {
    pub fn geolocation_settle(&self) -> Duration {
        Duration::from_millis(self.geolocation_settle_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            ideal_resolution: default_ideal_resolution(),
            rear_keywords: default_rear_keywords(),
            device_label: None,
            zoom_range: None,
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            upscale: default_upscale(),
        }
    }
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            contrast_remap: default_contrast_remap(),
            contrast: default_contrast(),
            brightness: default_brightness(),
            luma_weights: default_luma_weights(),
            threshold: default_threshold(),
            jitter: 0,
            seed: None,
            invert: false,
            straighten: false,
            straighten_min_fraction: default_straighten_min_fraction(),
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            inversion: default_inversion(),
            error_correction: default_error_correction(),
            size_gate_fraction: default_size_gate_fraction(),
            ignored_payloads: Vec::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            zoom_step: default_zoom_step(),
            timeout_ms: default_timeout_ms(),
            max_blur_attempts: default_max_blur_attempts(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: default_auth_endpoint(),
            image_field: default_image_field(),
            jpeg_quality: default_jpeg_quality(),
            request_timeout_ms: default_request_timeout_ms(),
            network_attempts: default_network_attempts(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            base_url: default_telemetry_base_url(),
            ip_lookup_url: default_ip_lookup_url(),
            geolocation_url: None,
            geolocation_settle_ms: default_geolocation_settle_ms(),
            device_id: None,
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl Default for AuthscanConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            sampler: SamplerConfig::default(),
            enhancement: EnhancementConfig::default(),
            decode: DecodeConfig::default(),
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
            telemetry: TelemetryConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

// Default value functions
fn default_ideal_resolution() -> (u32, u32) {
    (1920, 1080)
}
fn default_rear_keywords() -> Vec<String> {
    vec!["back".to_string(), "rear".to_string(), "environment".to_string()]
}

fn default_tick_interval_ms() -> u64 {
    33
}
fn default_upscale() -> u32 {
    1
}

fn default_contrast_remap() -> bool {
    false
}
fn default_contrast() -> f32 {
    1.0
}
fn default_brightness() -> f32 {
    0.0
}
fn default_luma_weights() -> [f32; 3] {
    [0.34, 0.5, 0.16]
}
fn default_threshold() -> u8 {
    128
}
fn default_straighten_min_fraction() -> f32 {
    0.2
}

fn default_inversion() -> InversionAttempts {
    InversionAttempts::Both
}
fn default_error_correction() -> ErrorCorrection {
    ErrorCorrection::High
}
fn default_size_gate_fraction() -> f64 {
    0.2
}

fn default_min_zoom() -> f64 {
    1.0
}
fn default_max_zoom() -> f64 {
    5.0
}
fn default_zoom_step() -> f64 {
    0.5
}
fn default_timeout_ms() -> u64 {
    15_000
}
fn default_max_blur_attempts() -> u32 {
    4
}

fn default_auth_endpoint() -> String {
    "http://127.0.0.1:8000/authenticate".to_string()
}
fn default_image_field() -> String {
    "file".to_string()
}
fn default_jpeg_quality() -> u8 {
    90
}
fn default_request_timeout_ms() -> u64 {
    30_000
}
fn default_network_attempts() -> u32 {
    1
}

fn default_telemetry_enabled() -> bool {
    true
}
fn default_telemetry_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_ip_lookup_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}
fn default_geolocation_settle_ms() -> u64 {
    3_000
}

fn default_event_bus_capacity() -> usize {
    100
}
