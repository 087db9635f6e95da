use serde::{Deserialize, Serialize};

/// Which polarities the decoder should try
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionAttempts {
    /// Dark symbol on light background only
    Original,
    /// Light symbol on dark background only
    Inverted,
    /// Normal first, then inverted
    Both,
    /// Inverted first, then normal
    InvertFirst,
}

impl InversionAttempts {
    /// Polarities to try, in order; `true` means inverted
    pub fn passes(&self) -> &'static [bool] {
        match self {
            InversionAttempts::Original => &[false],
            InversionAttempts::Inverted => &[true],
            InversionAttempts::Both => &[false, true],
            InversionAttempts::InvertFirst => &[true, false],
        }
    }
}

/// Error-correction tolerance requested from the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    pub inversion: InversionAttempts,
    pub error_correction: ErrorCorrection,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            inversion: InversionAttempts::Both,
            error_correction: ErrorCorrection::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Corners of a detected symbol in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl SymbolLocation {
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Axis-aligned bounding box as (width, height)
    pub fn bounding_size(&self) -> (f32, f32) {
        let corners = self.corners();
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        (max_x - min_x, max_y - min_y)
    }

    /// Shorter side of the bounding box
    pub fn extent(&self) -> f32 {
        let (width, height) = self.bounding_size();
        width.min(height)
    }
}

/// A decoded symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeResult {
    pub payload: String,
    pub location: SymbolLocation,
}

/// Outcome of one decode cycle. None of these are errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A validated symbol
    Hit(DecodeResult),
    /// No symbol this cycle
    Miss,
    /// A symbol too small to trust; the user should move closer
    PartialDetection(DecodeResult),
}

impl CycleOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, CycleOutcome::Hit(_))
    }
}
