//! Frame enhancement ahead of symbol decoding.
//!
//! Runs in a fixed order on the RGBA raster: optional contrast/brightness
//! remap, grayscale reduction, then binarization to a two-level image. An
//! optional last stage warps the largest dark region onto the frame.

use crate::config::EnhancementConfig;
use crate::frame::FrameBuffer;
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::threshold;
use imageproc::distance_transform::Norm;
use imageproc::geometric_transformations::{warp, Interpolation, Projection};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Quiet zone kept around a straightened region, as a fraction of each side
const STRAIGHTEN_MARGIN: f32 = 0.1;

/// Dilation radius that merges symbol modules into one region
const MODULE_MERGE_RADIUS: u8 = 3;

/// Global or jittered binarization threshold
pub struct ThresholdPolicy {
    base: u8,
    jitter: u8,
    rng: StdRng,
}

impl ThresholdPolicy {
    pub fn fixed(base: u8) -> Self {
        Self::jittered(base, 0, Some(0))
    }

    /// `base +/- jitter`, drawn once per frame. A seed pins the sequence.
    pub fn jittered(base: u8, jitter: u8, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { base, jitter, rng }
    }

    pub fn base(&self) -> u8 {
        self.base
    }

    pub fn is_fixed(&self) -> bool {
        self.jitter == 0
    }

    /// Threshold for the next frame, kept within 1..=254
    pub fn next(&mut self) -> u8 {
        if self.jitter == 0 {
            return self.base.clamp(1, 254);
        }
        let offset = self
            .rng
            .random_range(-(self.jitter as i16)..=(self.jitter as i16));
        (self.base as i16 + offset).clamp(1, 254) as u8
    }
}

pub struct ImageEnhancer {
    contrast_remap: bool,
    contrast: f32,
    brightness: f32,
    luma_weights: [f32; 3],
    invert: bool,
    threshold: ThresholdPolicy,
    /// Minimum region fraction when straightening is on
    straighten: Option<f32>,
}

impl ImageEnhancer {
    pub fn new(config: &EnhancementConfig) -> Self {
        Self {
            contrast_remap: config.contrast_remap,
            contrast: config.contrast,
            brightness: config.brightness,
            luma_weights: config.luma_weights,
            invert: config.invert,
            threshold: ThresholdPolicy::jittered(config.threshold, config.jitter, config.seed),
            straighten: config.straighten.then_some(config.straighten_min_fraction),
        }
    }

    /// Enhance the frame in place. A frame that is already two-level is left
    /// alone, so enhancing twice equals enhancing once.
    pub fn enhance(&mut self, frame: &mut FrameBuffer) {
        let id = frame.id;
        let image = frame.image_mut();

        if is_two_level(image) {
            trace!("Frame {} is already binarized", id);
            return;
        }

        if self.contrast_remap {
            remap_contrast(image, self.contrast, self.brightness);
        }

        let gray = grayscale(image, self.luma_weights);
        let level = self.threshold.next();
        let binary = threshold(&gray, level);
        write_back(image, &binary, self.invert);

        if let Some(min_fraction) = self.straighten {
            if straighten(image, min_fraction) {
                trace!("Straightened frame {}", id);
            }
        }

        trace!("Enhanced frame {} with threshold {}", id, level);
    }
}

/// `p' = min(255, contrast * p + brightness)` per colour channel; alpha is untouched
pub fn remap_contrast(image: &mut RgbaImage, contrast: f32, brightness: f32) {
    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = (contrast * *channel as f32 + brightness).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Weighted luminance; equal weights give the plain RGB average
pub fn grayscale(image: &RgbaImage, weights: [f32; 3]) -> GrayImage {
    let total: f32 = weights.iter().sum();
    let [wr, wg, wb] = weights.map(|w| w / total);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        let luma = wr * r as f32 + wg * g as f32 + wb * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Global binarization of an RGBA image: luminance above `level` becomes white.
/// Two-level input is returned unchanged whatever the polarity.
pub fn binarize(image: &mut RgbaImage, weights: [f32; 3], level: u8, invert: bool) {
    if is_two_level(image) {
        return;
    }
    let gray = grayscale(image, weights);
    let binary = threshold(&gray, level);
    write_back(image, &binary, invert);
}

/// Every pixel opaque pure black or pure white
pub fn is_two_level(image: &RgbaImage) -> bool {
    image
        .pixels()
        .all(|p| matches!(p.0, [0, 0, 0, 255] | [255, 255, 255, 255]))
}

/// Warp the largest dark region of a binarized image onto the frame, keeping a
/// white margin. Regions touching the border or shorter than `min_fraction` of
/// the frame's shorter side are ignored. Returns whether the image changed.
pub fn straighten(image: &mut RgbaImage, min_fraction: f32) -> bool {
    let (width, height) = image.dimensions();
    if width < 2 || height < 2 {
        return false;
    }

    // Dark pixels are the foreground for contour tracing
    let mask = GrayImage::from_fn(width, height, |x, y| {
        Luma([if image.get_pixel(x, y).0[0] < 128 { 255 } else { 0 }])
    });
    let mask = dilate(&mask, Norm::LInf, MODULE_MERGE_RADIUS);

    let min_side = min_fraction * width.min(height) as f32;
    let region = find_contours::<i32>(&mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| Region::from_points(&c.points, width, height))
        .filter(|r| r.extent >= min_side)
        .max_by(|a, b| a.area.total_cmp(&b.area));
    let Some(region) = region else {
        return false;
    };

    let (w, h) = (width as f32, height as f32);
    let (mx, my) = (STRAIGHTEN_MARGIN * w, STRAIGHTEN_MARGIN * h);
    let target = [(mx, my), (w - mx, my), (w - mx, h - my), (mx, h - my)];
    let Some(projection) = Projection::from_control_points(region.corners, target) else {
        return false;
    };

    *image = warp(
        &*image,
        &projection,
        Interpolation::Nearest,
        Rgba([255, 255, 255, 255]),
    );
    true
}

/// Quadrilateral approximation of one contour
struct Region {
    /// top-left, top-right, bottom-right, bottom-left
    corners: [(f32, f32); 4],
    extent: f32,
    area: f32,
}

impl Region {
    fn from_points(points: &[Point<i32>], width: u32, height: u32) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        let (mut tl, mut tr, mut br, mut bl) = (*first, *first, *first, *first);

        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
            if p.x + p.y < tl.x + tl.y {
                tl = *p;
            }
            if p.x + p.y > br.x + br.y {
                br = *p;
            }
            if p.x - p.y > tr.x - tr.y {
                tr = *p;
            }
            if p.x - p.y < bl.x - bl.y {
                bl = *p;
            }
        }

        if min_x <= 0 || min_y <= 0 || max_x >= width as i32 - 1 || max_y >= height as i32 - 1 {
            return None;
        }

        let (bw, bh) = ((max_x - min_x) as f32, (max_y - min_y) as f32);
        let corner = |p: Point<i32>| (p.x as f32, p.y as f32);
        Some(Self {
            corners: [corner(tl), corner(tr), corner(br), corner(bl)],
            extent: bw.min(bh),
            area: bw * bh,
        })
    }
}

fn write_back(image: &mut RgbaImage, binary: &GrayImage, invert: bool) {
    for (pixel, level) in image.pixels_mut().zip(binary.pixels()) {
        let white = level.0[0] == 255;
        let value = if white != invert { 255 } else { 0 };
        pixel.0 = [value, value, value, 255];
    }
}
