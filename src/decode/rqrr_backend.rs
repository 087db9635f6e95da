use super::types::{DecodeOptions, DecodeResult, Point, SymbolLocation};
use super::engine::SymbolDecoder;
use rqrr::PreparedImage;
use tracing::trace;

/// Pure Rust QR decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// BT.601 luminance in integer math
fn rgba_to_greyscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    rgba.chunks_exact(4)
        .take(width * height)
        .map(|px| {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            ((77 * r + 150 * g + 29 * b) >> 8) as u8
        })
        .collect()
}

fn try_decode(grey: &[u8], width: usize, height: usize, inverted: bool) -> Option<DecodeResult> {
    let mut img = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let value = grey[y * width + x];
        if inverted {
            255 - value
        } else {
            value
        }
    });

    img.detect_grids().into_iter().find_map(|grid| {
        let (_, content) = grid.decode().ok()?;
        let [tl, tr, br, bl] = grid.bounds;
        let point = |p: rqrr::Point| Point::new(p.x as f32, p.y as f32);
        Some(DecodeResult {
            payload: content,
            location: SymbolLocation {
                top_left: point(tl),
                top_right: point(tr),
                bottom_right: point(br),
                bottom_left: point(bl),
            },
        })
    })
}

impl SymbolDecoder for RqrrDecoder {
    fn decode(
        &self,
        rgba: &[u8],
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Option<DecodeResult> {
        let (width, height) = (width as usize, height as usize);
        if width == 0 || height == 0 || rgba.len() < width * height * 4 {
            return None;
        }

        // rqrr always corrects up to the symbol's own level
        trace!("Decoding with {:?}", options);
        let grey = rgba_to_greyscale(rgba, width, height);
        options
            .inversion
            .passes()
            .iter()
            .find_map(|&inverted| try_decode(&grey, width, height, inverted))
    }
}
