use super::*;
use crate::config::DecodeConfig;
use crate::frame::{FrameBuffer, RawFrame};
use parking_lot::Mutex;
use std::sync::Arc;

/// Decoder that reports a symbol of a fixed size and records the options it saw
struct FixedDecoder {
    result: Option<DecodeResult>,
    seen: Mutex<Vec<DecodeOptions>>,
}

impl FixedDecoder {
    fn square(payload: &str, origin: f32, side: f32) -> Self {
        Self {
            result: Some(DecodeResult {
                payload: payload.to_string(),
                location: SymbolLocation {
                    top_left: Point::new(origin, origin),
                    top_right: Point::new(origin + side, origin),
                    bottom_right: Point::new(origin + side, origin + side),
                    bottom_left: Point::new(origin, origin + side),
                },
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn nothing() -> Self {
        Self {
            result: None,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl SymbolDecoder for FixedDecoder {
    fn decode(&self, _rgba: &[u8], _w: u32, _h: u32, options: &DecodeOptions) -> Option<DecodeResult> {
        self.seen.lock().push(*options);
        self.result.clone()
    }
}

fn frame(width: u32, height: u32) -> FrameBuffer {
    FrameBuffer::from_raw(
        0,
        RawFrame::new(width, height, vec![255u8; (width * height * 4) as usize]),
    )
    .unwrap()
}

/// Render a QR symbol with a 4-module quiet zone
fn render_qr(payload: &str, module_px: u32, inverted: bool) -> RawFrame {
    let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
    let modules = code.width() as u32;
    let colors = code.to_colors();
    let quiet = 4;
    let size = (modules + quiet * 2) * module_px;

    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let mx = (x / module_px) as i64 - quiet as i64;
            let my = (y / module_px) as i64 - quiet as i64;
            let dark = mx >= 0
                && my >= 0
                && (mx as u32) < modules
                && (my as u32) < modules
                && colors[(my as u32 * modules + mx as u32) as usize] == qrcode::Color::Dark;
            let value = if dark != inverted { 0 } else { 255 };
            rgba.extend_from_slice(&[value, value, value, 255]);
        }
    }
    RawFrame::new(size, size, rgba)
}

#[test]
fn test_large_symbol_is_a_hit() {
    // 30% of a 200x200 frame's area is roughly a 110px square
    let engine = DecodeEngine::new(
        Arc::new(FixedDecoder::square("SKU-1", 40.0, 110.0)),
        &DecodeConfig::default(),
    );

    match engine.decode(&frame(200, 200)) {
        CycleOutcome::Hit(result) => assert_eq!(result.payload, "SKU-1"),
        other => panic!("expected hit, got {:?}", other),
    }
}

#[test]
fn test_small_symbol_is_partial_detection() {
    // Gate is 20% of the shorter side: 0.2 * 300 = 60px
    let engine = DecodeEngine::new(
        Arc::new(FixedDecoder::square("SKU-1", 10.0, 59.0)),
        &DecodeConfig::default(),
    );

    let outcome = engine.decode(&frame(400, 300));
    assert!(matches!(outcome, CycleOutcome::PartialDetection(_)));
    assert!(!outcome.is_hit());
}

#[test]
fn test_gate_uses_shorter_frame_side() {
    let engine = DecodeEngine::new(
        Arc::new(FixedDecoder::square("SKU-1", 0.0, 61.0)),
        &DecodeConfig::default(),
    );
    assert!(engine.decode(&frame(400, 300)).is_hit());
}

#[test]
fn test_no_symbol_is_miss() {
    let engine = DecodeEngine::new(Arc::new(FixedDecoder::nothing()), &DecodeConfig::default());
    assert_eq!(engine.decode(&frame(100, 100)), CycleOutcome::Miss);
}

#[test]
fn test_ignored_payload_is_miss() {
    let config = DecodeConfig {
        ignored_payloads: vec!["https://example.com/landing".to_string()],
        ..DecodeConfig::default()
    };
    let engine = DecodeEngine::new(
        Arc::new(FixedDecoder::square("https://example.com/landing", 0.0, 90.0)),
        &config,
    );
    assert_eq!(engine.decode(&frame(100, 100)), CycleOutcome::Miss);
}

#[test]
fn test_engine_requests_both_polarities_and_high_correction() {
    let decoder = Arc::new(FixedDecoder::nothing());
    let engine = DecodeEngine::new(decoder.clone(), &DecodeConfig::default());
    engine.decode(&frame(10, 10));

    let seen = decoder.seen.lock();
    assert_eq!(seen[0].inversion, InversionAttempts::Both);
    assert_eq!(seen[0].error_correction, ErrorCorrection::High);
}

#[test]
fn test_inversion_passes_order() {
    assert_eq!(InversionAttempts::Both.passes(), &[false, true]);
    assert_eq!(InversionAttempts::InvertFirst.passes(), &[true, false]);
    assert_eq!(InversionAttempts::Original.passes(), &[false]);
}

#[test]
fn test_rqrr_decodes_rendered_symbol() {
    let raw = render_qr("https://example.com/p/123", 6, false);
    let (width, height) = (raw.width, raw.height);

    let result = RqrrDecoder::new()
        .decode(&raw.rgba, width, height, &DecodeOptions::default())
        .expect("symbol should decode");

    assert_eq!(result.payload, "https://example.com/p/123");
    let (w, h) = result.location.bounding_size();
    assert!(w > 0.0 && h > 0.0);
    assert!(w <= width as f32 && h <= height as f32);
}

#[test]
fn test_rqrr_decodes_inverted_symbol_when_requested() {
    let raw = render_qr("BATCH-42", 6, true);
    let options = DecodeOptions {
        inversion: InversionAttempts::Inverted,
        ..DecodeOptions::default()
    };

    let result = RqrrDecoder::new().decode(&raw.rgba, raw.width, raw.height, &options);
    assert_eq!(result.map(|r| r.payload), Some("BATCH-42".to_string()));
}

#[test]
fn test_rqrr_blank_frame_is_none() {
    let raw = RawFrame::new(64, 64, vec![255u8; 64 * 64 * 4]);
    assert!(RqrrDecoder::new()
        .decode(&raw.rgba, 64, 64, &DecodeOptions::default())
        .is_none());
}

#[test]
fn test_engine_with_rqrr_hits_full_frame_symbol() {
    let raw = render_qr("https://example.com/p/9", 5, false);
    let frame = FrameBuffer::from_raw(3, raw).unwrap();
    let engine = DecodeEngine::new(Arc::new(RqrrDecoder::new()), &DecodeConfig::default());

    match engine.decode(&frame) {
        CycleOutcome::Hit(result) => assert_eq!(result.payload, "https://example.com/p/9"),
        other => panic!("expected hit, got {:?}", other),
    }
}
