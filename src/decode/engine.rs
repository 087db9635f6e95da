use super::types::{CycleOutcome, DecodeOptions, DecodeResult};
use crate::config::DecodeConfig;
use crate::frame::FrameBuffer;
use std::sync::Arc;
use tracing::{debug, trace};

/// External symbol-decoding capability
pub trait SymbolDecoder: Send + Sync {
    /// Decode a symbol from an RGBA buffer; None means nothing was found
    fn decode(&self, rgba: &[u8], width: u32, height: u32, options: &DecodeOptions)
        -> Option<DecodeResult>;
}

/// Wraps a [`SymbolDecoder`] with the size gate and payload filtering
pub struct DecodeEngine {
    decoder: Arc<dyn SymbolDecoder>,
    options: DecodeOptions,
    size_gate_fraction: f64,
    ignored_payloads: Vec<String>,
}

impl DecodeEngine {
    pub fn new(decoder: Arc<dyn SymbolDecoder>, config: &DecodeConfig) -> Self {
        Self {
            decoder,
            options: DecodeOptions {
                inversion: config.inversion,
                error_correction: config.error_correction,
            },
            size_gate_fraction: config.size_gate_fraction,
            ignored_payloads: config.ignored_payloads.clone(),
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn decode(&self, frame: &FrameBuffer) -> CycleOutcome {
        let Some(result) =
            self.decoder
                .decode(frame.as_rgba(), frame.width(), frame.height(), &self.options)
        else {
            trace!("No symbol in frame {}", frame.id);
            return CycleOutcome::Miss;
        };

        if self.ignored_payloads.iter().any(|p| *p == result.payload) {
            debug!("Ignoring reserved payload '{}'", result.payload);
            return CycleOutcome::Miss;
        }

        let shorter_side = frame.width().min(frame.height()) as f64;
        let min_extent = self.size_gate_fraction * shorter_side;
        let extent = result.location.extent() as f64;

        if extent < min_extent {
            debug!(
                "Symbol extent {:.1}px below {:.1}px gate in frame {}",
                extent, min_extent, frame.id
            );
            return CycleOutcome::PartialDetection(result);
        }

        debug!("Decoded '{}' in frame {}", result.payload, frame.id);
        CycleOutcome::Hit(result)
    }
}
