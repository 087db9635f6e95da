mod engine;
mod rqrr_backend;
mod types;
#[cfg(test)]
mod tests;

pub use engine::{DecodeEngine, SymbolDecoder};
pub use rqrr_backend::RqrrDecoder;
pub use types::{
    CycleOutcome, DecodeOptions, DecodeResult, ErrorCorrection, InversionAttempts, Point,
    SymbolLocation,
};
