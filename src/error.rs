//! Error types for ringfence.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingFenceError>;

#[derive(Error, Debug)]
pub enum RingFenceError {
    #[error("ring size must be a non-zero power of two, got {size}")]
    SizeNotPowerOfTwo { size: usize },

    #[error("{type_name} is undersized for cache-line isolation: {actual} < {required} bytes")]
    Undersized {
        type_name: &'static str,
        actual: usize,
        required: usize,
    },

    #[error("invalid bloom filter parameters: {reason}")]
    InvalidBloomParams { reason: String },

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(io::Error),

    #[error("slot processing failed: {reason}")]
    SlotProcessingFailed { reason: String },

    #[error("pipeline is not fully wired: {reason}")]
    NotWired { reason: String },
}

impl RingFenceError {
    pub fn bloom_params(reason: impl Into<String>) -> Self {
        Self::InvalidBloomParams { reason: reason.into() }
    }

    pub fn slot_processing(reason: impl Into<String>) -> Self {
        Self::SlotProcessingFailed { reason: reason.into() }
    }

    pub fn not_wired(reason: impl Into<String>) -> Self {
        Self::NotWired { reason: reason.into() }
    }
}
