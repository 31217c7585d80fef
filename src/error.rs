//! Error taxonomy for vologram geometry decoding.

use thiserror::Error;

/// Errors produced while opening a vologram container or reading a frame.
#[derive(Debug, Error)]
pub enum VolError {
    /// An expected read ran past end-of-file or end-of-slice.
    #[error("truncated: expected {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: i64,
        needed: i64,
        available: i64,
    },

    /// A structural invariant of the `.vols` format failed.
    #[error("malformed vologram: {0}")]
    Malformed(String),

    /// Caller supplied a frame index outside `[0, frame_count)`.
    #[error("frame index {index} out of range (frame_count = {frame_count})")]
    OutOfRange { index: u32, frame_count: u32 },

    /// Underlying file open/seek/read failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Allocation failure for directory, scratch buffer, or preloaded blob.
    #[error("out of memory allocating {what} ({bytes} bytes)")]
    OutOfMemory { what: &'static str, bytes: i64 },

    /// Invariant violation detected post-open; should be unreachable.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, VolError>;
