use thiserror::Error;

/// Protocol violations raised by the frame request handlers.
///
/// The wire wrapper posts these on the offending `zwlr_screencopy_frame_v1`
/// resource (`already_used`, `invalid_buffer` and `out_of_memory`
/// respectively) and destroys it; the engine keeps no further interest in a
/// frame once one of these is returned.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("attempted to copy frame multiple times")]
    AlreadyUsed,
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("failed to allocate a buffer for the frame")]
    OutOfMemory,
}
