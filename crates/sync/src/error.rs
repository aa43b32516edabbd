use thiserror::Error;

/// Decode-fatal protocol errors. Either one aborts the current frame; the
/// session itself continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("bit buffer underrun: requested {requested} bits, {available} available")]
    Underrun { requested: u32, available: usize },

    #[error("dirty flags {flags:#x} name fields beyond the {known} known")]
    ProtocolMismatch { flags: u32, known: u32 },
}
