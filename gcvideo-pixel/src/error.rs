use thiserror::Error;

/// Errors raised while deriving pixel shader constants.
///
/// Every variant describes register state that correct upstream emulation
/// never produces, so callers should treat it as a bug report rather than
/// something to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelConstantsError {
    /// The ZTEX2 type field holds the unused fourth encoding.
    #[error("invalid Z texture format {raw} (expected 0 = Z8, 1 = Z16 or 2 = Z24)")]
    InvalidZTextureFormat { raw: u8 },
}

pub type Result<T> = std::result::Result<T, PixelConstantsError>;
