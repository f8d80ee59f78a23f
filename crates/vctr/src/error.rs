use thiserror::Error;

pub type VctrResult<T> = Result<T, VctrError>;

/// Errors produced while reading or writing vector tile payloads.
#[derive(Debug, Error)]
pub enum VctrError {
    #[error("truncated vector tile: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("invalid vector tile magic {0:?}, expected \"vctr\"")]
    BadMagic([u8; 4]),

    #[error("only vector tile version 1 is supported, got version {0}")]
    UnsupportedVersion(u32),

    #[error("declared byte length {declared} does not fit a {available}-byte buffer")]
    BadByteLength { declared: u32, available: usize },

    #[error("payload of {0} bytes does not fit a u32 byte length")]
    TooLarge(usize),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("polygon {index} is invalid: {reason}")]
    InvalidPolygon { index: usize, reason: String },

    #[error("label {index} is invalid: {reason}")]
    InvalidLabel { index: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
