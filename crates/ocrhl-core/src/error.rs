use thiserror::Error;

use crate::types::{Encoding, OffsetKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Unsupported offset mode: {kind:?} offsets over {encoding:?} content")]
    UnsupportedOffsetMode { kind: OffsetKind, encoding: Encoding },

    #[error("Content is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Resource unavailable: {0}")]
    Resource(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
