//! Document content backends.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use ocrhl_core::error::{Error, Result};
use ocrhl_core::traits::DocumentContent;
use ocrhl_core::types::{Encoding, OffsetKind};

/// A UTF-8 document on disk, paged in by the OS as it is read.
pub struct MappedDocument {
    path: PathBuf,
    // `None` for empty files, which cannot be mapped
    map: Option<Mmap>,
}

impl MappedDocument {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::Resource(format!("{}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the mapping is read-only; source files are not rewritten while being highlighted
            Some(unsafe { Mmap::map(&file) }?)
        };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentContent for MappedDocument {
    fn offset_kind(&self) -> OffsetKind {
        OffsetKind::Bytes
    }

    fn encoding(&self) -> Encoding {
        Encoding::Utf8
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

/// Content held in memory with an explicit offset kind and encoding.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    bytes: Vec<u8>,
    offset_kind: OffsetKind,
    encoding: Encoding,
}

impl InMemoryDocument {
    pub fn new(bytes: Vec<u8>, offset_kind: OffsetKind, encoding: Encoding) -> Self {
        Self { bytes, offset_kind, encoding }
    }

    /// UTF-8 text addressed by byte offset.
    pub fn utf8(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), OffsetKind::Bytes, Encoding::Utf8)
    }

    /// UTF-8 text addressed by character offset.
    pub fn utf8_chars(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), OffsetKind::Chars, Encoding::Utf8)
    }
}

impl DocumentContent for InMemoryDocument {
    fn offset_kind(&self) -> OffsetKind {
        self.offset_kind
    }

    fn encoding(&self) -> Encoding {
        self.encoding
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Decode `bytes` into characters for character-offset mode.
pub fn decode_chars(bytes: &[u8], encoding: Encoding) -> Result<Vec<char>> {
    let chars = match encoding {
        Encoding::Utf8 => std::str::from_utf8(bytes)?.chars().collect(),
        Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if bytes.len() % 2 != 0 {
                return Err(Error::Operation(format!("odd length {} for UTF-16 content", bytes.len())));
            }
            let units = bytes.chunks_exact(2).map(|pair| match encoding {
                Encoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                _ => u16::from_be_bytes([pair[0], pair[1]]),
            });
            char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)).collect()
        }
    };
    Ok(chars)
}
