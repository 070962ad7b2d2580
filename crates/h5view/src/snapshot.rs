//! JSON snapshots of container images on disk.
//!
//! A snapshot is an [`Image`] serialized with serde. Opening one loads and
//! validates the whole tree up front; after that the handle behaves exactly
//! like a [`MemoryFile`], except that the reported file size is the size of
//! the snapshot on disk.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Error, OpenError, Result};
use crate::memory::{Image, MemoryFile};

/// Opens `.json` snapshots written by [`Image::to_json`] or
/// [`ImageBuilder::write_json`](crate::memory::ImageBuilder::write_json).
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotBackend;

impl SnapshotBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for SnapshotBackend {
    type Handle = MemoryFile;

    fn open_read_only(&self, path: &Path) -> Result<MemoryFile> {
        let bytes = read_bytes(path).map_err(|e| Error::open(path, e))?;
        let image = Image::from_json(&bytes).map_err(|e| match e {
            Error::Json(e) => Error::open(path, OpenError::FormatInvalid(e.to_string())),
            Error::InvalidImage(msg) => Error::open(path, OpenError::FormatInvalid(msg)),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded snapshot");
        Ok(MemoryFile::new(Arc::new(image), bytes.len() as u64))
    }
}

#[cfg(feature = "mmap")]
fn read_bytes(path: &Path) -> std::io::Result<Bytes> {
    let file = fs::File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Bytes::Owned(Vec::new()));
    }
    // SAFETY: read-only mapping, dropped as soon as the image is parsed.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    Ok(Bytes::Mapped(mmap))
}

#[cfg(not(feature = "mmap"))]
fn read_bytes(path: &Path) -> std::io::Result<Bytes> {
    fs::read(path).map(Bytes::Owned)
}

enum Bytes {
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
    Owned(Vec<u8>),
}

impl std::ops::Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Bytes::Mapped(m) => &m[..],
            Bytes::Owned(v) => &v[..],
        }
    }
}
