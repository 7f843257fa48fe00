//! File identity used as a cache key.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};

/// In-memory file content with a path and a content hash.
///
/// Two files are equal when their paths and contents are equal; equal
/// content always yields equal hashes.
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
    data: Arc<[u8]>,
    hash: u64,
}

impl File {
    /// Wrap `data` as the contents of `path`.
    pub fn from_memory(path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        let data: Arc<[u8]> = data.into().into();
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        Self {
            path: path.into(),
            data,
            hash: hasher.finish(),
        }
    }

    /// Read `path` from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> RenderResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| RenderError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        log::debug!("loaded file \"{}\" ({} bytes)", path.display(), data.len());
        Ok(Self::from_memory(path, data))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for diagnostics.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The content as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Hash of the content.
    pub fn content_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.path == other.path && self.data == other.data
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_content_equal_hash() {
        let a = File::from_memory("a.vert", "void main() {}");
        let b = File::from_memory("b.vert", "void main() {}");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a, b);
        assert_eq!(a, File::from_memory("a.vert", "void main() {}"));
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let err = File::load("/definitely/not/here.glsl").unwrap_err();
        assert!(matches!(err, RenderError::Io { .. }));
    }

    #[test]
    fn test_text() {
        let file = File::from_memory("x", b"hello".to_vec());
        assert_eq!(file.text(), "hello");
        assert_eq!(file.name(), "x");
    }
}
