//! A temporary on-disk copy of the chunks bucket.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Chunk objects written under a temp directory, keyed exactly as in the
/// bucket. Removed when dropped.
pub struct LocalMirror {
    dir: TempDir,
}

impl LocalMirror {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` at `key`, creating intermediate directories.
    pub fn write_chunk(&self, key: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_nested_key() {
        let mirror = LocalMirror::new().unwrap();
        let path = mirror
            .write_chunk("KTLX/585/20240427-231512-1-S", b"payload")
            .unwrap();
        assert!(path.starts_with(mirror.root()));
        assert_eq!(fs::read(path).unwrap(), b"payload");
    }
}
