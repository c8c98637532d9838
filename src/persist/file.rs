//! Atomic File I/O
//!
//! Files are written to a temporary sibling and renamed over the target, so
//! the target always holds either the previous or the complete new content.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{CacheError, Result};

/// Replaces `path` with `bytes` atomically, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| CacheError::persistence("create cache directory", e))?;

    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| CacheError::persistence("create temp file", e))?;
    tmp.write_all(bytes)
        .map_err(|e| CacheError::persistence("write temp file", e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| CacheError::persistence("sync temp file", e))?;
    tmp.persist(path)
        .map_err(|e| CacheError::persistence("rename temp file", e.error))?;
    Ok(())
}

/// Reads `path`, returning `None` when it does not exist.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::persistence("read cache file", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(read_if_exists(&path).unwrap().unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(read_if_exists(&path).unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cache.json");

        write_atomic(&path, b"{}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        write_atomic(&path, b"data").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("cache.json")]);
    }

    #[test]
    fn test_failed_write_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        write_atomic(&path, b"previous").unwrap();

        // A directory cannot be renamed over by a file.
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("inner"), b"x").unwrap();
        assert!(write_atomic(&blocked, b"new").is_err());

        assert_eq!(read_if_exists(&path).unwrap().unwrap(), b"previous");
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_if_exists(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }
}
