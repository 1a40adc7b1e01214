//! Atomic file replacement shared by the history and pool stores.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::WallfetchError;

/// Writes `bytes` to a sibling temp file then renames it over `path`, so
/// readers only ever see the old or the new contents.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), WallfetchError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|err| WallfetchError::Persistence(err.error.to_string()))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.txt");
        std::fs::write(&path, "old contents that are longer").expect("seed file");

        atomic_write(&path, b"new").expect("atomic write");

        assert_eq!(std::fs::read_to_string(&path).expect("read back"), "new");
        let leftovers = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 1, "temp file should have been renamed away");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        atomic_write(&path, b"{}").expect("atomic write");
        assert!(path.exists());
    }
}
