use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use zenacc_core::StoreError;

/// Whole-file overwrite via a temp file in the destination directory
/// followed by a rename, so readers never observe a torn write.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::io(format!("no parent directory for {}", path.display())))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| StoreError::io(format!("{}: {err}", parent.display())))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.flush())
        .map_err(|err| StoreError::io(format!("{}: {err}", path.display())))?;
    tmp.persist(path)
        .map_err(|err| StoreError::io(format!("{}: {}", path.display(), err.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrites_existing_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blob");

        write_atomic(&path, b"first").expect("write");
        write_atomic(&path, b"second").expect("rewrite");

        assert_eq!(std::fs::read(&path).expect("read"), b"second");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gone").join("blob");

        let err = write_atomic(&path, b"x").expect_err("should fail");
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
