//! Symmetric key material for one store: generation, retrieval, and
//! rotation with re-encryption of the data it protects.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use rand::{rngs::OsRng, RngCore};
use tempfile::NamedTempFile;
use zenacc_core::StoreError;

use crate::fsio::write_atomic;

/// 16 random bytes, hex-encoded to 32 ASCII characters. The hex characters
/// themselves are the AES-256 cipher key and are persisted verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreKey {
    hex: String,
}

impl StoreKey {
    pub(crate) fn generate() -> Self {
        let mut raw = [0u8; 16];
        OsRng.fill_bytes(&mut raw);
        StoreKey {
            hex: hex::encode(raw),
        }
    }

    pub(crate) fn from_persisted(contents: &str) -> Result<Self, StoreError> {
        let hex = contents.trim();
        if hex.len() != 32 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StoreError::decode("key file is not 32 hex characters"));
        }
        Ok(StoreKey {
            hex: hex.to_string(),
        })
    }

    /// The persisted form: 32 hex characters.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// The 32 bytes that key the cipher.
    pub(crate) fn material(&self) -> &[u8] {
        self.hex.as_bytes()
    }
}

// Key material must never reach logs.
impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(..)")
    }
}

/// Owns the key file (`key-{name}`) backing one encrypted store.
pub struct KeyManager {
    path: PathBuf,
}

impl KeyManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The persisted key, if the key file exists.
    pub fn current(&self) -> Result<Option<StoreKey>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => StoreKey::from_persisted(&contents).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(format!("{}: {err}", self.path.display()))),
        }
    }

    /// The current key, generating and persisting a fresh one if absent.
    pub fn get_or_create(&self) -> Result<StoreKey, StoreError> {
        if let Some(existing) = self.current()? {
            return Ok(existing);
        }
        let key = StoreKey::generate();
        write_atomic(&self.path, key.as_str().as_bytes())?;
        Ok(key)
    }

    /// Replace the key, re-encrypting dependent data under the new one.
    ///
    /// The new key is staged in a temp file first; `reencrypt` then rewrites
    /// the data under the new key (receiving the current key, or `None` when
    /// rotation degenerates to plain generation), and only after it succeeds
    /// is the staged key renamed over the old one. The old key file is never
    /// deleted ahead of the rewrite. A crash between the data rename and the
    /// key rename still strands the ciphertext; callers that cannot accept
    /// that window must keep their own backup of the key file.
    pub fn rotate<F>(&self, reencrypt: F) -> Result<StoreKey, StoreError>
    where
        F: FnOnce(Option<&StoreKey>, &StoreKey) -> Result<(), StoreError>,
    {
        let current = self.current()?;
        let next = StoreKey::generate();

        let parent = self.path.parent().ok_or_else(|| {
            StoreError::io(format!("no parent directory for {}", self.path.display()))
        })?;
        let mut staged = NamedTempFile::new_in(parent)
            .map_err(|err| StoreError::io(format!("{}: {err}", parent.display())))?;
        staged
            .write_all(next.as_str().as_bytes())
            .and_then(|()| staged.flush())
            .map_err(|err| StoreError::io(format!("{}: {err}", self.path.display())))?;

        reencrypt(current.as_ref(), &next)?;

        staged
            .persist(&self.path)
            .map_err(|err| StoreError::io(format!("{}: {}", self.path.display(), err.error)))?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &std::path::Path) -> KeyManager {
        KeyManager::new(dir.join("key-test"))
    }

    #[test]
    fn get_or_create_persists_32_hex_chars_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = manager(dir.path());

        assert!(keys.current().expect("current").is_none());

        let first = keys.get_or_create().expect("create");
        assert_eq!(first.as_str().len(), 32);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let on_disk = std::fs::read_to_string(dir.path().join("key-test")).expect("read");
        assert_eq!(on_disk, first.as_str());

        let second = keys.get_or_create().expect("reload");
        assert_eq!(first, second);
    }

    #[test]
    fn malformed_key_file_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("key-test"), "not-a-key").expect("write");

        let err = manager(dir.path()).current().expect_err("should reject");
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn rotate_replaces_key_and_passes_old_key_to_callback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = manager(dir.path());
        let old = keys.get_or_create().expect("create");

        let old_for_callback = old.clone();
        let next = keys
            .rotate(|current, next| {
                assert_eq!(current, Some(&old_for_callback));
                assert_ne!(Some(next), current);
                Ok(())
            })
            .expect("rotate");

        assert_ne!(next, old);
        let on_disk = std::fs::read_to_string(dir.path().join("key-test")).expect("read");
        assert_eq!(on_disk, next.as_str());
    }

    #[test]
    fn rotate_without_existing_key_degenerates_to_generation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = manager(dir.path());

        let next = keys
            .rotate(|current, _next| {
                assert!(current.is_none());
                Ok(())
            })
            .expect("rotate");

        assert_eq!(keys.current().expect("current"), Some(next));
    }

    #[test]
    fn failed_reencrypt_leaves_old_key_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let keys = manager(dir.path());
        let old = keys.get_or_create().expect("create");

        let err = keys
            .rotate(|_, _| Err(StoreError::decode("forced failure")))
            .expect_err("rotation should fail");
        assert!(matches!(err, StoreError::Decode { .. }));

        assert_eq!(keys.current().expect("current"), Some(old));
    }
}
