// SPDX-FileCopyrightText: 2026 Tokvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The long-lived master key and its on-disk file.
//!
//! The key file holds exactly [`KEY_LEN`] raw bytes and is created with
//! owner-only permissions. Its protection at rest is the filesystem's, not
//! ours. A file of the wrong length is reported, never replaced: a fresh key
//! would make every stored ciphertext permanently undecryptable.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tokvault_core::VaultError;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN};

/// Symmetric master key material.
///
/// Debug output intentionally omits the key bytes.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"[REDACTED]").finish()
    }
}

impl MasterKey {
    /// Generate a fresh key from the system CSPRNG.
    pub fn generate() -> Result<Self, VaultError> {
        Ok(Self(Zeroizing::new(crypto::random_bytes()?)))
    }

    /// Wrap existing key bytes. Anything but [`KEY_LEN`] bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            VaultError::KeyStore(format!(
                "corrupted master key (expected {KEY_LEN} bytes, found {})",
                bytes.len()
            ))
        })?;
        Ok(Self(Zeroizing::new(key)))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Loads the master key from its file, creating it on first use.
#[derive(Debug, Clone)]
pub struct MasterKeyStore {
    path: PathBuf,
}

impl MasterKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key, or generate and persist one if the file does not exist.
    ///
    /// Fails with [`VaultError::KeyStore`] if the file exists but cannot be
    /// read or has the wrong length.
    pub fn get_key(&self) -> Result<MasterKey, VaultError> {
        match self.load()? {
            Some(key) => Ok(key),
            None => self.create(),
        }
    }

    fn load(&self) -> Result<Option<MasterKey>, VaultError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(VaultError::KeyStore(format!(
                    "failed to read master key {}: {e}",
                    self.path.display()
                )));
            }
        };
        if bytes.len() != KEY_LEN {
            return Err(VaultError::KeyStore(format!(
                "corrupted master key {} (expected {KEY_LEN} bytes, found {}); refusing to regenerate",
                self.path.display(),
                bytes.len()
            )));
        }
        warn_if_shared(&self.path);
        MasterKey::from_bytes(&bytes).map(Some)
    }

    /// Write a fresh key to a temp file beside the target, then link it into
    /// place without clobbering. Readers only ever see a complete key file.
    fn create(&self) -> Result<MasterKey, VaultError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| {
            VaultError::KeyStore(format!(
                "failed to create key directory {}: {e}",
                dir.display()
            ))
        })?;

        let key = MasterKey::generate()?;
        let write_failed = |e: std::io::Error| {
            VaultError::KeyStore(format!(
                "failed to write master key {}: {e}",
                self.path.display()
            ))
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_failed)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(write_failed)?;
        }
        tmp.write_all(key.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(write_failed)?;

        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                info!(path = %self.path.display(), "generated new master key");
                Ok(key)
            }
            // Another process won the race; its file is complete, use its key.
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %self.path.display(), "master key created concurrently; loading it");
                self.load()?.ok_or_else(|| {
                    VaultError::KeyStore(format!(
                        "master key {} vanished during creation",
                        self.path.display()
                    ))
                })
            }
            Err(e) => Err(write_failed(e.error)),
        }
    }
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = %format_args!("{mode:o}"),
                "master key file is readable by group or others"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_call_generates_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys").join("master.key");
        let store = MasterKeyStore::new(&path);

        let key = store.get_key().unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk.as_slice(), key.as_bytes());
    }

    #[test]
    fn second_call_loads_same_key() {
        let dir = tempdir().unwrap();
        let store = MasterKeyStore::new(dir.path().join("master.key"));

        let first = store.get_key().unwrap();
        let second = store.get_key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        MasterKeyStore::new(&path).get_key().unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn wrong_length_is_an_error_and_not_regenerated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        std::fs::write(&path, [1u8; 17]).unwrap();

        let result = MasterKeyStore::new(&path).get_key();
        assert!(matches!(result, Err(VaultError::KeyStore(_))));
        // The corrupt file is left for a human to inspect.
        assert_eq!(std::fs::read(&path).unwrap(), vec![1u8; 17]);
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            MasterKeyStore::new(&path).get_key(),
            Err(VaultError::KeyStore(_))
        ));
    }

    #[test]
    fn concurrent_first_start_agrees_on_one_complete_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = MasterKeyStore::new(&path);
                let barrier = std::sync::Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.get_key().map(|key| *key.as_bytes())
                })
            })
            .collect();
        let keys: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        let on_disk = std::fs::read(&path).unwrap();
        assert!(keys.iter().all(|key| key.as_slice() == on_disk.as_slice()));
    }

    #[test]
    fn creation_leaves_only_the_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        MasterKeyStore::new(&path).get_key().unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("master.key")]);
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = MasterKey::from_bytes(&[0xAB; KEY_LEN]).unwrap();
        let debug = format!("{key:?}");
        assert_eq!(debug, "MasterKey(\"[REDACTED]\")");
    }
}
