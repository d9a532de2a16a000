use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Store identity. Both values are written into a marker file at the store
/// root and must match on every open; a mismatch triggers a one-time
/// structural rebuild of the (re-creatable) store, not a data migration.
pub const STORE_NAME: &str = "ar-asset-store";
pub const STORE_VERSION: u32 = 1;

/// Persistent key-to-blob store backed by a directory of content files.
///
/// Keys are arbitrary source URL strings; each maps to at most one blob file
/// named by the sha256 of the key. Entries are write-once: a key is either
/// absent or holds a complete blob. Writes go through a temp file plus rename
/// so a failed or interrupted write never leaves a partial entry behind.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open (or create) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let marker = root.join("STORE");
        let expected = format!("{STORE_NAME} v{STORE_VERSION}");

        match fs::read_to_string(&marker) {
            Ok(found) if found.trim() == expected => {}
            Ok(found) => {
                log::warn!(
                    "asset store at {:?} has layout '{}', expected '{}'; rebuilding",
                    root,
                    found.trim(),
                    expected
                );
                fs::remove_dir_all(&root).map_err(|err| {
                    Error::storage(format!("failed to clear stale store at {:?}: {err}", root))
                })?;
                Self::create(&root, &marker, &expected)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::create(&root, &marker, &expected)?;
            }
            Err(err) => {
                return Err(Error::storage(format!(
                    "failed to open store at {:?}: {err}",
                    root
                )));
            }
        }

        Ok(Self { root })
    }

    fn create(root: &Path, marker: &Path, tag: &str) -> Result<()> {
        fs::create_dir_all(root.join("blobs")).map_err(|err| {
            Error::storage(format!("failed to create store at {:?}: {err}", root))
        })?;
        fs::write(marker, format!("{tag}\n")).map_err(|err| {
            Error::storage(format!("failed to write store marker at {:?}: {err}", marker))
        })?;
        log::info!("created asset store at {:?} ({tag})", root);
        Ok(())
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2);
        for byte in digest {
            name.push_str(&format!("{byte:02x}"));
        }
        self.root.join("blobs").join(name)
    }

    /// Look up `key`. Returns the blob file path and its contents, or `None`
    /// when the key has never been persisted.
    pub fn get(&self, key: &str) -> Result<Option<(PathBuf, Vec<u8>)>> {
        let path = self.blob_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some((path, bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::storage(format!(
                "failed to read entry for '{key}': {err}"
            ))),
        }
    }

    /// Persist `bytes` under `key` and return the blob file path. Existing
    /// entries are kept as-is (write-once per key).
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.blob_path(key);
        if path.exists() {
            return Ok(path);
        }

        let tmp = path.with_extension("part");
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()
        };
        if let Err(err) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(Error::storage(format!(
                "failed to write entry for '{key}': {err}"
            )));
        }
        fs::rename(&tmp, &path).map_err(|err| {
            let _ = fs::remove_file(&tmp);
            Error::storage(format!("failed to commit entry for '{key}': {err}"))
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store")).unwrap();

        assert!(store.get("https://cdn.example/a.png").unwrap().is_none());
        store.put("https://cdn.example/a.png", b"abc").unwrap();
        let (path, bytes) = store.get("https://cdn.example/a.png").unwrap().unwrap();
        assert_eq!(bytes, b"abc");
        assert!(path.exists());
    }

    #[test]
    fn entries_are_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store")).unwrap();

        store.put("k", b"first").unwrap();
        store.put("k", b"second").unwrap();
        let (_, bytes) = store.get("k").unwrap().unwrap();
        assert_eq!(bytes, b"first");
    }

    #[test]
    fn version_mismatch_rebuilds_empty() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");

        let store = BlobStore::open(&root).unwrap();
        store.put("k", b"v").unwrap();
        drop(store);

        std::fs::write(root.join("STORE"), "ar-asset-store v0\n").unwrap();
        let store = BlobStore::open(&root).unwrap();
        assert!(store.get("k").unwrap().is_none());
        // Marker is back to the current layout tag.
        let marker = std::fs::read_to_string(root.join("STORE")).unwrap();
        assert_eq!(marker.trim(), format!("{STORE_NAME} v{STORE_VERSION}"));
    }

    #[test]
    fn keys_do_not_collide_on_path_unfriendly_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store")).unwrap();

        store.put("https://cdn.example/a?size=1", b"one").unwrap();
        store.put("https://cdn.example/a?size=2", b"two").unwrap();
        assert_eq!(store.get("https://cdn.example/a?size=1").unwrap().unwrap().1, b"one");
        assert_eq!(store.get("https://cdn.example/a?size=2").unwrap().unwrap().1, b"two");
    }
}
