// Copyright 2024 The Atlas Crawler Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blob Store: content-addressed, Zstd-compressed, deduplicated
//! byte storage rooted at `<staging>/blobs/sha256/<aa>/<bb>/<full>.zst`.

use crate::ids::{blob_path_components, sha256_hex};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("io error writing blob: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob {0} failed integrity verification on load")]
    IntegrityCheckFailed(String),
    #[error("blob {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub hash: String,
    pub blob_ref: String,
    pub deduplicated: bool,
}

#[derive(Debug, Default)]
pub struct BlobStoreStats {
    pub total_blobs: u64,
    pub total_compressed_bytes: u64,
    pub dedup_hits: u64,
}

impl BlobStoreStats {
    pub fn deduplication_rate(&self) -> f64 {
        let total_writes = self.total_blobs + self.dedup_hits;
        if total_writes == 0 {
            0.0
        } else {
            self.dedup_hits as f64 / total_writes as f64
        }
    }
}

/// One content-addressed object store per staging directory. Per-hash writes
/// are serialized through a striped set of mutexes so a concurrent writer for
/// the *same* hash becomes a no-op rather than a corrupt partial write
/// (concurrent writers for distinct hashes are
/// serialized per-hash").
pub struct BlobStore {
    root: Utf8PathBuf,
    write_locks: Vec<Mutex<()>>,
    blobs_written: AtomicU64,
    compressed_bytes: AtomicU64,
    dedup_hits: AtomicU64,
}

const LOCK_STRIPES: usize = 64;

impl BlobStore {
    pub fn new(staging_dir: &Utf8Path) -> Self {
        let root = staging_dir.join("blobs").join("sha256");
        let mut write_locks = Vec::with_capacity(LOCK_STRIPES);
        for _ in 0..LOCK_STRIPES {
            write_locks.push(Mutex::new(()));
        }
        Self {
            root,
            write_locks,
            blobs_written: AtomicU64::new(0),
            compressed_bytes: AtomicU64::new(0),
            dedup_hits: AtomicU64::new(0),
        }
    }

    fn stripe_for(&self, hash: &str) -> &Mutex<()> {
        let idx = hash.as_bytes()[0] as usize % self.write_locks.len();
        &self.write_locks[idx]
    }

    fn path_for_hash(&self, hash: &str) -> Utf8PathBuf {
        let (aa, bb, full) = blob_path_components(hash);
        self.root.join(aa).join(bb).join(format!("{full}.zst"))
    }

    /// `blob_ref` is the path relative to the staging directory:
    /// `sha256/<aa>/<bb>/<full>.zst`.
    fn blob_ref_for_hash(hash: &str) -> String {
        let (aa, bb, full) = blob_path_components(hash);
        format!("sha256/{aa}/{bb}/{full}.zst")
    }

    pub async fn store(&self, bytes: Vec<u8>) -> Result<StoreOutcome, BlobStoreError> {
        let hash = sha256_hex(&bytes);
        let path = self.path_for_hash(&hash);
        let _guard = self.stripe_for(&hash).lock().await;

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            self.dedup_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(StoreOutcome {
                hash: hash.clone(),
                blob_ref: Self::blob_ref_for_hash(&hash),
                deduplicated: true,
            });
        }

        let root = self.root.clone();
        let target = path.clone();
        let compressed_len = task::spawn_blocking(move || -> Result<usize, BlobStoreError> {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let compressed = zstd::encode_all(bytes.as_slice(), 0)?;
            let mut tmp = tempfile::NamedTempFile::new_in(root.as_std_path())?;
            tmp.write_all(&compressed)?;
            tmp.flush()?;
            // Atomic: write to a temporary neighbor file, then rename into place.
            // A concurrent writer producing the same hash loses the race
            // harmlessly because content is byte-identical (dedup invariant).
            tmp.persist(&target)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            Ok(compressed.len())
        })
        .await
        .expect("blocking blob write task panicked")?;

        self.blobs_written.fetch_add(1, Ordering::Relaxed);
        self.compressed_bytes
            .fetch_add(compressed_len as u64, Ordering::Relaxed);

        Ok(StoreOutcome {
            hash: hash.clone(),
            blob_ref: Self::blob_ref_for_hash(&hash),
            deduplicated: false,
        })
    }

    pub async fn load(&self, blob_ref: &str) -> Result<Vec<u8>, BlobStoreError> {
        let hex_hash = blob_ref
            .rsplit('/')
            .next()
            .and_then(|f| f.strip_suffix(".zst"))
            .ok_or_else(|| BlobStoreError::NotFound(blob_ref.to_string()))?
            .to_string();
        let path = self.root.join(
            blob_ref
                .strip_prefix("sha256/")
                .unwrap_or(blob_ref),
        );
        let compressed = tokio::fs::read(&path)
            .await
            .map_err(|_| BlobStoreError::NotFound(blob_ref.to_string()))?;
        let bytes = task::spawn_blocking(move || zstd::decode_all(compressed.as_slice()))
            .await
            .expect("blocking decode task panicked")?;
        let actual_hash = sha256_hex(&bytes);
        if actual_hash != hex_hash {
            return Err(BlobStoreError::IntegrityCheckFailed(blob_ref.to_string()));
        }
        Ok(bytes)
    }

    pub fn stats(&self) -> BlobStoreStats {
        BlobStoreStats {
            total_blobs: self.blobs_written.load(Ordering::Relaxed),
            total_compressed_bytes: self.compressed_bytes.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let outcome = store.store(b"hello atlas".to_vec()).await.unwrap();
        assert!(!outcome.deduplicated);
        let loaded = store.load(&outcome.blob_ref).await.unwrap();
        assert_eq!(loaded, b"hello atlas");
    }

    #[tokio::test]
    async fn storing_same_bytes_twice_deduplicates() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let first = store.store(b"same content".to_vec()).await.unwrap();
        let second = store.store(b"same content".to_vec()).await.unwrap();
        assert_eq!(first.blob_ref, second.blob_ref);
        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(store.stats().total_blobs, 1);
        assert_eq!(store.stats().dedup_hits, 1);
    }

    #[tokio::test]
    async fn blob_ref_is_sharded_by_first_two_bytes() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let outcome = store.store(b"shard me".to_vec()).await.unwrap();
        assert!(outcome.blob_ref.starts_with("sha256/"));
        let full_path = dir.path().join("blobs").join(&outcome.blob_ref);
        assert!(full_path.exists());
    }
}
