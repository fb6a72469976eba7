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

//! Checkpointer: periodically, and on graceful shutdown,
//! serializes the frontier, counters and per-origin rate-governor state so a
//! crawl can resume from the last checkpoint rather than the beginning.

use crate::frontier::FrontierSnapshot;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error writing checkpoint to {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint at {path} could not be parsed: {source}")]
    Decode {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginRateState {
    pub tokens: f64,
    pub last_refill_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub frontier: FrontierSnapshot,
    pub pages_written: u64,
    pub errors_emitted: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub crawl_started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub checkpointed_at: OffsetDateTime,
    pub dataset_record_counts: IndexMap<String, u64>,
    pub origin_rate_state: IndexMap<String, OriginRateState>,
}

/// Owns the on-disk checkpoint file and the cadence at which it is rewritten
/// (the default of every `checkpoint_interval` admitted pages, plus an
/// unconditional write on graceful shutdown).
pub struct Checkpointer {
    path: Utf8PathBuf,
    interval: u64,
    pages_since_last: Mutex<u64>,
}

impl Checkpointer {
    pub fn new(staging_dir: &Utf8Path, interval: u64) -> Self {
        Self {
            path: staging_dir.join("checkpoint.json"),
            interval: interval.max(1),
            pages_since_last: Mutex::new(0),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Records one more page having been admitted; returns true if the
    /// checkpoint interval was reached and a write is due.
    pub async fn tick(&self) -> bool {
        let mut pages = self.pages_since_last.lock().await;
        *pages += 1;
        if *pages >= self.interval {
            *pages = 0;
            true
        } else {
            false
        }
    }

    /// Atomically writes `checkpoint` by writing to a temp file in the same
    /// directory and renaming over the previous checkpoint, so a crash never
    /// leaves a half-written file behind.
    pub fn write(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let parent = self.path.parent().unwrap_or_else(|| Utf8Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| self.io_err(e))?;
        let bytes = serde_json::to_vec_pretty(checkpoint).map_err(|e| CheckpointError::Decode {
            path: self.path.clone(),
            source: e,
        })?;
        file.write_all(&bytes).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(e))?;
        log::info!("checkpoint written: {} pages admitted", checkpoint.frontier.admitted_count);
        Ok(())
    }

    pub fn load(staging_dir: &Utf8Path) -> Result<Option<Checkpoint>, CheckpointError> {
        let path = staging_dir.join("checkpoint.json");
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|e| CheckpointError::Io { path: path.clone(), source: e })?;
        let checkpoint = serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Decode { path, source: e })?;
        Ok(Some(checkpoint))
    }

    fn io_err(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::frontier::Frontier;

    fn sample_checkpoint(frontier_snapshot: FrontierSnapshot) -> Checkpoint {
        Checkpoint {
            frontier: frontier_snapshot,
            pages_written: 3,
            errors_emitted: 0,
            crawl_started_at: OffsetDateTime::UNIX_EPOCH,
            checkpointed_at: OffsetDateTime::UNIX_EPOCH,
            dataset_record_counts: IndexMap::new(),
            origin_rate_state: IndexMap::new(),
        }
    }

    #[tokio::test]
    async fn writes_and_loads_a_checkpoint_round_trip() {
        let dir = camino_tempfile::tempdir().unwrap();
        let frontier = Frontier::new(&LimitsConfig::default());
        frontier
            .admit(&crate::url::UrlWithDepth::new(
                "https://example.com/",
                crate::url::ParamPolicy::Keep,
                0,
                None,
                crate::url::DiscoverySource::Seed,
            ).unwrap())
            .await;

        let checkpointer = Checkpointer::new(dir.path(), 500);
        checkpointer.write(&sample_checkpoint(frontier.snapshot().await)).unwrap();

        let loaded = Checkpointer::load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.frontier.admitted_count, 1);
        assert_eq!(loaded.pages_written, 3);
    }

    #[tokio::test]
    async fn tick_fires_exactly_at_interval() {
        let checkpointer = Checkpointer::new(Utf8Path::new("/tmp/does-not-matter"), 3);
        assert!(!checkpointer.tick().await);
        assert!(!checkpointer.tick().await);
        assert!(checkpointer.tick().await);
        assert!(!checkpointer.tick().await);
    }

    #[test]
    fn load_returns_none_when_absent() {
        let dir = camino_tempfile::tempdir().unwrap();
        assert!(Checkpointer::load(dir.path()).unwrap().is_none());
    }
}
