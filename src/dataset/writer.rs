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

use crate::ids::sha256_hex;
use crate::schema::{SchemaError, SchemaRegistry};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task;

const DEFAULT_PART_ROTATION_BYTES: u64 = 150 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("io error in dataset writer for {dataset}: {source}")]
    Io {
        dataset: String,
        #[source]
        source: std::io::Error,
    },
    #[error("record failed schema validation for {dataset}: {excerpt}")]
    Invalid { dataset: String, excerpt: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub accepted: bool,
    /// Set to the new part's index when this write triggered a rotation.
    pub rotated_part: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetMetadata {
    pub name: String,
    pub version: u32,
    pub record_count: u64,
    pub bytes_compressed: u64,
    pub hash_sha256: String,
    pub schema_uri: String,
}

struct OpenPart {
    index: u32,
    path: Utf8PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
}

/// One dataset's streaming JSONL writer. Records are
/// validated, serialized one-per-line, and appended to the current part;
/// parts rotate past `rotation_bytes` uncompressed.
pub struct DatasetWriter {
    name: String,
    version: u32,
    schema_uri: String,
    staging_dir: Utf8PathBuf,
    rotation_bytes: u64,
    strict: bool,
    state: Mutex<WriterState>,
}

struct WriterState {
    part: Option<OpenPart>,
    sealed_parts: Vec<Utf8PathBuf>,
    record_count: u64,
}

/// Counts newline-terminated records already present in any uncompressed
/// part left behind by a prior run, so a writer reattached after a resume
/// doesn't undercount `record_count` in its finalized metadata.
fn count_existing_records(staging_dir: &Utf8Path, name: &str, version: u32) -> u64 {
    let prefix = format!("{name}.v{version}_part_");
    let Ok(entries) = std::fs::read_dir(staging_dir) else {
        return 0;
    };
    let mut total = 0u64;
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(&prefix) && file_name.ends_with(".jsonl") {
            if let Ok(bytes) = std::fs::read(entry.path()) {
                total += bytes.iter().filter(|&&b| b == b'\n').count() as u64;
            }
        }
    }
    total
}

impl DatasetWriter {
    pub fn new(
        name: &str,
        version: u32,
        schema_uri: &str,
        staging_dir: &Utf8Path,
        strict: bool,
    ) -> Self {
        let record_count = count_existing_records(staging_dir, name, version);
        Self {
            name: name.to_string(),
            version,
            schema_uri: schema_uri.to_string(),
            staging_dir: staging_dir.to_path_buf(),
            rotation_bytes: DEFAULT_PART_ROTATION_BYTES,
            strict,
            state: Mutex::new(WriterState {
                part: None,
                sealed_parts: Vec::new(),
                record_count,
            }),
        }
    }

    /// Current record count, including any pre-existing records counted at
    /// construction time. Used to populate checkpoint dataset record counts.
    pub async fn record_count(&self) -> u64 {
        self.state.lock().await.record_count
    }

    #[cfg(test)]
    pub fn with_rotation_bytes(mut self, bytes: u64) -> Self {
        self.rotation_bytes = bytes;
        self
    }

    fn part_path(&self, index: u32) -> Utf8PathBuf {
        self.staging_dir.join(format!(
            "{}.v{}_part_{:03}.jsonl",
            self.name, self.version, index
        ))
    }

    fn open_part(&self, index: u32) -> Result<OpenPart, WriterError> {
        let path = self.part_path(index);
        std::fs::create_dir_all(&self.staging_dir).map_err(|e| self.io_err(e))?;
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| self.io_err(e))?;
        let bytes_written = file.metadata().map_err(|e| self.io_err(e))?.len();
        Ok(OpenPart {
            index,
            path,
            writer: BufWriter::new(file),
            bytes_written,
        })
    }

    fn io_err(&self, source: std::io::Error) -> WriterError {
        WriterError::Io {
            dataset: self.name.clone(),
            source,
        }
    }

    /// Validates `record` against `schema_registry` and appends it to the
    /// current part, rotating first if the part has grown past the soft
    /// threshold. Under non-strict mode a schema failure is logged as a
    /// warning but the record is written anyway and `accepted=true` is
    /// returned; under strict mode it aborts the write with an error.
    pub async fn write<T: Serialize>(
        &self,
        record: &T,
        schema_registry: &SchemaRegistry,
    ) -> Result<WriteOutcome, WriterError> {
        let value: Value = serde_json::to_value(record).map_err(|e| self.io_err(e.into()))?;
        if let Err(e) = schema_registry.validate(&self.name, &value) {
            if self.strict {
                return Err(WriterError::Invalid {
                    dataset: self.name.clone(),
                    excerpt: e.to_string(),
                });
            }
            log::warn!("dataset {} accepted invalid record: {e}", self.name);
        }

        let mut line = serde_json::to_vec(&value).map_err(|e| self.io_err(e.into()))?;
        line.push(b'\n');

        let mut state = self.state.lock().await;
        if state.part.is_none() {
            let part = self.open_part(0)?;
            state.part = Some(part);
        }
        let mut rotated_part = None;
        if state.part.as_ref().unwrap().bytes_written >= self.rotation_bytes {
            let sealed = state.part.take().unwrap();
            state.sealed_parts.push(sealed.path);
            let next_index = sealed.index + 1;
            state.part = Some(self.open_part(next_index)?);
            rotated_part = Some(next_index);
        }

        let part = state.part.as_mut().unwrap();
        part.writer.write_all(&line).map_err(|e| self.io_err(e))?;
        part.bytes_written += line.len() as u64;
        state.record_count += 1;

        Ok(WriteOutcome { accepted: true, rotated_part })
    }

    /// Seals the stream, Zstd-compresses every part, deletes the
    /// uncompressed source, and returns the combined dataset metadata
    /// Called once when the writer is finalized.
    pub async fn finalize(self) -> Result<DatasetMetadata, WriterError> {
        let mut state = self.state.into_inner();
        if let Some(mut part) = state.part.take() {
            part.writer.flush().map_err(|e| self.io_err(e))?;
            state.sealed_parts.push(part.path);
        }

        let name = self.name.clone();
        let parts = state.sealed_parts.clone();
        let bytes_compressed = task::spawn_blocking({
            let name = name.clone();
            move || -> Result<u64, std::io::Error> {
                let mut total = 0u64;
                for part_path in &parts {
                    let raw = std::fs::read(part_path)?;
                    let compressed = zstd::encode_all(raw.as_slice(), 0)?;
                    let zst_path = part_path.with_extension("jsonl.zst");
                    std::fs::write(&zst_path, &compressed)?;
                    std::fs::remove_file(part_path)?;
                    total += compressed.len() as u64;
                }
                log::debug!("dataset {name} sealed {} part(s)", parts.len());
                Ok(total)
            }
        })
        .await
        .expect("blocking dataset finalize task panicked")
        .map_err(|e| self.io_err(e))?;

        let per_part_hashes: Vec<String> = state
            .sealed_parts
            .iter()
            .map(|p| {
                let zst_path = p.with_extension("jsonl.zst");
                let bytes = std::fs::read(&zst_path).unwrap_or_default();
                sha256_hex(&bytes)
            })
            .collect();
        let combined = per_part_hashes.join("");
        let hash_sha256 = sha256_hex(combined.as_bytes());

        Ok(DatasetMetadata {
            name,
            version: self.version,
            record_count: state.record_count,
            bytes_compressed,
            hash_sha256,
            schema_uri: self.schema_uri,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::{EdgeRecord, LinkLocation, LinkType};
    use crate::ids::PageId;
    use crate::schema::build_registry;

    fn sample_edge() -> EdgeRecord {
        EdgeRecord {
            source_page_id: PageId::new(),
            target_page_id: None,
            source_url: "https://example.com/".into(),
            target_url: "https://example.com/a".into(),
            anchor_text: "a".into(),
            rel: None,
            nofollow: false,
            sponsored: false,
            ugc: false,
            is_external: false,
            location: LinkLocation::Main,
            selector_hint: None,
            discovered_in_mode: "full".into(),
            http_status_at_to: None,
            link_type: LinkType::Content,
            target_attr: None,
            title_attr: None,
            download_attr: None,
            hreflang: None,
            type_attr: None,
            aria_label: None,
            role: None,
            is_primary_nav: false,
            is_breadcrumb: false,
            is_skip_link: false,
            is_pagination: false,
        }
    }

    #[tokio::test]
    async fn writes_and_finalizes_a_dataset() {
        let dir = camino_tempfile::tempdir().unwrap();
        let registry = build_registry().unwrap();
        let writer = DatasetWriter::new("edges", 1, "schemas/edges.schema.json", dir.path(), true);

        for _ in 0..5 {
            let outcome = writer.write(&sample_edge(), &registry).await.unwrap();
            assert!(outcome.accepted);
        }

        let meta = writer.finalize().await.unwrap();
        assert_eq!(meta.record_count, 5);
        assert_eq!(meta.name, "edges");
        assert!(meta.bytes_compressed > 0);
    }

    #[tokio::test]
    async fn rotates_parts_past_threshold() {
        let dir = camino_tempfile::tempdir().unwrap();
        let registry = build_registry().unwrap();
        let writer = DatasetWriter::new("edges", 1, "schemas/edges.schema.json", dir.path(), true)
            .with_rotation_bytes(64);

        for _ in 0..20 {
            writer.write(&sample_edge(), &registry).await.unwrap();
        }
        let meta = writer.finalize().await.unwrap();
        assert_eq!(meta.record_count, 20);

        let mut zst_count = 0;
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let entry = entry.unwrap();
            if entry.file_name().to_string_lossy().ends_with(".jsonl.zst") {
                zst_count += 1;
            }
        }
        assert!(zst_count > 1, "expected multiple rotated parts, got {zst_count}");
    }

    #[tokio::test]
    async fn non_strict_mode_accepts_invalid_with_warning() {
        let dir = camino_tempfile::tempdir().unwrap();
        let registry = build_registry().unwrap();
        let writer = DatasetWriter::new("edges", 1, "schemas/edges.schema.json", dir.path(), false);
        let outcome = writer
            .write(&serde_json::json!({"not": "a valid edge"}), &registry)
            .await
            .unwrap();
        assert!(outcome.accepted);
        let meta = writer.finalize().await.unwrap();
        assert_eq!(meta.record_count, 1);
    }

    #[tokio::test]
    async fn strict_mode_rejects_invalid_record() {
        let dir = camino_tempfile::tempdir().unwrap();
        let registry = build_registry().unwrap();
        let writer = DatasetWriter::new("edges", 1, "schemas/edges.schema.json", dir.path(), true);
        let err = writer
            .write(&serde_json::json!({"not": "a valid edge"}), &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, WriterError::Invalid { .. }));
    }
}
