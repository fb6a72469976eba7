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

//! Archive Finalizer: walks the staging directory, builds
//! the manifest, and zips everything into the final `.atls` container. The
//! zip itself adds no compression on top of the already Zstd-compressed
//! dataset parts; only the small JSON side files get deflated.

use crate::data::manifest::{Manifest, PartDescriptor};
use crate::data::provenance::ProvenanceRecord;
use crate::dataset::writer::DatasetMetadata;
use crate::ids::sha256_hex;
use crate::manifest::ManifestBuilder;
use crate::schema::SchemaRegistry;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{Read, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error finalizing archive at {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("zip error finalizing archive at {path}: {source}")]
    Zip {
        path: Utf8PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Scans `staging_dir` for every `<dataset>.v<version>_part_NNN.jsonl.zst`
/// belonging to `meta.name` and builds one [PartDescriptor] per file, sorted
/// by part index.
fn collect_parts(staging_dir: &Utf8Path, meta: &DatasetMetadata) -> Result<Vec<PartDescriptor>, ArchiveError> {
    let prefix = format!("{}.v{}_part_", meta.name, meta.version);
    let mut parts = Vec::new();
    let entries = std::fs::read_dir(staging_dir).map_err(|e| io_err(staging_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(staging_dir, e))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !file_name.starts_with(&prefix) || !file_name.ends_with(".jsonl.zst") {
            continue;
        }
        let path = staging_dir.join(file_name.as_ref());
        let bytes = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        let record_count = count_jsonl_records(&bytes).map_err(|e| io_err(&path, e))?;
        parts.push(PartDescriptor {
            path: file_name.to_string(),
            record_count,
            bytes: bytes.len() as u64,
            hash_sha256: sha256_hex(&bytes),
            schema_uri: meta.schema_uri.clone(),
        });
    }
    parts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(parts)
}

fn count_jsonl_records(zst_bytes: &[u8]) -> std::io::Result<u64> {
    let raw = zstd::decode_all(zst_bytes)?;
    Ok(raw.iter().filter(|&&b| b == b'\n').count() as u64)
}

fn io_err(path: &Utf8Path, source: std::io::Error) -> ArchiveError {
    ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Builds the manifest, writes `manifest.json`/`capabilities.v1.json`/
/// `provenance.jsonl` into `staging_dir`, and zips the whole staging tree
/// into `output_path`.
pub struct ArchiveFinalizer<'a> {
    staging_dir: &'a Utf8Path,
    output_path: &'a Utf8Path,
}

impl<'a> ArchiveFinalizer<'a> {
    pub fn new(staging_dir: &'a Utf8Path, output_path: &'a Utf8Path) -> Self {
        Self { staging_dir, output_path }
    }

    /// Runs the full finalize sequence and returns the completed manifest
    /// (the caller typically emits a one-line JSON summary from it).
    pub fn finalize(
        &self,
        dataset_metas: Vec<DatasetMetadata>,
        schemas: &SchemaRegistry,
        builder: &ManifestBuilder,
        completion_reason: &str,
    ) -> Result<Manifest, ArchiveError> {
        let mut parts_by_dataset = IndexMap::new();
        for meta in &dataset_metas {
            parts_by_dataset.insert(meta.name.clone(), collect_parts(self.staging_dir, meta)?);
        }

        let manifest = builder.build(&dataset_metas, &parts_by_dataset, schemas, completion_reason);
        let capabilities = ManifestBuilder::capabilities_document(&manifest);
        let provenance = builder.provenance_records(&manifest);

        self.write_json(&self.staging_dir.join("manifest.json"), &manifest)?;
        self.write_json(&self.staging_dir.join("capabilities.v1.json"), &capabilities)?;
        self.write_provenance(&provenance)?;
        self.zip_staging_dir()?;

        log::info!(
            "archive finalized: {} ({} bytes)",
            self.output_path,
            std::fs::metadata(self.output_path).map(|m| m.len()).unwrap_or(0)
        );
        Ok(manifest)
    }

    fn write_json<T: serde::Serialize>(&self, path: &Utf8Path, value: &T) -> Result<(), ArchiveError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        std::fs::write(path, bytes).map_err(|e| io_err(path, e))
    }

    fn write_provenance(&self, records: &[ProvenanceRecord]) -> Result<(), ArchiveError> {
        let path = self.staging_dir.join("provenance.v1_part_000.jsonl");
        let mut file = File::create(&path).map_err(|e| io_err(&path, e))?;
        for record in records {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            file.write_all(&line).map_err(|e| io_err(&path, e))?;
        }
        Ok(())
    }

    fn zip_staging_dir(&self) -> Result<(), ArchiveError> {
        let tmp_path = self.output_path.with_extension("atls.tmp");
        let file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
        let mut zip = ZipWriter::new(file);

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut entries: Vec<Utf8PathBuf> = std::fs::read_dir(self.staging_dir)
            .map_err(|e| io_err(self.staging_dir, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| self.staging_dir.join(entry.file_name().to_string_lossy().as_ref()))
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        for path in entries {
            let name = path.file_name().unwrap_or_default();
            let already_compressed = name.ends_with(".jsonl.zst");
            let options = if already_compressed { stored } else { deflated };
            zip.start_file(name, options).map_err(|e| zip_err(self.output_path, e))?;
            let mut contents = Vec::new();
            File::open(&path)
                .map_err(|e| io_err(&path, e))?
                .read_to_end(&mut contents)
                .map_err(|e| io_err(&path, e))?;
            zip.write_all(&contents).map_err(|e| io_err(&path, e))?;
        }
        zip.finish().map_err(|e| zip_err(self.output_path, e))?;
        std::fs::rename(&tmp_path, self.output_path).map_err(|e| io_err(self.output_path, e))?;
        Ok(())
    }
}

fn zip_err(path: &Utf8Path, source: zip::result::ZipError) -> ArchiveError {
    ArchiveError::Zip {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CrawlConfig;
    use crate::schema::build_registry;
    use time::OffsetDateTime;
    use zip::ZipArchive;

    fn sample_meta() -> DatasetMetadata {
        DatasetMetadata {
            name: "pages".to_string(),
            version: 1,
            record_count: 2,
            bytes_compressed: 0,
            hash_sha256: "deadbeef".to_string(),
            schema_uri: "schemas/pages.schema.json".to_string(),
        }
    }

    #[test]
    fn finalize_produces_a_readable_zip_with_manifest_entries() {
        let dir = camino_tempfile::tempdir().unwrap();
        let part_raw = b"{\"a\":1}\n{\"a\":2}\n";
        let compressed = zstd::encode_all(&part_raw[..], 0).unwrap();
        std::fs::write(dir.path().join("pages.v1_part_000.jsonl.zst"), &compressed).unwrap();

        let output_path = dir.path().join("crawl.atls");
        let finalizer = ArchiveFinalizer::new(dir.path(), &output_path);
        let builder = ManifestBuilder::new(
            "crawl-1".to_string(),
            CrawlConfig::default(),
            OffsetDateTime::UNIX_EPOCH,
        );
        let registry = build_registry().unwrap();

        let manifest = finalizer
            .finalize(vec![sample_meta()], &registry, &builder, "finished")
            .unwrap();
        assert_eq!(manifest.parts["pages"].parts.len(), 1);
        assert_eq!(manifest.parts["pages"].parts[0].record_count, 2);

        let zip_file = File::open(&output_path).unwrap();
        let mut archive = ZipArchive::new(zip_file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"manifest.json".to_string()));
        assert!(names.contains(&"capabilities.v1.json".to_string()));
        assert!(names.contains(&"pages.v1_part_000.jsonl.zst".to_string()));
    }
}
