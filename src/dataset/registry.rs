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

use crate::data::DatasetRecord;
use crate::dataset::writer::{DatasetMetadata, DatasetWriter, WriteOutcome, WriterError};
use crate::schema::SchemaRegistry;
use camino::Utf8Path;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Owns one [DatasetWriter] per dataset name. Every `write` for a given
/// dataset goes through that dataset's single writer, so record order within
/// a dataset reflects call order without
/// workers needing to coordinate among themselves.
pub struct WriterRegistry {
    writers: HashMap<&'static str, DatasetWriter>,
    schemas: SchemaRegistry,
}

impl WriterRegistry {
    pub fn new(staging_dir: &Utf8Path, schemas: SchemaRegistry, strict: bool) -> Self {
        let mut writers = HashMap::new();
        for (name, uri) in [
            ("pages", "schemas/pages.schema.json"),
            ("edges", "schemas/edges.schema.json"),
            ("assets", "schemas/assets.schema.json"),
            ("accessibility", "schemas/accessibility.schema.json"),
            ("console", "schemas/console.schema.json"),
            ("styles", "schemas/styles.schema.json"),
            ("dom_snapshots", "schemas/dom_snapshots.schema.json"),
            ("errors", "schemas/errors.schema.json"),
            ("provenance", "schemas/provenance.schema.json"),
        ] {
            writers.insert(name, DatasetWriter::new(name, 1, uri, staging_dir, strict));
        }
        Self { writers, schemas }
    }

    pub async fn write<T: DatasetRecord>(&self, record: &T) -> Result<WriteOutcome, WriterError> {
        let writer = self
            .writers
            .get(T::DATASET_NAME)
            .unwrap_or_else(|| panic!("no writer registered for dataset {}", T::DATASET_NAME));
        writer.write(record, &self.schemas).await
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Snapshots every dataset's current record count, for checkpointing.
    pub async fn record_counts(&self) -> IndexMap<String, u64> {
        let mut out = IndexMap::new();
        for (name, writer) in &self.writers {
            out.insert((*name).to_string(), writer.record_count().await);
        }
        out
    }

    /// Finalizes every dataset writer, returning metadata in a stable order
    /// suitable for direct inclusion in the manifest's dataset list.
    pub async fn finalize_all(self) -> Result<Vec<DatasetMetadata>, WriterError> {
        let mut out = Vec::with_capacity(self.writers.len());
        let mut ordered: Vec<(&'static str, DatasetWriter)> = self.writers.into_iter().collect();
        ordered.sort_by_key(|(name, _)| *name);
        for (_, writer) in ordered {
            out.push(writer.finalize().await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::{EdgeRecord, LinkLocation, LinkType};
    use crate::ids::PageId;
    use crate::schema::build_registry;

    #[tokio::test]
    async fn routes_records_to_the_correct_dataset() {
        let dir = camino_tempfile::tempdir().unwrap();
        let registry = WriterRegistry::new(dir.path(), build_registry().unwrap(), true);
        let edge = EdgeRecord {
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
        };
        registry.write(&edge).await.unwrap();
        let metas = registry.finalize_all().await.unwrap();
        let edges_meta = metas.iter().find(|m| m.name == "edges").unwrap();
        assert_eq!(edges_meta.record_count, 1);
    }

    #[tokio::test]
    async fn dom_snapshots_dataset_is_registered() {
        use crate::data::DomSnapshotRecord;
        use time::OffsetDateTime;

        let dir = camino_tempfile::tempdir().unwrap();
        let registry = WriterRegistry::new(dir.path(), build_registry().unwrap(), true);
        let snapshot = DomSnapshotRecord {
            page_id: PageId::new(),
            page_url: "https://example.com/".into(),
            dom_hash: "deadbeef".into(),
            blob_ref: None,
            captured_at: OffsetDateTime::UNIX_EPOCH,
        };
        registry.write(&snapshot).await.unwrap();
        let counts = registry.record_counts().await;
        assert_eq!(counts.get("dom_snapshots").copied(), Some(1));
    }
}
