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

//! Manifest/Provenance Builder: assembles the archive's
//! self-description from finalized dataset metadata plus the configuration
//! that produced it — coverage matrix, implied capabilities, and one
//! [ProvenanceRecord] per dataset.

use crate::config::{CrawlConfig, ProfilePreset, RenderMode};
use crate::data::capabilities::{Capability, Compatibility};
use crate::data::manifest::{
    DatasetCoverage, DatasetManifestEntry, EnvironmentSnapshot, Manifest, PartDescriptor,
    PrivacyPolicy, SchemaRegistryEntry,
};
use crate::data::provenance::{Producer, ProvenanceInput, ProvenanceOutput, ProvenanceRecord};
use crate::data::CapabilitiesDocument;
use crate::dataset::writer::DatasetMetadata;
use crate::schema::SchemaRegistry;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use time::OffsetDateTime;

const SPEC_VERSION: &str = "1.0";
const ALL_DATASETS: &[&str] = &[
    "pages",
    "edges",
    "assets",
    "accessibility",
    "console",
    "styles",
    "dom_snapshots",
    "errors",
    "provenance",
];

/// Whether `dataset` is expected to have any rows at all given `config`, and
/// if not, the stable reason code to record in the coverage matrix.
fn expectation(dataset: &str, config: &CrawlConfig) -> (bool, Option<&'static str>) {
    match dataset {
        "accessibility" => {
            if config.render_mode == RenderMode::Raw {
                (false, Some("mode_excluded"))
            } else {
                (true, None)
            }
        }
        "console" | "styles" | "dom_snapshots" => {
            if config.render_mode != RenderMode::Full {
                (false, Some("mode_excluded"))
            } else {
                (true, None)
            }
        }
        _ => (true, None),
    }
}

fn capabilities_for(config: &CrawlConfig, coverage: &IndexMap<String, DatasetCoverage>) -> BTreeSet<Capability> {
    let mut caps = BTreeSet::new();
    let present = |name: &str| coverage.get(name).is_some_and(|c| c.present);

    if present("pages") {
        caps.insert(Capability::SeoCore);
        if config.profile == ProfilePreset::Full {
            caps.insert(Capability::SeoEnhanced);
        }
        if config.render_mode == RenderMode::Full {
            caps.insert(Capability::RenderNetlog);
        }
    }
    if present("dom_snapshots") {
        caps.insert(Capability::RenderDom);
    }
    if present("accessibility") {
        caps.insert(Capability::A11yCore);
    }
    match config.replay_tier {
        crate::config::ReplayTier::Html => {
            caps.insert(Capability::ReplayHtml);
        }
        crate::config::ReplayTier::HtmlCss => {
            caps.insert(Capability::ReplayHtml);
            caps.insert(Capability::ReplayCss);
        }
        crate::config::ReplayTier::Full => {
            caps.insert(Capability::ReplayHtml);
            caps.insert(Capability::ReplayCss);
            caps.insert(Capability::ReplayJs);
            caps.insert(Capability::ReplayFonts);
            caps.insert(Capability::ReplayImages);
        }
    }
    caps
}

pub struct ManifestBuilder {
    crawl_id: String,
    config: CrawlConfig,
    started_at: OffsetDateTime,
    warnings: Vec<String>,
}

impl ManifestBuilder {
    pub fn new(crawl_id: String, config: CrawlConfig, started_at: OffsetDateTime) -> Self {
        Self {
            crawl_id,
            config,
            started_at,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Builds the manifest from each dataset's finalized metadata. `parts`
    /// gives, per dataset, every sealed-part descriptor making up that
    /// dataset (a dataset may have rotated into more than one part).
    pub fn build(
        &self,
        dataset_metas: &[DatasetMetadata],
        parts: &IndexMap<String, Vec<PartDescriptor>>,
        schemas: &SchemaRegistry,
        completion_reason: &str,
    ) -> Manifest {
        let mut coverage_matrix = IndexMap::new();
        let meta_by_name: IndexMap<&str, &DatasetMetadata> =
            dataset_metas.iter().map(|m| (m.name.as_str(), m)).collect();

        for dataset in ALL_DATASETS {
            let (expected, mode_reason) = expectation(dataset, &self.config);
            let present = meta_by_name.get(dataset).is_some_and(|m| m.record_count > 0);
            let reason = if present {
                None
            } else if let Some(reason) = mode_reason {
                Some(reason.to_string())
            } else if expected {
                Some("no_matches".to_string())
            } else {
                None
            };
            coverage_matrix.insert(
                dataset.to_string(),
                DatasetCoverage { expected, present, reason },
            );
        }

        let mut dataset_parts = IndexMap::new();
        for meta in dataset_metas {
            dataset_parts.insert(
                meta.name.clone(),
                DatasetManifestEntry {
                    record_count: meta.record_count,
                    hash_sha256: meta.hash_sha256.clone(),
                    schema_uri: meta.schema_uri.clone(),
                    parts: parts.get(&meta.name).cloned().unwrap_or_default(),
                },
            );
        }

        let schema_entries: IndexMap<String, SchemaRegistryEntry> = dataset_metas
            .iter()
            .filter_map(|m| {
                schemas.schema_hash(&m.name).map(|hash| {
                    (
                        m.name.clone(),
                        SchemaRegistryEntry {
                            uri: m.schema_uri.clone(),
                            hash_sha256: hash.to_string(),
                        },
                    )
                })
            })
            .collect();

        Manifest {
            spec_version: SPEC_VERSION.to_string(),
            crawl_id: self.crawl_id.clone(),
            producer: Producer {
                app: "atlas-crawler".to_string(),
                version: option_env!("CARGO_PKG_VERSION").unwrap_or("0.0.0").to_string(),
                module: "scheduler".to_string(),
            },
            environment: EnvironmentSnapshot {
                device: "desktop".to_string(),
                viewport: "1366x900".to_string(),
                locale: "en-US".to_string(),
                timezone: "UTC".to_string(),
                browser_name: if self.config.render_mode == RenderMode::Raw {
                    None
                } else {
                    Some("chromium".to_string())
                },
                browser_version: None,
                cpu_throttling: None,
                network_profile: None,
            },
            capabilities: capabilities_for(&self.config, &coverage_matrix),
            coverage_matrix,
            parts: dataset_parts,
            schemas: schema_entries,
            privacy: PrivacyPolicy {
                strip_cookies: self.config.privacy.strip_cookies,
                strip_auth_headers: self.config.privacy.strip_auth_headers,
                redact_input_values: self.config.privacy.redact_input_values,
                redact_forms: self.config.privacy.redact_forms,
            },
            warnings: self.warnings.clone(),
            completion_reason: completion_reason.to_string(),
            created_at: self.started_at,
        }
    }

    pub fn capabilities_document(manifest: &Manifest) -> CapabilitiesDocument {
        CapabilitiesDocument {
            version: 1,
            capabilities: manifest.capabilities.clone(),
            compatibility: Compatibility {
                min_sdk_version: SPEC_VERSION.to_string(),
            },
        }
    }

    pub fn provenance_records(&self, manifest: &Manifest) -> Vec<ProvenanceRecord> {
        manifest
            .parts
            .iter()
            .map(|(name, entry)| ProvenanceRecord {
                dataset_name: name.clone(),
                producer: manifest.producer.clone(),
                created_at: manifest.created_at,
                inputs: vec![ProvenanceInput {
                    dataset: "frontier".to_string(),
                    hash: self.crawl_id.clone(),
                }],
                parameters: serde_json::json!({
                    "render_mode": self.config.render_mode,
                    "replay_tier": self.config.replay_tier,
                    "profile": self.config.profile,
                }),
                output: ProvenanceOutput {
                    record_count: entry.record_count,
                    hash_sha256: entry.hash_sha256.clone(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::build_registry;

    fn sample_meta(name: &str, record_count: u64) -> DatasetMetadata {
        DatasetMetadata {
            name: name.to_string(),
            version: 1,
            record_count,
            bytes_compressed: 128,
            hash_sha256: "deadbeef".to_string(),
            schema_uri: format!("schemas/{name}.schema.json"),
        }
    }

    #[test]
    fn accessibility_absent_under_raw_mode_reports_mode_excluded() {
        let config = CrawlConfig {
            render_mode: RenderMode::Raw,
            ..Default::default()
        };
        let builder = ManifestBuilder::new("crawl-1".to_string(), config, OffsetDateTime::UNIX_EPOCH);
        let metas = vec![sample_meta("pages", 10)];
        let manifest = builder.build(&metas, &IndexMap::new(), &build_registry().unwrap(), "finished");
        let coverage = &manifest.coverage_matrix["accessibility"];
        assert!(!coverage.expected);
        assert_eq!(coverage.reason.as_deref(), Some("mode_excluded"));
    }

    #[test]
    fn expected_dataset_with_no_rows_reports_no_matches() {
        let config = CrawlConfig {
            render_mode: RenderMode::Full,
            ..Default::default()
        };
        let builder = ManifestBuilder::new("crawl-1".to_string(), config, OffsetDateTime::UNIX_EPOCH);
        let metas = vec![sample_meta("pages", 10), sample_meta("console", 0)];
        let manifest = builder.build(&metas, &IndexMap::new(), &build_registry().unwrap(), "finished");
        let coverage = &manifest.coverage_matrix["console"];
        assert!(coverage.expected);
        assert!(!coverage.present);
        assert_eq!(coverage.reason.as_deref(), Some("no_matches"));
    }

    #[test]
    fn full_profile_with_pages_implies_seo_enhanced() {
        let config = CrawlConfig {
            render_mode: RenderMode::Full,
            profile: ProfilePreset::Full,
            ..Default::default()
        };
        let builder = ManifestBuilder::new("crawl-1".to_string(), config, OffsetDateTime::UNIX_EPOCH);
        let metas = vec![sample_meta("pages", 10)];
        let manifest = builder.build(&metas, &IndexMap::new(), &build_registry().unwrap(), "finished");
        assert!(manifest.capabilities.contains(&Capability::SeoEnhanced));
        assert!(manifest.capabilities.contains(&Capability::RenderNetlog));
    }

    #[test]
    fn render_dom_capability_follows_dom_snapshots_presence() {
        let config = CrawlConfig {
            render_mode: RenderMode::Full,
            ..Default::default()
        };
        let builder = ManifestBuilder::new("crawl-1".to_string(), config, OffsetDateTime::UNIX_EPOCH);

        let metas = vec![sample_meta("pages", 10), sample_meta("dom_snapshots", 0)];
        let manifest = builder.build(&metas, &IndexMap::new(), &build_registry().unwrap(), "finished");
        assert!(!manifest.capabilities.contains(&Capability::RenderDom));

        let metas = vec![sample_meta("pages", 10), sample_meta("dom_snapshots", 3)];
        let manifest = builder.build(&metas, &IndexMap::new(), &build_registry().unwrap(), "finished");
        assert!(manifest.capabilities.contains(&Capability::RenderDom));
    }
}
