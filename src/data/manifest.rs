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

use crate::data::capabilities::Capability;
use crate::data::provenance::Producer;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub device: String,
    pub viewport: String,
    pub locale: String,
    pub timezone: String,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub cpu_throttling: Option<f32>,
    pub network_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCoverage {
    pub expected: bool,
    pub present: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartDescriptor {
    pub path: String,
    pub record_count: u64,
    pub bytes: u64,
    pub hash_sha256: String,
    pub schema_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifestEntry {
    pub record_count: u64,
    pub hash_sha256: String,
    pub schema_uri: String,
    pub parts: Vec<PartDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaRegistryEntry {
    pub uri: String,
    pub hash_sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyPolicy {
    pub strip_cookies: bool,
    pub strip_auth_headers: bool,
    pub redact_input_values: bool,
    pub redact_forms: bool,
}

/// Manifest — the archive's self-description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub spec_version: String,
    pub crawl_id: String,
    pub producer: Producer,
    pub environment: EnvironmentSnapshot,
    pub coverage_matrix: IndexMap<String, DatasetCoverage>,
    pub parts: IndexMap<String, DatasetManifestEntry>,
    pub schemas: IndexMap<String, SchemaRegistryEntry>,
    pub capabilities: BTreeSet<Capability>,
    pub privacy: PrivacyPolicy,
    pub warnings: Vec<String>,
    pub completion_reason: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
