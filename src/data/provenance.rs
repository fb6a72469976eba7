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

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub app: String,
    pub version: String,
    pub module: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceInput {
    pub dataset: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceOutput {
    pub record_count: u64,
    pub hash_sha256: String,
}

/// Provenance — ties a dataset to producer, inputs, parameters and output hash
/// Carried through into the manifest for archive-level provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub dataset_name: String,
    pub producer: Producer,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub inputs: Vec<ProvenanceInput>,
    pub parameters: serde_json::Value,
    pub output: ProvenanceOutput,
}
