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

//! The data model shared across every dataset.

pub mod accessibility;
pub mod asset;
pub mod capabilities;
pub mod console;
pub mod dom_snapshot;
pub mod edge;
pub mod error_record;
pub mod manifest;
pub mod page;
pub mod provenance;
pub mod robots_event;
pub mod styles;

pub use accessibility::AccessibilityRecord;
pub use asset::AssetRecord;
pub use capabilities::{CapabilitiesDocument, Capability};
pub use console::ConsoleRecord;
pub use dom_snapshot::DomSnapshotRecord;
pub use edge::EdgeRecord;
pub use error_record::{ErrorCode, ErrorPhase, ErrorRecord};
pub use manifest::Manifest;
pub use page::PageRecord;
pub use provenance::ProvenanceRecord;
pub use robots_event::{RobotsDecision, RobotsDecisionEvent};
pub use styles::StyleSampleRecord;

/// Every record that exposes a dataset name the way the Dataset Writer /
/// Schema Validator address it.
pub trait DatasetRecord: serde::Serialize {
    const DATASET_NAME: &'static str;
}

impl DatasetRecord for PageRecord {
    const DATASET_NAME: &'static str = "pages";
}
impl DatasetRecord for EdgeRecord {
    const DATASET_NAME: &'static str = "edges";
}
impl DatasetRecord for AssetRecord {
    const DATASET_NAME: &'static str = "assets";
}
impl DatasetRecord for AccessibilityRecord {
    const DATASET_NAME: &'static str = "accessibility";
}
impl DatasetRecord for ConsoleRecord {
    const DATASET_NAME: &'static str = "console";
}
impl DatasetRecord for StyleSampleRecord {
    const DATASET_NAME: &'static str = "styles";
}
impl DatasetRecord for DomSnapshotRecord {
    const DATASET_NAME: &'static str = "dom_snapshots";
}
impl DatasetRecord for ErrorRecord {
    const DATASET_NAME: &'static str = "errors";
}
impl DatasetRecord for ProvenanceRecord {
    const DATASET_NAME: &'static str = "provenance";
}
