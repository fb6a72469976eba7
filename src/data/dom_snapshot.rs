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

use crate::ids::PageId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Full mode only — the serialized post-render DOM, stored as a blob
/// separate from the raw response body so replay can reconstruct the
/// rendered tree without re-running the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshotRecord {
    pub page_id: PageId,
    pub page_url: String,
    pub dom_hash: String,
    pub blob_ref: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}
