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
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Styles (full mode only) — computed-style samples for text nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleSampleRecord {
    pub page_id: PageId,
    pub selector_hint: String,
    pub computed_styles: IndexMap<String, String>,
}
