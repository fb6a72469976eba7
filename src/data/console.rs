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

/// Console messages captured during a full-mode render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleRecord {
    pub page_id: PageId,
    pub level: String,
    pub text: String,
    pub source: Option<String>,
    pub location: Option<String>,
}
