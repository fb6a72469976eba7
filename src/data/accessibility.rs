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
use strum::{Display, EnumString};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuditProfile {
    Basic,
    Essential,
    Full,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEngine {
    pub name: String,
    pub version: String,
}

/// One record per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessibilityRecord {
    pub page_url: String,
    pub lang: Option<String>,
    pub heading_order: Vec<String>,
    pub landmarks: Vec<String>,
    pub roles: Vec<String>,
    pub missing_alt_count: u32,
    pub missing_alt_sources: Vec<String>,
    pub form_controls: Option<Vec<String>>,
    pub focus_order: Option<Vec<String>>,

    pub audit_engine: AuditEngine,
    pub wcag_version: String,
    pub audit_profile: AuditProfile,
    #[serde(with = "time::serde::rfc3339")]
    pub audited_at: OffsetDateTime,
}
