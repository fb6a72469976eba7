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
use crate::url::normalize::{normalize, NormalizeError, NormalizedUrl, ParamPolicy};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where a URL was discovered from, propagated into Page.discovery_source.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DiscoverySource {
    Seed,
    Sitemap,
    Page,
    Js,
}

/// A URL paired with the depth it was discovered at and its normalized form;
/// the unit the Frontier admits, dequeues and checkpoints.
#[derive(Debug, Clone)]
pub struct UrlWithDepth {
    pub raw: String,
    pub normalized: NormalizedUrl,
    pub depth: u32,
    pub discovered_from: Option<PageId>,
    pub discovery_source: DiscoverySource,
}

impl UrlWithDepth {
    pub fn new(
        raw: impl Into<String>,
        policy: ParamPolicy,
        depth: u32,
        discovered_from: Option<PageId>,
        discovery_source: DiscoverySource,
    ) -> Result<Self, NormalizeError> {
        let raw = raw.into();
        let normalized = normalize(&raw, policy)?;
        Ok(Self {
            raw,
            normalized,
            depth,
            discovered_from,
            discovery_source,
        })
    }

    pub fn from_seed(raw: impl Into<String>, policy: ParamPolicy) -> Result<Self, NormalizeError> {
        Self::new(raw, policy, 0, None, DiscoverySource::Seed)
    }

    pub fn url_key(&self) -> &str {
        &self.normalized.url_key
    }
}
