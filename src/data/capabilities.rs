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
use std::collections::BTreeSet;
use strum::{Display, EnumString};

/// The closed capability vocabulary.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    SeoCore,
    SeoEnhanced,
    RenderDom,
    RenderNetlog,
    A11yCore,
    ReplayHtml,
    ReplayCss,
    ReplayJs,
    ReplayFonts,
    ReplayImages,
}

impl Capability {
    /// The datasets this capability implies must be present with >=1 row
    /// Capabilities are additive only and never removed once recorded.
    pub fn implied_datasets(self) -> &'static [&'static str] {
        match self {
            Capability::SeoCore | Capability::SeoEnhanced => &["pages"],
            Capability::RenderDom => &["dom_snapshots"],
            Capability::RenderNetlog => &["pages"],
            Capability::A11yCore => &["accessibility"],
            Capability::ReplayHtml
            | Capability::ReplayCss
            | Capability::ReplayJs
            | Capability::ReplayFonts
            | Capability::ReplayImages => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compatibility {
    pub min_sdk_version: String,
}

/// The set of capabilities a crawl exercised, recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesDocument {
    pub version: u32,
    pub capabilities: BTreeSet<Capability>,
    pub compatibility: Compatibility,
}
