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

use crate::ids::{AssetId, PageId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssetType {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum LazyStrategy {
    Native,
    IntersectionObserver,
    DataSrc,
    #[default]
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrcsetCandidate {
    pub url: String,
    pub descriptor: String,
    pub width: Option<u32>,
    pub density: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PictureContext {
    pub has_picture_parent: bool,
    pub source_count: u32,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackInfo {
    pub kind: String,
    pub src: String,
    pub srclang: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub src: String,
    pub r#type: Option<String>,
}

/// A non-document resource referenced by a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub page_id: PageId,
    pub asset_id: AssetId,
    pub page_url: String,
    pub asset_url: String,
    pub r#type: AssetType,
    pub alt: Option<String>,
    pub has_alt: bool,
    pub visible: bool,
    pub in_viewport: bool,
    pub was_lazy_loaded: bool,

    // Responsive image fields
    pub srcset: Option<String>,
    pub srcset_candidates: Vec<SrcsetCandidate>,
    pub sizes: Option<String>,
    pub picture_context: PictureContext,

    // Video/audio fields
    pub duration: Option<f64>,
    pub mime_type: Option<String>,
    pub has_controls: bool,
    pub autoplay: bool,
    pub r#loop: bool,
    pub muted: bool,
    pub preload: Option<String>,
    pub poster: Option<String>,
    pub tracks: Vec<TrackInfo>,
    pub sources: Vec<SourceInfo>,

    // Lazy-loading
    pub lazy_strategy: LazyStrategy,
    pub lazy_data_attrs: Vec<String>,
    pub lazy_classes: Vec<String>,
}
