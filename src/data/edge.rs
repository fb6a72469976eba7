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
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkLocation {
    Nav,
    Header,
    Footer,
    Aside,
    Main,
    Other,
    Unknown,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkType {
    Navigation,
    Content,
    Action,
    Footer,
    Breadcrumb,
    Pagination,
    Skip,
    Social,
    Download,
    External,
    Related,
    Tag,
    Author,
    Other,
}

/// A directed link between two pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source_page_id: PageId,
    pub target_page_id: Option<PageId>,
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: String,
    pub rel: Option<String>,
    pub nofollow: bool,
    pub sponsored: bool,
    pub ugc: bool,
    pub is_external: bool,
    pub location: LinkLocation,
    pub selector_hint: Option<String>,
    pub discovered_in_mode: String,
    pub http_status_at_to: Option<u16>,

    pub link_type: LinkType,
    pub target_attr: Option<String>,
    pub title_attr: Option<String>,
    pub download_attr: Option<String>,
    pub hreflang: Option<String>,
    pub type_attr: Option<String>,
    pub aria_label: Option<String>,
    pub role: Option<String>,
    pub is_primary_nav: bool,
    pub is_breadcrumb: bool,
    pub is_skip_link: bool,
    pub is_pagination: bool,
}
