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
use crate::url::DiscoverySource;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RenderModeUsed {
    Raw,
    Prerender,
    Full,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NavEndReason {
    Fetch,
    Load,
    Networkidle,
    Timeout,
    Error,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoindexSurface {
    Meta,
    Header,
    Both,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdnIndicators {
    pub detected: bool,
    pub provider: Option<String>,
    pub confidence: f32,
    pub signals: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingBreakdown {
    pub dns_ms: Option<u64>,
    pub connect_ms: Option<u64>,
    pub ttfb_ms: Option<u64>,
    pub download_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub lcp_ms: Option<f64>,
    pub cls: Option<f64>,
    pub inp_ms: Option<f64>,
    pub ttfb_ms: Option<f64>,
    pub fcp_ms: Option<f64>,
    pub tbt_ms: Option<f64>,
    pub tti_ms: Option<f64>,
    pub speed_index: Option<f64>,
    pub approximate_score: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkAggregation {
    pub request_count: u32,
    pub total_bytes: u64,
    pub compressed_bytes: u64,
    pub status_code_counts: IndexMap<u16, u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnhancedSeo {
    pub is_indexable: bool,
    pub heading_counts: IndexMap<String, u32>,
    pub hreflang_errors: Vec<String>,
    pub has_social_tags: bool,
    pub has_schema_org: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaRefs {
    pub screenshot_desktop_blob_ref: Option<String>,
    pub screenshot_mobile_blob_ref: Option<String>,
    pub favicon_blob_ref: Option<String>,
}

/// The canonical row describing one fetched URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    // Identity
    pub page_id: PageId,
    pub url: String,
    pub normalized_url: String,
    pub final_url: String,
    pub url_key: String,
    pub depth: u32,
    pub discovered_from: Option<PageId>,
    pub discovery_source: DiscoverySource,

    // Response
    pub http_status: u16,
    pub content_type: Option<String>,
    pub redirect_chain: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
    pub response_headers: IndexMap<String, String>,
    pub cdn_indicators: CdnIndicators,
    pub compression_details: Option<String>,

    // Render
    pub render_mode: RenderModeUsed,
    pub nav_end_reason: NavEndReason,
    pub render_ms: u64,
    pub fetch_ms: u64,
    pub wait_condition: Option<String>,
    pub timing: TimingBreakdown,

    // Content
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub h1: Option<String>,
    pub headings: Vec<String>,
    pub canonical_raw: Option<String>,
    pub canonical_resolved: Option<String>,
    pub robots_meta: Option<String>,
    pub robots_header: Option<String>,
    pub noindex_surface: NoindexSurface,
    pub text_sample: String,
    pub word_count: u32,
    pub language: Option<String>,
    pub raw_html_hash: String,
    pub dom_hash: Option<String>,
    pub content_hash: String,
    pub body_blob_ref: Option<String>,

    // Enhanced
    pub enhanced_seo: EnhancedSeo,
    pub open_graph: IndexMap<String, String>,
    pub twitter_card: IndexMap<String, String>,
    pub structured_data_types: Vec<String>,
    pub tech_stack: Vec<String>,
    pub security_headers: IndexMap<String, String>,
    pub performance: Option<PerformanceMetrics>,
    pub network: Option<NetworkAggregation>,
    pub media: MediaRefs,

    // Temporal
    pub previous_page_id: Option<PageId>,
    pub content_changed: Option<bool>,
    pub dom_changed: Option<bool>,
}
