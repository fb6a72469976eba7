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

//! Extractors: a pure, side-effect-free pass over a fetched/rendered page.
//! Each sub-extractor is independent and non-failing by construction — a
//! malformed fragment degrades that extractor's output rather than the page.

pub mod accessibility;
pub mod assets;
pub mod links;
pub mod network;
pub mod page_facts;
pub mod performance;
pub mod seo;

pub use accessibility::AccessibilityFacts;
pub use assets::ExtractedAsset;
pub use links::ExtractedLink;
pub use page_facts::PageFacts;

use crate::data::page::{CdnIndicators, EnhancedSeo, NoindexSurface};
use indexmap::IndexMap;
use scraper::Html;

/// Everything a single DOM pass produces, plus the facts already known from
/// the response that feed into derived fields like `is_indexable`.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub facts: PageFacts,
    pub links: Vec<ExtractedLink>,
    pub assets: Vec<ExtractedAsset>,
    pub accessibility: AccessibilityFacts,
    pub enhanced_seo: EnhancedSeo,
    pub cdn_indicators: CdnIndicators,
    pub security_headers: IndexMap<String, String>,
    pub tech_stack: Vec<String>,
    pub noindex_surface: NoindexSurface,
}

/// Runs every DOM extractor once over `html`. Extractors never fail outright;
/// a parse that yields no elements simply yields empty collections.
pub fn extract_page(html: &str, page_url: &str, response_headers: &IndexMap<String, String>, robots_header: Option<&str>) -> PageExtraction {
    let document = Html::parse_document(html);
    let facts = page_facts::extract(&document);
    let noindex_surface = page_facts::noindex_surface(facts.robots_meta.as_deref(), robots_header);
    let links = links::extract(&document, page_url);
    let assets = assets::extract(&document, page_url);
    let accessibility = accessibility::extract(&document);
    let enhanced_seo = seo::enhanced_seo(
        &document,
        noindex_surface,
        &facts.open_graph,
        &facts.twitter_card,
        &facts.structured_data_types,
    );
    let cdn_indicators = seo::detect_cdn(response_headers);
    let security_headers = seo::security_headers(response_headers);
    let tech_stack = seo::tech_stack(response_headers, &document);

    PageExtraction {
        facts,
        links,
        assets,
        accessibility,
        enhanced_seo,
        cdn_indicators,
        security_headers,
        tech_stack,
        noindex_surface,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn runs_every_extractor_over_a_minimal_page() {
        let headers = IndexMap::new();
        let result = extract_page(
            "<html><head><title>Hi</title></head><body><a href=\"/x\">X</a><img src=\"a.png\"></body></html>",
            "https://example.com/",
            &headers,
            None,
        );
        assert_eq!(result.facts.title.as_deref(), Some("Hi"));
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.noindex_surface, NoindexSurface::None);
    }
}
