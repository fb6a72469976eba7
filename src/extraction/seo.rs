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

//! Enhanced SEO signals, and small signature tables for CDN, tech-stack and
//! security-header detection — the same shape as a format-sniffing table,
//! just keyed on response headers and DOM fingerprints instead of magic bytes.

use crate::data::page::{CdnIndicators, EnhancedSeo, NoindexSurface};
use indexmap::IndexMap;
use scraper::{Html, Selector};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal is valid CSS")
}

pub fn enhanced_seo(
    document: &Html,
    noindex_surface: NoindexSurface,
    open_graph: &IndexMap<String, String>,
    twitter_card: &IndexMap<String, String>,
    structured_data_types: &[String],
) -> EnhancedSeo {
    let mut heading_counts = IndexMap::new();
    for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
        let count = document.select(&selector(tag)).count() as u32;
        if count > 0 {
            heading_counts.insert(tag.to_string(), count);
        }
    }

    let hreflang_errors = hreflang_errors(document);

    EnhancedSeo {
        is_indexable: noindex_surface == NoindexSurface::None,
        heading_counts,
        hreflang_errors,
        has_social_tags: !open_graph.is_empty() || !twitter_card.is_empty(),
        has_schema_org: !structured_data_types.is_empty(),
    }
}

fn hreflang_errors(document: &Html) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for el in document.select(&selector("link[rel=alternate][hreflang]")) {
        let Some(lang) = el.value().attr("hreflang") else { continue };
        if lang != "x-default" && whatlang::Lang::from_code(&lang.to_ascii_lowercase()[..lang.len().min(2)]).is_none() {
            errors.push(format!("unrecognized hreflang value: {lang}"));
        }
        if !seen.insert(lang.to_string()) {
            errors.push(format!("duplicate hreflang value: {lang}"));
        }
    }
    errors
}

const CDN_HEADER_SIGNATURES: &[(&str, &str)] = &[
    ("cf-ray", "cloudflare"),
    ("x-amz-cf-id", "cloudfront"),
    ("x-served-by", "fastly"),
    ("x-vercel-id", "vercel"),
    ("x-cache", "generic-cdn"),
];

const SECURITY_HEADER_NAMES: &[&str] = &[
    "content-security-policy",
    "strict-transport-security",
    "x-content-type-options",
    "x-frame-options",
    "referrer-policy",
    "permissions-policy",
];

const TECH_STACK_SIGNATURES: &[(&str, &str)] = &[
    ("x-powered-by", ""),
    ("server", ""),
];

/// Matches response headers against fixed signature tables
/// "Enhanced").
pub fn detect_cdn(headers: &IndexMap<String, String>) -> CdnIndicators {
    let mut signals = Vec::new();
    let mut provider = None;
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        if let Some((_, vendor)) = CDN_HEADER_SIGNATURES.iter().find(|(h, _)| *h == lower) {
            signals.push(format!("{name}: {value}"));
            provider.get_or_insert_with(|| vendor.to_string());
        }
    }
    let confidence = if signals.is_empty() { 0.0 } else { 0.7 };
    CdnIndicators {
        detected: !signals.is_empty(),
        provider,
        confidence,
        signals,
    }
}

pub fn security_headers(headers: &IndexMap<String, String>) -> IndexMap<String, String> {
    let mut found = IndexMap::new();
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        if SECURITY_HEADER_NAMES.contains(&lower.as_str()) {
            found.insert(lower, value.clone());
        }
    }
    found
}

pub fn tech_stack(headers: &IndexMap<String, String>, document: &Html) -> Vec<String> {
    let mut found = Vec::new();
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        if TECH_STACK_SIGNATURES.iter().any(|(h, _)| *h == lower) && !value.is_empty() {
            found.push(value.clone());
        }
    }
    if document.select(&selector(r#"meta[name="generator"]"#)).next().is_some() {
        if let Some(generator) = document
            .select(&selector(r#"meta[name="generator"]"#))
            .next()
            .and_then(|el| el.value().attr("content"))
        {
            found.push(generator.to_string());
        }
    }
    found.sort();
    found.dedup();
    found
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_cloudflare_from_header() {
        let mut headers = IndexMap::new();
        headers.insert("cf-ray".to_string(), "abc123".to_string());
        let cdn = detect_cdn(&headers);
        assert!(cdn.detected);
        assert_eq!(cdn.provider.as_deref(), Some("cloudflare"));
    }

    #[test]
    fn collects_known_security_headers_only() {
        let mut headers = IndexMap::new();
        headers.insert("Content-Security-Policy".to_string(), "default-src 'self'".to_string());
        headers.insert("X-Unrelated".to_string(), "value".to_string());
        let found = security_headers(&headers);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("content-security-policy"));
    }

    #[test]
    fn flags_duplicate_hreflang_entries() {
        let document = Html::parse_document(
            r#"<html><head>
                <link rel="alternate" hreflang="en" href="/en">
                <link rel="alternate" hreflang="en" href="/en-2">
            </head><body></body></html>"#,
        );
        let errors = hreflang_errors(&document);
        assert!(errors.iter().any(|e| e.contains("duplicate")));
    }
}
