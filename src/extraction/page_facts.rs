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

//! On-page facts: title, meta description, headings, canonical, robots
//! directives, body text and word count, language, and social meta tags.

use crate::data::page::NoindexSurface;
use indexmap::IndexMap;
use scraper::{Html, Selector};
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, Default)]
pub struct PageFacts {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub h1: Option<String>,
    pub headings: Vec<String>,
    pub canonical_raw: Option<String>,
    pub robots_meta: Option<String>,
    pub text_sample: String,
    pub word_count: u32,
    pub language: Option<String>,
    pub open_graph: IndexMap<String, String>,
    pub twitter_card: IndexMap<String, String>,
    pub structured_data_types: Vec<String>,
}

const TEXT_SAMPLE_MAX_CHARS: usize = 2_000;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal is valid CSS")
}

/// Derives [NoindexSurface] by combining the `<meta name=robots>` directive
/// with the `X-Robots-Tag` response header, both of which may independently
/// carry `noindex`.
pub fn noindex_surface(robots_meta: Option<&str>, robots_header: Option<&str>) -> NoindexSurface {
    let meta_noindex = robots_meta.is_some_and(|v| v.to_ascii_lowercase().contains("noindex"));
    let header_noindex = robots_header.is_some_and(|v| v.to_ascii_lowercase().contains("noindex"));
    match (meta_noindex, header_noindex) {
        (true, true) => NoindexSurface::Both,
        (true, false) => NoindexSurface::Meta,
        (false, true) => NoindexSurface::Header,
        (false, false) => NoindexSurface::None,
    }
}

pub fn extract(document: &Html) -> PageFacts {
    let title = document
        .select(&selector("title"))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());

    let meta_description = meta_content(document, "description");
    let robots_meta = meta_content(document, "robots");

    let headings: Vec<String> = document
        .select(&selector("h1, h2, h3, h4, h5, h6"))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let h1 = document
        .select(&selector("h1"))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty());

    let canonical_raw = document
        .select(&selector("link[rel=canonical]"))
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);

    let body_text: String = document
        .select(&selector("body"))
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let normalized_text = body_text.split_whitespace().collect::<Vec<_>>().join(" ");
    let word_count = normalized_text.unicode_words().count() as u32;
    let text_sample = normalized_text.chars().take(TEXT_SAMPLE_MAX_CHARS).collect();

    let language = document
        .select(&selector("html"))
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(str::to_string)
        .or_else(|| detect_language(&normalized_text));

    let open_graph = property_meta(document, "og:");
    let twitter_card = property_meta(document, "twitter:");

    let structured_data_types = document
        .select(&selector(r#"script[type="application/ld+json"]"#))
        .filter_map(|el| {
            let text = el.text().collect::<String>();
            serde_json::from_str::<serde_json::Value>(&text).ok()
        })
        .flat_map(ld_json_types)
        .collect();

    PageFacts {
        title,
        meta_description,
        h1,
        headings,
        canonical_raw,
        robots_meta,
        text_sample,
        word_count,
        language,
        open_graph,
        twitter_card,
        structured_data_types,
    }
}

fn meta_content(document: &Html, name: &str) -> Option<String> {
    document
        .select(&selector(&format!(r#"meta[name="{name}" i]"#)))
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::to_string)
}

fn property_meta(document: &Html, prefix: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for el in document.select(&selector("meta[property], meta[name]")) {
        let value = el.value();
        let key = value
            .attr("property")
            .or_else(|| value.attr("name"))
            .unwrap_or_default();
        if let Some(stripped) = key.strip_prefix(prefix) {
            if let Some(content) = value.attr("content") {
                out.insert(stripped.to_string(), content.to_string());
            }
        }
    }
    out
}

fn ld_json_types(value: serde_json::Value) -> Vec<String> {
    fn collect(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                if let Some(t) = map.get("@type") {
                    match t {
                        serde_json::Value::String(s) => out.push(s.clone()),
                        serde_json::Value::Array(arr) => {
                            out.extend(arr.iter().filter_map(|v| v.as_str().map(str::to_string)))
                        }
                        _ => {}
                    }
                }
                if let Some(graph) = map.get("@graph") {
                    collect(graph, out);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    collect(item, out);
                }
            }
            _ => {}
        }
    }
    let mut out = Vec::new();
    collect(&value, &mut out);
    out
}

fn detect_language(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    whatlang::detect(text).map(|info| info.lang().code().to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_title_and_headings() {
        let document = Html::parse_document(
            "<html lang=\"en\"><head><title>Hello</title></head><body><h1>Main</h1><h2>Sub</h2></body></html>",
        );
        let facts = extract(&document);
        assert_eq!(facts.title.as_deref(), Some("Hello"));
        assert_eq!(facts.h1.as_deref(), Some("Main"));
        assert_eq!(facts.headings, vec!["Main", "Sub"]);
        assert_eq!(facts.language.as_deref(), Some("en"));
    }

    #[test]
    fn extracts_open_graph_and_ld_json() {
        let document = Html::parse_document(
            r#"<html><head>
                <meta property="og:title" content="OG Title">
                <script type="application/ld+json">{"@type":"Article"}</script>
            </head><body></body></html>"#,
        );
        let facts = extract(&document);
        assert_eq!(facts.open_graph.get("title").map(String::as_str), Some("OG Title"));
        assert_eq!(facts.structured_data_types, vec!["Article".to_string()]);
    }

    #[test]
    fn noindex_surface_combines_meta_and_header() {
        assert_eq!(noindex_surface(Some("noindex"), None), NoindexSurface::Meta);
        assert_eq!(noindex_surface(None, Some("noindex, nofollow")), NoindexSurface::Header);
        assert_eq!(noindex_surface(Some("noindex"), Some("noindex")), NoindexSurface::Both);
        assert_eq!(noindex_surface(Some("index"), None), NoindexSurface::None);
    }
}
