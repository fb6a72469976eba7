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

//! Outgoing-link extraction and classification into the [LinkType]
//! and [LinkLocation] taxonomy.

use crate::data::edge::{LinkLocation, LinkType};
use scraper::{ElementRef, Html, Selector};
use url::Url;

#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub target_url: String,
    pub anchor_text: String,
    pub rel: Option<String>,
    pub nofollow: bool,
    pub sponsored: bool,
    pub ugc: bool,
    pub is_external: bool,
    pub location: LinkLocation,
    pub selector_hint: Option<String>,
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

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal is valid CSS")
}

pub fn extract(document: &Html, page_url: &str) -> Vec<ExtractedLink> {
    let base = Url::parse(page_url).ok();
    document
        .select(&selector("a[href]"))
        .filter_map(|el| extract_one(el, base.as_ref()))
        .collect()
}

fn extract_one(el: ElementRef, base: Option<&Url>) -> Option<ExtractedLink> {
    let value = el.value();
    let href = value.attr("href")?;
    if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
        return None;
    }
    let target_url = match base.and_then(|b| b.join(href).ok()) {
        Some(joined) => joined.to_string(),
        None => href.to_string(),
    };
    let is_external = match (base, Url::parse(&target_url)) {
        (Some(base), Ok(target)) => base.host_str() != target.host_str(),
        _ => false,
    };

    let anchor_text = el.text().collect::<String>().trim().to_string();
    let rel = value.attr("rel").map(str::to_string);
    let rel_lower = rel.as_deref().unwrap_or_default().to_ascii_lowercase();
    let nofollow = rel_lower.split_whitespace().any(|t| t == "nofollow");
    let sponsored = rel_lower.split_whitespace().any(|t| t == "sponsored");
    let ugc = rel_lower.split_whitespace().any(|t| t == "ugc");

    let aria_label = value.attr("aria-label").map(str::to_string);
    let role = value.attr("role").map(str::to_string);
    let class_attr = value.attr("class").unwrap_or_default().to_ascii_lowercase();

    let location = classify_location(el);
    let is_primary_nav = matches!(location, LinkLocation::Nav) && within_ancestor(el, "nav");
    let is_breadcrumb = class_attr.contains("breadcrumb")
        || role.as_deref() == Some("navigation") && aria_label.as_deref().unwrap_or_default().to_ascii_lowercase().contains("breadcrumb");
    let is_skip_link = class_attr.contains("skip") || anchor_text.to_ascii_lowercase().contains("skip to");
    let is_pagination = class_attr.contains("pagination") || class_attr.contains("pager");

    let link_type = classify_link_type(
        &location,
        is_breadcrumb,
        is_skip_link,
        is_pagination,
        is_external,
        rel_lower.contains("download") || value.attr("download").is_some(),
        &class_attr,
    );

    let selector_hint = value.attr("id").map(|id| format!("#{id}")).or_else(|| {
        value
            .attr("class")
            .and_then(|c| c.split_whitespace().next())
            .map(|c| format!("a.{c}"))
    });

    Some(ExtractedLink {
        target_url,
        anchor_text,
        rel,
        nofollow,
        sponsored,
        ugc,
        is_external,
        location,
        selector_hint,
        link_type,
        target_attr: value.attr("target").map(str::to_string),
        title_attr: value.attr("title").map(str::to_string),
        download_attr: value.attr("download").map(str::to_string),
        hreflang: value.attr("hreflang").map(str::to_string),
        type_attr: value.attr("type").map(str::to_string),
        aria_label,
        role,
        is_primary_nav,
        is_breadcrumb,
        is_skip_link,
        is_pagination,
    })
}

fn within_ancestor(el: ElementRef, tag: &str) -> bool {
    el.ancestors()
        .filter_map(scraper::ElementRef::wrap)
        .any(|a| a.value().name() == tag)
}

fn classify_location(el: ElementRef) -> LinkLocation {
    for ancestor in el.ancestors().filter_map(scraper::ElementRef::wrap) {
        match ancestor.value().name() {
            "nav" => return LinkLocation::Nav,
            "header" => return LinkLocation::Header,
            "footer" => return LinkLocation::Footer,
            "aside" => return LinkLocation::Aside,
            "main" | "article" => return LinkLocation::Main,
            _ => {}
        }
    }
    LinkLocation::Unknown
}

fn classify_link_type(
    location: &LinkLocation,
    is_breadcrumb: bool,
    is_skip_link: bool,
    is_pagination: bool,
    is_external: bool,
    is_download: bool,
    class_attr: &str,
) -> LinkType {
    if is_skip_link {
        LinkType::Skip
    } else if is_breadcrumb {
        LinkType::Breadcrumb
    } else if is_pagination {
        LinkType::Pagination
    } else if is_download {
        LinkType::Download
    } else if class_attr.contains("social") || class_attr.contains("share") {
        LinkType::Social
    } else if class_attr.contains("author") || class_attr.contains("byline") {
        LinkType::Author
    } else if class_attr.contains("tag") || class_attr.contains("category") {
        LinkType::Tag
    } else if class_attr.contains("related") {
        LinkType::Related
    } else if class_attr.contains("button") || class_attr.contains("cta") || class_attr.contains("btn") {
        LinkType::Action
    } else if is_external {
        LinkType::External
    } else {
        match location {
            LinkLocation::Nav => LinkType::Navigation,
            LinkLocation::Footer => LinkType::Footer,
            LinkLocation::Main => LinkType::Content,
            _ => LinkType::Other,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_nav_link_as_navigation() {
        let document = Html::parse_document(
            r#"<html><body><nav><a href="/about">About</a></nav></body></html>"#,
        );
        let links = extract(&document, "https://example.com/");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].link_type, LinkType::Navigation);
        assert!(links[0].is_primary_nav);
        assert!(!links[0].is_external);
    }

    #[test]
    fn detects_external_and_nofollow() {
        let document = Html::parse_document(
            r#"<html><body><a href="https://other.example/" rel="nofollow sponsored">Ad</a></body></html>"#,
        );
        let links = extract(&document, "https://example.com/");
        assert!(links[0].is_external);
        assert!(links[0].nofollow);
        assert!(links[0].sponsored);
    }

    #[test]
    fn skips_fragment_and_javascript_links() {
        let document = Html::parse_document(
            r#"<html><body><a href="#top">Top</a><a href="javascript:void(0)">JS</a></body></html>"#,
        );
        let links = extract(&document, "https://example.com/");
        assert!(links.is_empty());
    }
}
