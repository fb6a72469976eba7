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

//! Accessibility auditing derived from the serialized DOM: heading order,
//! landmark regions, ARIA roles in use, and missing `alt` text.

use scraper::{Html, Selector};

const LANDMARK_TAGS: &[&str] = &["nav", "main", "header", "footer", "aside", "form"];
const LANDMARK_ROLES: &[&str] = &[
    "navigation",
    "main",
    "banner",
    "contentinfo",
    "complementary",
    "search",
    "form",
];

#[derive(Debug, Clone, Default)]
pub struct AccessibilityFacts {
    pub heading_order: Vec<String>,
    pub landmarks: Vec<String>,
    pub roles: Vec<String>,
    pub missing_alt_count: u32,
    pub missing_alt_sources: Vec<String>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal is valid CSS")
}

pub fn extract(document: &Html) -> AccessibilityFacts {
    let heading_order = document
        .select(&selector("h1, h2, h3, h4, h5, h6"))
        .map(|el| el.value().name().to_string())
        .collect();

    let mut landmarks: Vec<String> = document
        .select(&selector(&LANDMARK_TAGS.join(", ")))
        .map(|el| el.value().name().to_string())
        .collect();
    landmarks.extend(
        document
            .select(&selector("[role]"))
            .filter_map(|el| el.value().attr("role"))
            .filter(|role| LANDMARK_ROLES.contains(role))
            .map(str::to_string),
    );
    landmarks.sort();
    landmarks.dedup();

    let mut roles: Vec<String> = document
        .select(&selector("[role]"))
        .filter_map(|el| el.value().attr("role"))
        .map(str::to_string)
        .collect();
    roles.sort();
    roles.dedup();

    let missing_alt_sources: Vec<String> = document
        .select(&selector("img"))
        .filter(|el| el.value().attr("alt").is_none())
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .collect();

    AccessibilityFacts {
        heading_order,
        landmarks,
        roles,
        missing_alt_count: missing_alt_sources.len() as u32,
        missing_alt_sources,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collects_heading_order_and_landmarks() {
        let document = Html::parse_document(
            r#"<html><body><nav></nav><main><h1>A</h1><h2>B</h2></main></body></html>"#,
        );
        let facts = extract(&document);
        assert_eq!(facts.heading_order, vec!["h1", "h2"]);
        assert_eq!(facts.landmarks, vec!["main", "nav"]);
    }

    #[test]
    fn counts_images_missing_alt() {
        let document = Html::parse_document(
            r#"<html><body><img src="a.png" alt="ok"><img src="b.png"></body></html>"#,
        );
        let facts = extract(&document);
        assert_eq!(facts.missing_alt_count, 1);
        assert_eq!(facts.missing_alt_sources, vec!["b.png".to_string()]);
    }

    #[test]
    fn collects_explicit_roles() {
        let document = Html::parse_document(r#"<html><body><div role="search"></div></body></html>"#);
        let facts = extract(&document);
        assert_eq!(facts.roles, vec!["search".to_string()]);
        assert!(facts.landmarks.contains(&"search".to_string()));
    }
}
