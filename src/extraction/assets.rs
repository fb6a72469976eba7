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

//! Media-asset extraction: images, video and audio, including responsive
//! (`srcset`/`<picture>`) and lazy-loading variants.

use crate::data::asset::{
    AssetType, LazyStrategy, PictureContext, SourceInfo, SrcsetCandidate, TrackInfo,
};
use scraper::{ElementRef, Html, Selector};
use url::Url;

#[derive(Debug, Clone)]
pub struct ExtractedAsset {
    pub asset_url: String,
    pub r#type: AssetType,
    pub alt: Option<String>,
    pub has_alt: bool,
    pub visible: bool,
    pub in_viewport: bool,
    pub was_lazy_loaded: bool,
    pub srcset: Option<String>,
    pub srcset_candidates: Vec<SrcsetCandidate>,
    pub sizes: Option<String>,
    pub picture_context: PictureContext,
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
    pub lazy_strategy: LazyStrategy,
    pub lazy_data_attrs: Vec<String>,
    pub lazy_classes: Vec<String>,
}

const LAZY_CLASS_MARKERS: &[&str] = &["lazy", "lazyload", "lazyloaded"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector literal is valid CSS")
}

pub fn extract(document: &Html, page_url: &str) -> Vec<ExtractedAsset> {
    let base = Url::parse(page_url).ok();
    let mut assets = Vec::new();
    assets.extend(document.select(&selector("img")).filter_map(|el| extract_image(el, base.as_ref())));
    assets.extend(document.select(&selector("video")).filter_map(|el| extract_video(el, base.as_ref())));
    assets.extend(document.select(&selector("audio")).filter_map(|el| extract_audio(el, base.as_ref())));
    assets
}

fn resolve(base: Option<&Url>, raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    match base.and_then(|b| b.join(raw).ok()) {
        Some(joined) => Some(joined.to_string()),
        None => Some(raw.to_string()),
    }
}

/// Best-effort visibility from static markup alone (no layout information is
/// available outside a rendered browser context): an element is treated as
/// hidden only if explicitly marked so.
fn is_visible(el: ElementRef) -> bool {
    let value = el.value();
    if value.attr("hidden").is_some() {
        return false;
    }
    let style = value.attr("style").unwrap_or_default().to_ascii_lowercase();
    !(style.contains("display:none") || style.contains("display: none") || style.contains("visibility:hidden"))
}

fn lazy_attrs(el: ElementRef) -> (Vec<String>, LazyStrategy) {
    let value = el.value();
    let mut attrs = Vec::new();
    let mut strategy = LazyStrategy::None;
    if value.attr("loading") == Some("lazy") {
        attrs.push("loading=lazy".to_string());
        strategy = LazyStrategy::Native;
    }
    if value.attr("data-src").is_some() || value.attr("data-srcset").is_some() {
        attrs.push("data-src".to_string());
        strategy = LazyStrategy::DataSrc;
    }
    (attrs, strategy)
}

fn lazy_classes(el: ElementRef) -> Vec<String> {
    el.value()
        .attr("class")
        .map(|c| {
            c.split_whitespace()
                .filter(|token| LAZY_CLASS_MARKERS.contains(&token.to_ascii_lowercase().as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_srcset(base: Option<&Url>, raw: &str) -> Vec<SrcsetCandidate> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.split_whitespace();
            let url = resolve(base, parts.next()?)?;
            let descriptor = parts.next().unwrap_or_default().to_string();
            let width = descriptor.strip_suffix('w').and_then(|w| w.parse().ok());
            let density = descriptor.strip_suffix('x').and_then(|d| d.parse().ok());
            Some(SrcsetCandidate {
                url,
                descriptor,
                width,
                density,
            })
        })
        .collect()
}

fn picture_context(el: ElementRef, base: Option<&Url>) -> PictureContext {
    let parent_picture = el
        .ancestors()
        .filter_map(scraper::ElementRef::wrap)
        .next()
        .filter(|p| p.value().name() == "picture");
    match parent_picture {
        Some(picture) => {
            let sources: Vec<String> = picture
                .children()
                .filter_map(scraper::ElementRef::wrap)
                .filter(|c| c.value().name() == "source")
                .filter_map(|c| c.value().attr("srcset"))
                .filter_map(|raw| resolve(base, raw))
                .collect();
            PictureContext {
                has_picture_parent: true,
                source_count: sources.len() as u32,
                sources,
            }
        }
        None => PictureContext::default(),
    }
}

fn extract_image(el: ElementRef, base: Option<&Url>) -> Option<ExtractedAsset> {
    let value = el.value();
    let raw_src = value.attr("src").or_else(|| value.attr("data-src")).unwrap_or_default();
    let asset_url = resolve(base, raw_src)?;
    let alt = value.attr("alt").map(str::to_string);
    let srcset = value.attr("srcset").or_else(|| value.attr("data-srcset")).map(str::to_string);
    let srcset_candidates = srcset.as_deref().map(|s| parse_srcset(base, s)).unwrap_or_default();
    let (lazy_data_attrs, lazy_strategy) = lazy_attrs(el);
    let mime_type = crate::toolkit::guess_mime_from_url(&asset_url).map(str::to_string);

    Some(ExtractedAsset {
        asset_url,
        r#type: AssetType::Image,
        has_alt: alt.is_some(),
        alt,
        visible: is_visible(el),
        in_viewport: false,
        was_lazy_loaded: lazy_strategy != LazyStrategy::None,
        srcset,
        srcset_candidates,
        sizes: value.attr("sizes").map(str::to_string),
        picture_context: picture_context(el, base),
        duration: None,
        mime_type,
        has_controls: false,
        autoplay: false,
        r#loop: false,
        muted: false,
        preload: None,
        poster: None,
        tracks: Vec::new(),
        sources: Vec::new(),
        lazy_strategy,
        lazy_data_attrs,
        lazy_classes: lazy_classes(el),
    })
}

fn extract_sources(el: ElementRef, base: Option<&Url>) -> Vec<SourceInfo> {
    el.children()
        .filter_map(scraper::ElementRef::wrap)
        .filter(|c| c.value().name() == "source")
        .filter_map(|c| {
            let src = resolve(base, c.value().attr("src")?)?;
            Some(SourceInfo {
                src,
                r#type: c.value().attr("type").map(str::to_string),
            })
        })
        .collect()
}

fn extract_tracks(el: ElementRef, base: Option<&Url>) -> Vec<TrackInfo> {
    el.children()
        .filter_map(scraper::ElementRef::wrap)
        .filter(|c| c.value().name() == "track")
        .filter_map(|c| {
            let src = resolve(base, c.value().attr("src")?)?;
            Some(TrackInfo {
                kind: c.value().attr("kind").unwrap_or("subtitles").to_string(),
                src,
                srclang: c.value().attr("srclang").map(str::to_string),
                label: c.value().attr("label").map(str::to_string),
            })
        })
        .collect()
}

fn extract_video(el: ElementRef, base: Option<&Url>) -> Option<ExtractedAsset> {
    let value = el.value();
    let sources = extract_sources(el, base);
    let direct_src = value.attr("src").and_then(|s| resolve(base, s));
    let asset_url = direct_src.or_else(|| sources.first().map(|s| s.src.clone()))?;
    let (lazy_data_attrs, lazy_strategy) = lazy_attrs(el);

    Some(ExtractedAsset {
        asset_url,
        r#type: AssetType::Video,
        alt: None,
        has_alt: false,
        visible: is_visible(el),
        in_viewport: false,
        was_lazy_loaded: lazy_strategy != LazyStrategy::None,
        srcset: None,
        srcset_candidates: Vec::new(),
        sizes: None,
        picture_context: PictureContext::default(),
        duration: None,
        mime_type: sources.first().and_then(|s| s.r#type.clone()),
        has_controls: value.attr("controls").is_some(),
        autoplay: value.attr("autoplay").is_some(),
        r#loop: value.attr("loop").is_some(),
        muted: value.attr("muted").is_some(),
        preload: value.attr("preload").map(str::to_string),
        poster: value.attr("poster").and_then(|p| resolve(base, p)),
        tracks: extract_tracks(el, base),
        sources,
        lazy_strategy,
        lazy_data_attrs,
        lazy_classes: lazy_classes(el),
    })
}

fn extract_audio(el: ElementRef, base: Option<&Url>) -> Option<ExtractedAsset> {
    let value = el.value();
    let sources = extract_sources(el, base);
    let direct_src = value.attr("src").and_then(|s| resolve(base, s));
    let asset_url = direct_src.or_else(|| sources.first().map(|s| s.src.clone()))?;

    Some(ExtractedAsset {
        asset_url,
        r#type: AssetType::Audio,
        alt: None,
        has_alt: false,
        visible: is_visible(el),
        in_viewport: false,
        was_lazy_loaded: false,
        srcset: None,
        srcset_candidates: Vec::new(),
        sizes: None,
        picture_context: PictureContext::default(),
        duration: None,
        mime_type: sources.first().and_then(|s| s.r#type.clone()),
        has_controls: value.attr("controls").is_some(),
        autoplay: value.attr("autoplay").is_some(),
        r#loop: value.attr("loop").is_some(),
        muted: value.attr("muted").is_some(),
        preload: value.attr("preload").map(str::to_string),
        poster: None,
        tracks: Vec::new(),
        sources,
        lazy_strategy: LazyStrategy::None,
        lazy_data_attrs: Vec::new(),
        lazy_classes: Vec::new(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_image_with_srcset() {
        let document = Html::parse_document(
            r#"<html><body><img src="a.jpg" srcset="a-480.jpg 480w, a-800.jpg 800w" alt="cat"></body></html>"#,
        );
        let assets = extract(&document, "https://example.com/page/");
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_url, "https://example.com/page/a.jpg");
        assert!(assets[0].has_alt);
        assert_eq!(assets[0].srcset_candidates.len(), 2);
        assert_eq!(assets[0].srcset_candidates[1].width, Some(800));
    }

    #[test]
    fn detects_picture_parent() {
        let document = Html::parse_document(
            r#"<html><body><picture><source srcset="wide.jpg"><img src="fallback.jpg"></picture></body></html>"#,
        );
        let assets = extract(&document, "https://example.com/");
        assert!(assets[0].picture_context.has_picture_parent);
        assert_eq!(assets[0].picture_context.source_count, 1);
    }

    #[test]
    fn extracts_video_sources_and_flags() {
        let document = Html::parse_document(
            r#"<html><body><video controls autoplay loop><source src="v.mp4" type="video/mp4"></video></body></html>"#,
        );
        let assets = extract(&document, "https://example.com/");
        assert_eq!(assets[0].r#type, AssetType::Video);
        assert!(assets[0].has_controls);
        assert!(assets[0].autoplay);
        assert_eq!(assets[0].mime_type.as_deref(), Some("video/mp4"));
    }

    #[test]
    fn detects_data_src_lazy_loading() {
        let document = Html::parse_document(r#"<html><body><img data-src="lazy.jpg" class="lazyload"></body></html>"#);
        let assets = extract(&document, "https://example.com/");
        assert!(assets[0].was_lazy_loaded);
        assert_eq!(assets[0].lazy_strategy, LazyStrategy::DataSrc);
        assert_eq!(assets[0].lazy_classes, vec!["lazyload".to_string()]);
    }
}
