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

//! Decodes raw response bytes (raw-mode fetches only; rendered modes already
//! hand back decoded strings from the browser) into text, preferring in
//! order: the `Content-Type` charset parameter, a `<meta charset>` tag
//! sniffed from the first few KB, then statistical detection.

use encoding_rs::Encoding;
use scraper::{Html, Selector};

const SNIFF_WINDOW: usize = 4096;

pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(encoding_from_content_type)
        .or_else(|| encoding_from_meta_tag(bytes))
        .unwrap_or_else(|| detect_encoding(bytes));

    let (decoded, _, _) = encoding.decode(bytes);
    decoded.into_owned()
}

fn encoding_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let charset = content_type.split(';').find_map(|part| {
        part.trim().strip_prefix("charset=").map(|v| v.trim_matches('"'))
    })?;
    Encoding::for_label(charset.as_bytes())
}

fn encoding_from_meta_tag(bytes: &[u8]) -> Option<&'static Encoding> {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let lossy = String::from_utf8_lossy(window);
    let selector = Selector::parse("meta[charset]").ok()?;
    let document = Html::parse_document(&lossy);
    let charset = document.select(&selector).next()?.value().attr("charset")?;
    Encoding::for_label(charset.as_bytes())
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn content_type_charset_wins_over_sniffing() {
        let html = "<html><body>caf\u{e9}</body></html>".as_bytes().to_vec();
        let decoded = decode_html(&html, Some("text/html; charset=utf-8"));
        assert!(decoded.contains("caf\u{e9}"));
    }

    #[test]
    fn meta_charset_tag_used_when_header_absent() {
        let html = b"<html><head><meta charset=\"utf-8\"></head><body>hi</body></html>";
        let decoded = decode_html(html, None);
        assert!(decoded.contains("hi"));
    }

    #[test]
    fn falls_back_to_statistical_detection() {
        let html = b"<html><body>plain ascii text</body></html>";
        let decoded = decode_html(html, None);
        assert!(decoded.contains("plain ascii text"));
    }
}
