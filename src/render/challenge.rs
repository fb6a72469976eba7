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

//! Challenge-page detection: HTTP 503/429 co-occurring with
//! one of a fixed set of signal phrases in the title or DOM.

use aho_corasick::AhoCorasick;
use std::sync::OnceLock;

const SIGNAL_PHRASES: &[&str] = &[
    "just a moment",
    "attention required",
    "checking your browser",
    "verifying you are",
    "security check",
    "please wait",
    "access denied",
];

fn matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(SIGNAL_PHRASES)
            .expect("challenge signal phrase set is a fixed, valid literal list")
    })
}

/// True if `status` is 503/429 and `haystack` (title or DOM text) contains
/// one of the known challenge-page signal phrases.
pub fn is_challenge_page(status: Option<u16>, haystack: &str) -> bool {
    let status_matches = matches!(status, Some(503) | Some(429));
    status_matches && matcher().is_match(haystack)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_cloudflare_style_challenge() {
        assert!(is_challenge_page(Some(503), "<title>Just a moment...</title>"));
    }

    #[test]
    fn ignores_matching_text_without_challenge_status() {
        assert!(!is_challenge_page(Some(200), "just a moment please"));
    }

    #[test]
    fn ignores_challenge_status_without_signal_text() {
        assert!(!is_challenge_page(Some(503), "<title>Service Unavailable</title>"));
    }
}
