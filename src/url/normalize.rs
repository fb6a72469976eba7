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

//! URL Normalizer: canonicalize a raw URL into a deterministic
//! `normalized_url` and `url_key`, honoring a query-parameter policy.

use crate::ids::url_key;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// How query parameters are treated during normalization.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamPolicy {
    /// Preserve all query parameters in their original order.
    Keep,
    /// Drop the query string entirely.
    Strip,
    /// Keep only the first occurrence of each parameter key, sorted by key.
    #[default]
    Sample,
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result of normalizing a single URL.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NormalizedUrl {
    pub normalized_url: String,
    pub origin: String,
    pub host: String,
    pub path: String,
    pub url_key: String,
}

/// Normalizes `raw` per [ParamPolicy]. Never panics on unusual-but-parseable
/// input; only genuinely unparsable strings produce [NormalizeError::InvalidUrl].
pub fn normalize(raw: &str, policy: ParamPolicy) -> Result<NormalizedUrl, NormalizeError> {
    // NFC-normalize first so visually-identical composed/decomposed Unicode
    // forms in the path or query collapse to the same normalized_url.
    let raw: String = raw.nfc().collect();
    let mut parsed = Url::parse(&raw)?;

    // Lower-case scheme and host.
    let scheme = parsed.scheme().to_ascii_lowercase();
    let _ = parsed.set_scheme(&scheme);
    if let Some(host) = parsed.host_str() {
        let lowered = host.to_ascii_lowercase();
        let _ = parsed.set_host(Some(&lowered));
    }

    // Strip default ports.
    match (scheme.as_str(), parsed.port()) {
        ("http", Some(80)) | ("https", Some(443)) => {
            let _ = parsed.set_port(None);
        }
        _ => {}
    }

    // Resolve `.` / `..` path segments and re-encode canonically. `url` already
    // normalizes dot-segments and percent-encodes during parsing/serialization;
    // we only need to guarantee a non-empty path.
    if parsed.path().is_empty() {
        parsed.set_path("/");
    }

    // Drop the fragment unconditionally.
    parsed.set_fragment(None);

    // Apply the query-parameter policy.
    apply_param_policy(&mut parsed, policy);

    let normalized_url = parsed.to_string();
    let origin = parsed.origin().ascii_serialization();
    let host = parsed.host_str().unwrap_or_default().to_string();
    let path = parsed.path().to_string();
    let key = url_key(&normalized_url);

    Ok(NormalizedUrl {
        normalized_url,
        origin,
        host,
        path,
        url_key: key,
    })
}

fn apply_param_policy(parsed: &mut Url, policy: ParamPolicy) {
    match policy {
        ParamPolicy::Keep => { /* leave query string as-is */ }
        ParamPolicy::Strip => {
            parsed.set_query(None);
        }
        ParamPolicy::Sample => {
            let mut seen: IndexMap<String, String> = IndexMap::new();
            for (k, v) in parsed.query_pairs() {
                seen.entry(k.into_owned()).or_insert_with(|| v.into_owned());
            }
            seen.sort_keys();
            if seen.is_empty() {
                parsed.set_query(None);
            } else {
                let query: String = seen
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
                    .collect::<Vec<_>>()
                    .join("&");
                parsed.set_query(Some(&query));
            }
        }
    }
}

fn urlencode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

/// `normalize(normalize(u)) == normalize(u)`.
pub fn is_idempotent(raw: &str, policy: ParamPolicy) -> bool {
    match (normalize(raw, policy), normalize(raw, policy)) {
        (Ok(first), _) => match normalize(&first.normalized_url, policy) {
            Ok(second) => first.normalized_url == second.normalized_url,
            Err(_) => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        let n = normalize("HTTPS://Example.COM/Path", ParamPolicy::Keep).unwrap();
        assert_eq!(n.normalized_url, "https://example.com/Path");
    }

    #[test]
    fn strips_default_ports() {
        let n = normalize("https://example.com:443/", ParamPolicy::Keep).unwrap();
        assert_eq!(n.host, "example.com");
        assert!(!n.normalized_url.contains(":443"));
    }

    #[test]
    fn drops_fragment_always() {
        let n = normalize("https://example.com/p#section", ParamPolicy::Keep).unwrap();
        assert!(!n.normalized_url.contains('#'));
    }

    #[test]
    fn strip_policy_removes_all_params() {
        let n = normalize("https://example.com/?a=1&b=2", ParamPolicy::Strip).unwrap();
        assert_eq!(n.normalized_url, "https://example.com/");
    }

    #[test]
    fn sample_policy_keeps_first_occurrence_sorted() {
        let n = normalize("https://example.com/?b=2&a=1&a=9", ParamPolicy::Sample).unwrap();
        assert_eq!(n.normalized_url, "https://example.com/?a=1&b=2");
    }

    #[test]
    fn keep_policy_preserves_order_and_duplicates() {
        let n = normalize("https://example.com/?b=2&a=1", ParamPolicy::Keep).unwrap();
        assert_eq!(n.normalized_url, "https://example.com/?b=2&a=1");
    }

    #[test]
    fn invalid_url_fails_with_stable_error() {
        let err = normalize("not a url", ParamPolicy::Keep).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidUrl(_)));
    }

    #[test]
    fn normalization_is_idempotent() {
        assert!(is_idempotent("https://Example.com:443/a/../b/?z=1&a=2#frag", ParamPolicy::Sample));
    }

    #[test]
    fn same_input_yields_same_url_key_across_calls() {
        let a = normalize("https://example.com/x", ParamPolicy::Keep).unwrap();
        let b = normalize("https://example.com/x", ParamPolicy::Keep).unwrap();
        assert_eq!(a.url_key, b.url_key);
        assert_eq!(a.url_key.len(), 16);
    }
}
