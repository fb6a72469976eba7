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

//! Per-origin cookie jar used to carry a browser session across navigations
//! to the same origin when `session.persist_session` is set. Disabled
//! entirely (and scrubbed from every record) when `privacy.strip_cookies` is
//! set, which takes priority over persistence.

use crate::url::Origin;
use std::collections::HashMap;
use std::sync::RwLock;

/// Holds one cookie header string per origin plus an optional default
/// applied to origins that haven't set one yet. Reads and writes never
/// block each other for long: a `RwLock<HashMap<..>>` is sufficient because
/// cookie churn per origin is low relative to page fetches.
#[derive(Debug, Default)]
pub struct CookieJar {
    default: RwLock<Option<String>>,
    per_origin: RwLock<HashMap<Origin, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default: Option<String>) -> Self {
        Self {
            default: RwLock::new(default),
            per_origin: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cookie header to send for `origin`, falling back to the
    /// jar's default when nothing has been recorded for it yet.
    pub fn get(&self, origin: &Origin) -> Option<String> {
        if let Some(value) = self.per_origin.read().unwrap().get(origin) {
            return Some(value.clone());
        }
        self.default.read().unwrap().clone()
    }

    pub fn set(&self, origin: Origin, value: String) {
        self.per_origin.write().unwrap().insert(origin, value);
    }

    pub fn set_default(&self, value: Option<String>) {
        *self.default.write().unwrap() = value;
    }

    pub fn clear(&self, origin: &Origin) {
        self.per_origin.write().unwrap().remove(origin);
    }
}

/// Joins `name=value` pairs into a single `Cookie:`-style header string.
pub fn encode(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Splits a `Cookie:`-style header string back into `name=value` pairs,
/// skipping malformed segments.
pub fn decode(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|segment| {
            let segment = segment.trim();
            let (name, value) = segment.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use url::Url;

    fn origin(url: &str) -> Origin {
        Origin::from_url(&Url::parse(url).unwrap()).unwrap()
    }

    #[test]
    fn falls_back_to_default_when_origin_unset() {
        let jar = CookieJar::with_default(Some("session=default".to_string()));
        assert_eq!(jar.get(&origin("https://example.com/")), Some("session=default".to_string()));
    }

    #[test]
    fn per_origin_value_overrides_default() {
        let jar = CookieJar::with_default(Some("session=default".to_string()));
        jar.set(origin("https://example.com/"), "session=abc123".to_string());
        assert_eq!(jar.get(&origin("https://example.com/")), Some("session=abc123".to_string()));
        assert_eq!(jar.get(&origin("https://other.com/")), Some("session=default".to_string()));
    }

    #[test]
    fn clear_falls_back_to_default_again() {
        let jar = CookieJar::with_default(None);
        let o = origin("https://example.com/");
        jar.set(o.clone(), "session=abc123".to_string());
        jar.clear(&o);
        assert_eq!(jar.get(&o), None);
    }

    #[test]
    fn encode_then_decode_round_trips_pairs() {
        let pairs = vec![
            ("session".to_string(), "abc123".to_string()),
            ("theme".to_string(), "dark".to_string()),
        ];
        let header = encode(&pairs);
        assert_eq!(header, "session=abc123; theme=dark");
        assert_eq!(decode(&header), pairs);
    }

    #[test]
    fn decode_skips_malformed_segments() {
        assert_eq!(decode("a=1; garbage; b=2"), vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())]);
    }
}
