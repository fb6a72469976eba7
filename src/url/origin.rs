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

//! The per-origin key used by the Rate Governor, Robots Evaluator and the
//! Browser Pool's per-origin session store: a case-insensitive, serializable
//! newtype over a scheme+host(+port) string rather than the raw [url::Url].

use case_insensitive_string::CaseInsensitiveString;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use url::Url;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(CaseInsensitiveString);

impl Origin {
    pub fn from_url(url: &Url) -> Option<Self> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return None;
        }
        Some(Self(CaseInsensitiveString::new(
            origin.ascii_serialization().as_bytes(),
        )))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_ref()
    }

    /// Rebuilds an [Origin] from a previously-serialized key (e.g. the
    /// string produced by [Display]), without re-deriving it from a [Url].
    pub fn from_key(key: &str) -> Self {
        Self(CaseInsensitiveString::new(key.as_bytes()))
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the registrable domain (public-suffix aware) host for subdomain policy.
pub fn registrable_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    psl::domain(host.as_bytes()).map(|d| String::from_utf8_lossy(d.as_bytes()).into_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn origin_is_case_insensitive() {
        let a = Origin::from_url(&Url::parse("https://Example.com/a").unwrap()).unwrap();
        let b = Origin::from_url(&Url::parse("https://example.COM/b").unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn registrable_domain_ignores_subdomain() {
        let url = Url::parse("https://blog.example.co.uk/post").unwrap();
        assert_eq!(registrable_domain(&url).as_deref(), Some("example.co.uk"));
    }
}
