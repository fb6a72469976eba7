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

//! Fetcher: one HTTP GET with manual redirect capture and
//! header-policy normalization. The client itself follows no redirects
//! (`redirect::Policy::none`) so every hop in the chain can be recorded.

pub mod error;

pub use error::FetchError;

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RedirectHop {
    pub url: String,
    pub status: StatusCode,
}

#[derive(Debug)]
pub struct FetchedResponse {
    pub final_url: String,
    pub status: StatusCode,
    pub headers: IndexMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub redirect_chain: Vec<RedirectHop>,
    pub timing: Duration,
}

#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    pub strip_cookies: bool,
    pub strip_auth_headers: bool,
    pub user_agent: String,
}

/// Performs GET requests with bounded manual redirect following and a
/// configured request-header policy.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    policy: HeaderPolicy,
    max_redirects: u8,
    max_bytes_per_page: Option<u64>,
}

impl Fetcher {
    pub fn new(client: Client, policy: HeaderPolicy, max_bytes_per_page: Option<u64>) -> Self {
        Self {
            client,
            policy,
            max_redirects: 10,
            max_bytes_per_page,
        }
    }

    fn build_request_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.policy.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("atlas-crawler")),
        );
        headers
    }

    /// Fetches `url`, following redirects up to `max_redirects`, capturing
    /// every hop. `keep_body` controls whether the final body is read (full
    /// raw mode may want to skip it if headers alone satisfy the replay tier).
    pub async fn fetch(&self, url: &str, keep_body: bool) -> Result<FetchedResponse, FetchError> {
        let start = Instant::now();
        let mut redirect_chain = Vec::new();
        let mut current_url = url.to_string();

        for _ in 0..=self.max_redirects {
            let mut request = self
                .client
                .get(&current_url)
                .headers(self.build_request_headers());
            if self.policy.strip_cookies {
                request = request.header(COOKIE, HeaderValue::from_static(""));
            }
            if self.policy.strip_auth_headers {
                request = request.header(AUTHORIZATION, HeaderValue::from_static(""));
            }

            let response = request
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(&current_url, e))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(|s| s.to_string());
                redirect_chain.push(RedirectHop {
                    url: current_url.clone(),
                    status,
                });
                match location {
                    Some(next) => {
                        current_url = resolve_relative(&current_url, &next);
                        continue;
                    }
                    None => {
                        return Err(FetchError::Protocol {
                            url: current_url,
                            message: "redirect status without Location header".to_string(),
                        })
                    }
                }
            }

            let headers: IndexMap<String, String> = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
                .collect();

            let body = if keep_body {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::from_reqwest(&current_url, e))?;
                if let Some(limit) = self.max_bytes_per_page {
                    if bytes.len() as u64 > limit {
                        return Err(FetchError::Truncated { url: current_url });
                    }
                }
                Some(bytes.to_vec())
            } else {
                None
            };

            return Ok(FetchedResponse {
                final_url: current_url,
                status,
                headers,
                body,
                redirect_chain,
                timing: start.elapsed(),
            });
        }

        Err(FetchError::Protocol {
            url: current_url,
            message: format!("exceeded {} redirects", self.max_redirects),
        })
    }
}

fn resolve_relative(base: &str, location: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(location)) {
        Ok(joined) => joined.to_string(),
        Err(_) => location.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn policy() -> HeaderPolicy {
        HeaderPolicy {
            strip_cookies: true,
            strip_auth_headers: true,
            user_agent: "atlas-crawler-test".to_string(),
        }
    }

    #[test]
    fn resolves_relative_redirect_targets() {
        let resolved = resolve_relative("https://example.com/a/b", "/c");
        assert_eq!(resolved, "https://example.com/c");
    }

    #[tokio::test]
    async fn fetch_error_classifies_dns_failures() {
        let fetcher = Fetcher::new(Client::new(), policy(), None);
        let result = fetcher.fetch("https://this-domain-does-not-exist.invalid/", true).await;
        assert!(result.is_err());
    }
}
