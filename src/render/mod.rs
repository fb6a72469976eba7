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

//! Renderer: executes the configured render mode and produces
//! a [RenderResult], detecting and waiting out challenge pages along the way.

pub mod challenge;
pub mod state;

pub use state::RenderState;

use crate::browser::{BrowserContext, BrowserError, BrowserPool};
use crate::config::RenderMode;
use crate::data::{ErrorCode, NavEndReason};
use crate::fetching::{FetchError, Fetcher};
use crate::url::Origin;
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(15);
const NETWORK_IDLE_MAX_IN_FLIGHT: u32 = 2;
const NETWORK_IDLE_QUIET_FOR: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("challenge page did not clear within {0:?}")]
    ChallengeUnresolved(Duration),
}

impl RenderError {
    pub fn code(&self) -> ErrorCode {
        match self {
            RenderError::Fetch(e) => e.code(),
            RenderError::Browser(BrowserError::NavigationTimeout(_)) => ErrorCode::NavTimeout,
            RenderError::Browser(BrowserError::SelectorTimeout(_)) => ErrorCode::WaitSelectorTimeout,
            RenderError::Browser(BrowserError::DomSerialization(_)) => ErrorCode::DomSerializationFailed,
            RenderError::Browser(_) => ErrorCode::BrowserCrashed,
            RenderError::ChallengeUnresolved(_) => ErrorCode::ChallengeDetected,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawRenderResult {
    pub html: Option<Vec<u8>>,
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub final_url: String,
    pub redirect_chain: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PrerenderRenderResult {
    pub html: String,
    pub title: Option<String>,
    pub accessibility: serde_json::Value,
    pub console: Vec<crate::browser::ConsoleMessage>,
    pub network: Vec<crate::browser::NetworkEvent>,
    pub final_url: String,
    /// The navigation's HTTP response status, when the browser surfaced one.
    pub http_status: Option<u16>,
}

#[derive(Debug, Clone, Default)]
pub struct FullRenderResult {
    pub prerender: PrerenderRenderResult,
    pub screenshot_desktop: Vec<u8>,
    pub screenshot_mobile: Vec<u8>,
    pub favicon: Option<Vec<u8>>,
    pub computed_styles: Vec<(String, IndexMap<String, String>)>,
}

#[derive(Debug, Clone)]
pub enum RenderResult {
    Raw(RawRenderResult),
    Prerender(PrerenderRenderResult),
    Full(FullRenderResult),
}

pub struct Renderer {
    fetcher: Fetcher,
    browser_pool: Option<Arc<BrowserPool>>,
    challenge_timeout: Duration,
}

const COMPUTED_STYLE_SELECTORS: &[&str] = &["body", "h1", "main", "article", "p"];

impl Renderer {
    pub fn new(fetcher: Fetcher, browser_pool: Option<Arc<BrowserPool>>) -> Self {
        Self {
            fetcher,
            browser_pool,
            challenge_timeout: DEFAULT_CHALLENGE_TIMEOUT,
        }
    }

    pub async fn render(
        &self,
        url: &str,
        origin: &Origin,
        mode: RenderMode,
        wait_selector: Option<&str>,
        nav_timeout: Duration,
    ) -> Result<(RenderResult, NavEndReason, Duration), RenderError> {
        let start = Instant::now();
        match mode {
            RenderMode::Raw => {
                let fetched = self.fetcher.fetch(url, true).await?;
                let result = RawRenderResult {
                    html: fetched.body,
                    status: fetched.status.as_u16(),
                    headers: fetched.headers,
                    final_url: fetched.final_url,
                    redirect_chain: fetched.redirect_chain.into_iter().map(|h| h.url).collect(),
                };
                Ok((RenderResult::Raw(result), NavEndReason::Fetch, start.elapsed()))
            }
            RenderMode::Prerender => {
                let (result, reason) = self
                    .render_prerender(url, origin, wait_selector, nav_timeout)
                    .await?;
                Ok((RenderResult::Prerender(result), reason, start.elapsed()))
            }
            RenderMode::Full => {
                let (prerender, reason) = self
                    .render_prerender(url, origin, wait_selector, nav_timeout)
                    .await?;
                let pool = self
                    .browser_pool
                    .as_ref()
                    .expect("full render mode requires a browser pool");
                let lease = pool.lease(origin).await?;
                lease
                    .context
                    .wait_for_network_idle(
                        NETWORK_IDLE_MAX_IN_FLIGHT,
                        NETWORK_IDLE_QUIET_FOR,
                        nav_timeout,
                    )
                    .await?;
                let screenshot_desktop = lease.context.screenshot(true).await?;
                let screenshot_mobile = lease.context.screenshot(false).await?;
                let computed_styles = lease
                    .context
                    .computed_styles(
                        &COMPUTED_STYLE_SELECTORS
                            .iter()
                            .map(|s| s.to_string())
                            .collect::<Vec<_>>(),
                    )
                    .await?;
                let favicon = self.fetch_favicon(&prerender.final_url).await;
                pool.persist_cookies(origin, &lease.context).await;

                let result = FullRenderResult {
                    prerender,
                    screenshot_desktop,
                    screenshot_mobile,
                    favicon,
                    computed_styles,
                };
                Ok((RenderResult::Full(result), reason, start.elapsed()))
            }
        }
    }

    async fn render_prerender(
        &self,
        url: &str,
        origin: &Origin,
        wait_selector: Option<&str>,
        nav_timeout: Duration,
    ) -> Result<(PrerenderRenderResult, NavEndReason), RenderError> {
        let pool = self
            .browser_pool
            .as_ref()
            .expect("prerender/full render modes require a browser pool");
        let lease = pool.lease(origin).await?;
        let context = lease.context.clone();

        let nav = context.navigate(url, nav_timeout).await?;
        let mut nav_end_reason = NavEndReason::Load;

        if let Some(selector) = wait_selector {
            let found = context.wait_for_selector(selector, nav_timeout).await?;
            nav_end_reason = if found {
                NavEndReason::Load
            } else {
                NavEndReason::Timeout
            };
        }

        let mut html = context.content().await?;
        if let Some(resolved) = self
            .resolve_challenge(context.as_ref(), nav.http_status, nav.title.as_deref(), &html)
            .await?
        {
            html = resolved;
        }

        let accessibility = context.accessibility_snapshot().await?;
        let console = context.drain_console().await;
        let network = context.drain_network().await;
        pool.persist_cookies(origin, &context).await;

        Ok((
            PrerenderRenderResult {
                html,
                title: nav.title,
                accessibility,
                console,
                network,
                final_url: nav.final_url,
                http_status: nav.http_status,
            },
            nav_end_reason,
        ))
    }

    /// Waits out a detected challenge page; returns the
    /// re-captured DOM once the signals clear, or an error if they never do.
    async fn resolve_challenge(
        &self,
        context: &dyn BrowserContext,
        status: Option<u16>,
        title: Option<&str>,
        html: &str,
    ) -> Result<Option<String>, RenderError> {
        let haystack = format!("{} {}", title.unwrap_or_default(), html);
        if !challenge::is_challenge_page(status, &haystack) {
            return Ok(None);
        }

        let deadline = Instant::now() + self.challenge_timeout;
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let refreshed = context.content().await?;
            if !challenge::is_challenge_page(status, &refreshed) {
                return Ok(Some(refreshed));
            }
            if Instant::now() >= deadline {
                return Err(RenderError::ChallengeUnresolved(self.challenge_timeout));
            }
        }
    }

    async fn fetch_favicon(&self, page_url: &str) -> Option<Vec<u8>> {
        let base = url::Url::parse(page_url).ok()?;
        let favicon_url = base.join("/favicon.ico").ok()?;
        let fetched = self.fetcher.fetch(favicon_url.as_str(), true).await.ok()?;
        if fetched.status.is_success() {
            fetched.body
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fetching::HeaderPolicy;

    fn fetcher() -> Fetcher {
        Fetcher::new(
            reqwest::Client::new(),
            HeaderPolicy {
                strip_cookies: true,
                strip_auth_headers: true,
                user_agent: "atlas-crawler-test".to_string(),
            },
            None,
        )
    }

    #[tokio::test]
    async fn raw_mode_needs_no_browser_pool() {
        let renderer = Renderer::new(fetcher(), None);
        let origin = Origin::from_url(&url::Url::parse("https://example.invalid/").unwrap()).unwrap();
        let result = renderer
            .render(
                "https://example.invalid/",
                &origin,
                RenderMode::Raw,
                None,
                Duration::from_millis(50),
            )
            .await;
        assert!(result.is_err(), "unreachable host should fail as a fetch error");
    }
}
