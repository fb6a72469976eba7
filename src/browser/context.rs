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

//! The [BrowserContext] trait abstracts over one isolated browser session
//! (storage, cookies, viewport, user-agent). The `chrome` feature backs it
//! with `chromiumoxide`; without it, only raw mode (which never leases a
//! context) is usable.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
    pub source: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NetworkEvent {
    pub url: String,
    pub status: Option<u16>,
    pub bytes: u64,
    pub resource_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct NavigateOutcome {
    pub final_url: String,
    pub http_status: Option<u16>,
    pub title: Option<String>,
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),
    #[error("selector wait timed out after {0:?}")]
    SelectorTimeout(Duration),
    #[error("dom serialization failed: {0}")]
    DomSerialization(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("browser context crashed: {0}")]
    Crashed(String),
}

/// One isolated browser session: navigation, content capture, console and
/// network observation, cookie persistence.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<NavigateOutcome, BrowserError>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool, BrowserError>;

    async fn wait_for_network_idle(
        &self,
        max_in_flight: u32,
        quiet_for: Duration,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn content(&self) -> Result<String, BrowserError>;

    async fn accessibility_snapshot(&self) -> Result<serde_json::Value, BrowserError>;

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, BrowserError>;

    async fn computed_styles(&self, selectors: &[String]) -> Result<Vec<(String, indexmap::IndexMap<String, String>)>, BrowserError>;

    async fn drain_console(&self) -> Vec<ConsoleMessage>;

    async fn drain_network(&self) -> Vec<NetworkEvent>;

    async fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError>;

    async fn set_cookies(&self, cookies: &[(String, String)]) -> Result<(), BrowserError>;
}

#[cfg(feature = "chrome")]
pub mod chrome_impl {
    use super::*;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::network::{self, CookieParam};
    use chromiumoxide::handler::viewport::Viewport;
    use chromiumoxide::Page;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// One launched Chromium process plus a single active page, behind the
    /// `chrome` feature.
    pub struct ChromiumContext {
        _browser: Browser,
        page: Page,
        in_flight: Arc<AtomicI64>,
        console: Arc<Mutex<Vec<ConsoleMessage>>>,
        network: Arc<Mutex<Vec<NetworkEvent>>>,
    }

    impl ChromiumContext {
        pub async fn launch(user_agent: &str, width: u32, height: u32) -> Result<Self, BrowserError> {
            let config = BrowserConfig::builder()
                .new_headless_mode()
                .viewport(Viewport {
                    width,
                    height,
                    device_scale_factor: Some(1.0),
                    emulating_mobile: false,
                    is_landscape: false,
                    has_touch: false,
                })
                .args(vec![
                    "--disable-gpu".to_string(),
                    "--no-first-run".to_string(),
                    format!("--user-agent={user_agent}"),
                ])
                .build()
                .map_err(|e| BrowserError::Launch(e.to_string()))?;

            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| BrowserError::Launch(e.to_string()))?;
            tokio::spawn(async move { while handler.next().await.is_some() {} });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;

            page.execute(network::EnableParams::default())
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;

            let in_flight = Arc::new(AtomicI64::new(0));
            let console = Arc::new(Mutex::new(Vec::new()));
            let network_log = Arc::new(Mutex::new(Vec::new()));

            Self::spawn_network_tracker(&page, in_flight.clone(), network_log.clone()).await?;
            Self::spawn_console_tracker(&page, console.clone()).await?;

            Ok(Self {
                _browser: browser,
                page,
                in_flight,
                console,
                network: network_log,
            })
        }

        async fn spawn_network_tracker(
            page: &Page,
            in_flight: Arc<AtomicI64>,
            network_log: Arc<Mutex<Vec<NetworkEvent>>>,
        ) -> Result<(), BrowserError> {
            let mut will_send = page
                .event_listener::<network::EventRequestWillBeSent>()
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            let flight_for_send = in_flight.clone();
            let log_for_send = network_log.clone();
            tokio::spawn(async move {
                while let Some(event) = will_send.next().await {
                    flight_for_send.fetch_add(1, Ordering::Relaxed);
                    log_for_send.lock().await.push(NetworkEvent {
                        url: event.request.url.clone(),
                        status: None,
                        bytes: 0,
                        resource_type: format!("{:?}", event.r#type).to_ascii_lowercase(),
                    });
                }
            });

            let mut finished = page
                .event_listener::<network::EventLoadingFinished>()
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            let flight_for_finish = in_flight.clone();
            tokio::spawn(async move {
                while finished.next().await.is_some() {
                    flight_for_finish.fetch_sub(1, Ordering::Relaxed);
                }
            });

            let mut failed = page
                .event_listener::<network::EventLoadingFailed>()
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            tokio::spawn(async move {
                while failed.next().await.is_some() {
                    in_flight.fetch_sub(1, Ordering::Relaxed);
                }
            });

            Ok(())
        }

        async fn spawn_console_tracker(
            page: &Page,
            console: Arc<Mutex<Vec<ConsoleMessage>>>,
        ) -> Result<(), BrowserError> {
            use chromiumoxide::cdp::browser_protocol::log as cdp_log;
            page.execute(cdp_log::EnableParams::default())
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            let mut entries = page
                .event_listener::<cdp_log::EventEntryAdded>()
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            tokio::spawn(async move {
                while let Some(event) = entries.next().await {
                    console.lock().await.push(ConsoleMessage {
                        level: format!("{:?}", event.entry.level).to_ascii_lowercase(),
                        text: event.entry.text.clone(),
                        source: Some(format!("{:?}", event.entry.source)),
                        location: event.entry.url.clone(),
                    });
                }
            });
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserContext for ChromiumContext {
        async fn navigate(&self, url: &str, timeout: Duration) -> Result<NavigateOutcome, BrowserError> {
            let nav = self.page.goto(url);
            match tokio::time::timeout(timeout, nav).await {
                Ok(Ok(_)) => {
                    let title = self.page.get_title().await.ok().flatten();
                    Ok(NavigateOutcome {
                        final_url: self.page.url().await.ok().flatten().unwrap_or_else(|| url.to_string()),
                        http_status: None,
                        title,
                    })
                }
                Ok(Err(e)) => Err(BrowserError::Navigation(e.to_string())),
                Err(_) => Err(BrowserError::NavigationTimeout(timeout)),
            }
        }

        async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool, BrowserError> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return Ok(true);
                }
                if tokio::time::Instant::now() >= deadline {
                    return Ok(false);
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        async fn wait_for_network_idle(
            &self,
            max_in_flight: u32,
            quiet_for: Duration,
            timeout: Duration,
        ) -> Result<(), BrowserError> {
            let deadline = tokio::time::Instant::now() + timeout;
            let mut idle_since: Option<tokio::time::Instant> = None;
            loop {
                let now = tokio::time::Instant::now();
                if now > deadline {
                    return Err(BrowserError::NavigationTimeout(timeout));
                }
                let in_flight = self.in_flight.load(Ordering::Relaxed).max(0) as u32;
                if in_flight <= max_in_flight {
                    let since = idle_since.get_or_insert(now);
                    if now.duration_since(*since) >= quiet_for {
                        return Ok(());
                    }
                } else {
                    idle_since = None;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }

        async fn content(&self) -> Result<String, BrowserError> {
            self.page
                .content()
                .await
                .map_err(|e| BrowserError::DomSerialization(e.to_string()))
        }

        async fn accessibility_snapshot(&self) -> Result<serde_json::Value, BrowserError> {
            use chromiumoxide::cdp::browser_protocol::accessibility::GetFullAxTreeParams;
            let tree = self
                .page
                .execute(GetFullAxTreeParams::default())
                .await
                .map_err(|e| BrowserError::DomSerialization(e.to_string()))?;
            serde_json::to_value(&tree.result.nodes)
                .map_err(|e| BrowserError::DomSerialization(e.to_string()))
        }

        async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>, BrowserError> {
            use chromiumoxide::page::ScreenshotParams;
            self.page
                .screenshot(ScreenshotParams::builder().full_page(full_page).build())
                .await
                .map_err(|e| BrowserError::Screenshot(e.to_string()))
        }

        async fn computed_styles(
            &self,
            selectors: &[String],
        ) -> Result<Vec<(String, indexmap::IndexMap<String, String>)>, BrowserError> {
            let mut out = Vec::with_capacity(selectors.len());
            for selector in selectors {
                let script = format!(
                    "(() => {{ const el = document.querySelector({selector:?}); if (!el) return null; const cs = getComputedStyle(el); const out = {{}}; for (const prop of ['color','font-size','font-family','display','position']) {{ out[prop] = cs.getPropertyValue(prop); }} return out; }})()"
                );
                if let Ok(result) = self.page.evaluate(script.as_str()).await {
                    if let Ok(map) = result.into_value::<indexmap::IndexMap<String, String>>() {
                        out.push((selector.clone(), map));
                    }
                }
            }
            Ok(out)
        }

        async fn drain_console(&self) -> Vec<ConsoleMessage> {
            std::mem::take(&mut *self.console.lock().await)
        }

        async fn drain_network(&self) -> Vec<NetworkEvent> {
            std::mem::take(&mut *self.network.lock().await)
        }

        async fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError> {
            let cookies = self
                .page
                .get_cookies()
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            Ok(cookies.into_iter().map(|c| (c.name, c.value)).collect())
        }

        async fn set_cookies(&self, cookies: &[(String, String)]) -> Result<(), BrowserError> {
            let params: Vec<CookieParam> = cookies
                .iter()
                .map(|(name, value)| CookieParam::new(name.clone(), value.clone()))
                .collect();
            self.page
                .set_cookies(params)
                .await
                .map_err(|e| BrowserError::Crashed(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(feature = "chrome")]
pub use chrome_impl::ChromiumContext;

#[cfg(test)]
pub mod fake {
    use super::*;
    use tokio::sync::Mutex;

    /// An in-memory fake used by renderer/extractor tests so they do not
    /// require the `chrome` feature or a real Chromium install.
    pub struct InMemoryBrowserContext {
        pub html: String,
        pub console: Mutex<Vec<ConsoleMessage>>,
    }

    impl InMemoryBrowserContext {
        pub fn new(html: impl Into<String>) -> Self {
            Self {
                html: html.into(),
                console: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BrowserContext for InMemoryBrowserContext {
        async fn navigate(&self, url: &str, _timeout: Duration) -> Result<NavigateOutcome, BrowserError> {
            Ok(NavigateOutcome {
                final_url: url.to_string(),
                http_status: Some(200),
                title: None,
            })
        }

        async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<bool, BrowserError> {
            Ok(true)
        }

        async fn wait_for_network_idle(
            &self,
            _max_in_flight: u32,
            _quiet_for: Duration,
            _timeout: Duration,
        ) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn content(&self) -> Result<String, BrowserError> {
            Ok(self.html.clone())
        }

        async fn accessibility_snapshot(&self) -> Result<serde_json::Value, BrowserError> {
            Ok(serde_json::json!([]))
        }

        async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>, BrowserError> {
            Ok(Vec::new())
        }

        async fn computed_styles(
            &self,
            _selectors: &[String],
        ) -> Result<Vec<(String, indexmap::IndexMap<String, String>)>, BrowserError> {
            Ok(Vec::new())
        }

        async fn drain_console(&self) -> Vec<ConsoleMessage> {
            std::mem::take(&mut *self.console.lock().await)
        }

        async fn drain_network(&self) -> Vec<NetworkEvent> {
            Vec::new()
        }

        async fn cookies(&self) -> Result<Vec<(String, String)>, BrowserError> {
            Ok(Vec::new())
        }

        async fn set_cookies(&self, _cookies: &[(String, String)]) -> Result<(), BrowserError> {
            Ok(())
        }
    }
}
