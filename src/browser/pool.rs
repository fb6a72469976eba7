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

//! Browser Pool: pool size = concurrency; contexts are
//! ephemeral by default or per-origin-persistent when session persistence is
//! enabled. Raw mode never calls into this module at all.

use crate::browser::context::{BrowserContext, BrowserError};
use crate::cookies::{self, CookieJar};
use crate::url::Origin;
use moka::future::Cache;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A leased context; dropping it frees the pool's concurrency slot. The
/// context itself is kept alive afterwards only in persistent mode (it
/// remains in the pool's per-origin cache).
pub struct BrowserLease {
    pub context: Arc<dyn BrowserContext>,
    _permit: OwnedSemaphorePermit,
}

pub struct BrowserPool {
    concurrency: Arc<Semaphore>,
    persistent: bool,
    user_agent: String,
    viewport: (u32, u32),
    persistent_contexts: Cache<Origin, Arc<dyn BrowserContext>>,
    cookie_jar: Option<Arc<CookieJar>>,
}

impl BrowserPool {
    pub fn new(concurrency: usize, persistent: bool, user_agent: String, viewport: (u32, u32)) -> Self {
        Self {
            concurrency: Arc::new(Semaphore::new(concurrency)),
            persistent,
            user_agent,
            viewport,
            persistent_contexts: Cache::new(10_000),
            cookie_jar: None,
        }
    }

    /// Enables cross-lease cookie continuity for `session.persist_session`:
    /// every leased context is seeded from the jar, and [Self::persist_cookies]
    /// writes its cookies back after use.
    pub fn with_cookie_jar(mut self, jar: Arc<CookieJar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    #[cfg(feature = "chrome")]
    async fn launch_context(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        use crate::browser::context::ChromiumContext;
        let ctx = ChromiumContext::launch(&self.user_agent, self.viewport.0, self.viewport.1).await?;
        Ok(Arc::new(ctx))
    }

    #[cfg(not(feature = "chrome"))]
    async fn launch_context(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        Err(BrowserError::Launch(
            "prerender/full render modes require the `chrome` feature".to_string(),
        ))
    }

    /// Acquires a concurrency slot and returns a context for `origin`. In
    /// persistent mode the same context is reused across leases for the same
    /// origin; otherwise a fresh ephemeral context is launched every time.
    pub async fn lease(&self, origin: &Origin) -> Result<BrowserLease, BrowserError> {
        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("browser pool semaphore never closed");

        let context = if self.persistent {
            if let Some(existing) = self.persistent_contexts.get(origin).await {
                existing
            } else {
                let ctx = self.launch_context().await?;
                self.persistent_contexts.insert(origin.clone(), ctx.clone()).await;
                ctx
            }
        } else {
            self.launch_context().await?
        };

        if let Some(jar) = &self.cookie_jar {
            if let Some(header) = jar.get(origin) {
                let pairs = cookies::decode(&header);
                if !pairs.is_empty() {
                    let _ = context.set_cookies(&pairs).await;
                }
            }
        }

        Ok(BrowserLease {
            context,
            _permit: permit,
        })
    }

    /// Reads `context`'s current cookies back into the jar under `origin`, so
    /// the next lease for that origin (even an ephemeral one) picks them up.
    pub async fn persist_cookies(&self, origin: &Origin, context: &Arc<dyn BrowserContext>) {
        let Some(jar) = &self.cookie_jar else { return };
        if let Ok(pairs) = context.cookies().await {
            if !pairs.is_empty() {
                jar.set(origin.clone(), cookies::encode(&pairs));
            }
        }
    }

    pub fn available(&self) -> usize {
        self.concurrency.available_permits()
    }
}
