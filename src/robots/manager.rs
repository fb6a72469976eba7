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

//! Robots Evaluator: decides allow/deny for a (URL, user-agent)
//! pair, caching the parsed robots.txt per origin for the lifetime of the run.

use crate::data::robots_event::{RobotsDecision, RobotsDecisionEvent};
use crate::robots::cached::CachedRobots;
use crate::robots::error::RobotsError;
use crate::url::{Origin, UrlWithDepth};
use reqwest::Client;
use std::sync::Arc;
use texting_robots::{get_robots_url, Robot};
use time::OffsetDateTime;

/// Decides whether `url` may be fetched under `agent`, fetching and caching
/// robots.txt for the origin on first use. `override_robots` implements the
/// spec's "override" decision: allow, but `override_used = true` is recorded.
pub struct RobotsEvaluator {
    client: Client,
    agent: String,
    override_robots: bool,
    cache: moka::future::Cache<Origin, Arc<CachedRobots>>,
}

impl RobotsEvaluator {
    pub fn new(client: Client, agent: String, override_robots: bool) -> Self {
        Self {
            client,
            agent,
            override_robots,
            cache: moka::future::Cache::new(10_000),
        }
    }

    async fn fetch_and_cache(&self, origin: &Origin, url: &UrlWithDepth) -> Arc<CachedRobots> {
        let retrieved_at = OffsetDateTime::now_utc();
        let robots_url = match get_robots_url(&url.normalized.normalized_url) {
            Ok(u) => u,
            Err(_) => {
                let cached = Arc::new(CachedRobots::NoRobots { retrieved_at });
                self.cache.insert(origin.clone(), cached.clone()).await;
                return cached;
            }
        };

        let response = self.client.get(&robots_url).send().await;
        let cached = match response {
            Ok(resp) if resp.status().is_client_error() => {
                // 4xx: treated as "no robots, allow".
                CachedRobots::NoRobots { retrieved_at }
            }
            Ok(resp) if resp.status().is_server_error() => {
                // 5xx: "unknown, allow but warn".
                CachedRobots::Unknown { retrieved_at }
            }
            Ok(resp) => match resp.bytes().await {
                Ok(bytes) => match Robot::new(&self.agent, bytes.as_ref()) {
                    Ok(robot) => CachedRobots::HasRobots {
                        robot: Arc::new(robot),
                        retrieved_at,
                    },
                    Err(_) => CachedRobots::Unknown { retrieved_at },
                },
                Err(_) => CachedRobots::Unknown { retrieved_at },
            },
            Err(_) => CachedRobots::Unknown { retrieved_at },
        };

        let cached = Arc::new(cached);
        self.cache.insert(origin.clone(), cached.clone()).await;
        cached
    }

    /// Evaluates `url` and returns both the decision and its structured event
    /// Recorded as a Robots decision event.
    pub async fn evaluate(&self, url: &UrlWithDepth) -> Result<RobotsDecisionEvent, RobotsError> {
        let origin =
            Origin::from_url(&url::Url::parse(&url.normalized.normalized_url).unwrap())
                .ok_or(RobotsError::NoDomainForUrl)?;

        let cached = match self.cache.get(&origin).await {
            Some(found) => found,
            None => self.fetch_and_cache(&origin, url).await,
        };

        let path_and_query = url::Url::parse(&url.normalized.normalized_url)
            .map(|u| {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            })
            .unwrap_or_else(|_| "/".to_string());

        let allowed_by_file = cached.is_allowed(&path_and_query);

        let (decision, reason, override_used) = if allowed_by_file {
            (RobotsDecision::Allowed, "robots.txt allows".to_string(), false)
        } else if self.override_robots {
            (
                RobotsDecision::Allowed,
                "disallowed by robots.txt, override enabled".to_string(),
                true,
            )
        } else {
            (
                RobotsDecision::Disallowed,
                "disallowed by robots.txt".to_string(),
                false,
            )
        };

        if cached.emitted_warning() {
            log::warn!("robots.txt for {origin} could not be retrieved reliably; allowing with warning");
        }

        Ok(RobotsDecisionEvent {
            url: url.normalized.normalized_url.clone(),
            decision,
            reason,
            user_agent: self.agent.clone(),
            override_used,
            occurred_at: OffsetDateTime::now_utc(),
        })
    }

    /// Crawl-delay override for the Rate Governor: `min(rps, 1/crawl_delay)`.
    pub async fn crawl_delay_for(&self, origin: &Origin) -> Option<f32> {
        self.cache.get(origin).await.and_then(|c| c.crawl_delay())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::url::ParamPolicy;

    #[tokio::test]
    async fn allows_when_no_robots_reachable() {
        // No network in unit tests: construct a client pointed nowhere and rely on
        // the fetch failing into `Unknown`, which still allows the request.
        let client = Client::new();
        let evaluator = RobotsEvaluator::new(client, "test-agent".to_string(), false);
        let url = UrlWithDepth::from_seed("https://example.invalid/page", ParamPolicy::Keep).unwrap();
        let decision = evaluator.evaluate(&url).await.unwrap();
        assert_eq!(decision.decision, RobotsDecision::Allowed);
    }
}
