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

//! Rate Governor: per-origin token-bucket rate limiting plus a
//! global concurrency semaphore. A worker must acquire both before issuing a
//! fetch.

use crate::checkpoint::OriginRateState;
use crate::robots::RobotsEvaluator;
use crate::url::Origin;
use indexmap::IndexMap;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: OffsetDateTime,
}

impl TokenBucket {
    fn new(rps: f64) -> Self {
        let capacity = rps.max(1.0);
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: rps,
            last_refill: OffsetDateTime::now_utc(),
        }
    }

    /// Rebuilds a bucket from a checkpointed [OriginRateState], preserving
    /// the token count and last-refill instant across a resume.
    fn from_state(rps: f64, state: &OriginRateState) -> Self {
        let capacity = rps.max(1.0);
        let last_refill = OffsetDateTime::from_unix_timestamp_nanos(
            state.last_refill_ms as i128 * 1_000_000,
        )
        .unwrap_or_else(|_| OffsetDateTime::now_utc());
        Self {
            capacity,
            tokens: state.tokens.min(capacity),
            refill_per_sec: rps,
            last_refill,
        }
    }

    fn set_rate(&mut self, rps: f64) {
        self.refill_per_sec = rps;
        self.capacity = rps.max(1.0);
        if self.tokens > self.capacity {
            self.tokens = self.capacity;
        }
    }

    fn refill(&mut self) {
        let now = OffsetDateTime::now_utc();
        let elapsed = (now - self.last_refill).as_seconds_f64().max(0.0);
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Returns `Some(wait)` if a token isn't available yet, `None` if one was
    /// taken immediately.
    fn try_take(&mut self) -> Option<Duration> {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            let wait_secs = if self.refill_per_sec > 0.0 {
                deficit / self.refill_per_sec
            } else {
                f64::MAX
            };
            Some(Duration::from_secs_f64(wait_secs))
        }
    }
}

/// Held by a worker for the duration of one fetch; releasing it (on drop)
/// frees the global concurrency slot.
pub struct RateLease {
    _permit: OwnedSemaphorePermit,
}

/// Enforces global concurrency N and per-origin requests/second R, with
/// robots.txt `Crawl-delay` overriding R downward for that origin
/// (`min(R, 1/crawl_delay)`).
pub struct RateGovernor {
    default_rps: f64,
    concurrency: Arc<Semaphore>,
    buckets: Cache<Origin, Arc<Mutex<TokenBucket>>>,
    robots: Arc<RobotsEvaluator>,
}

impl RateGovernor {
    pub fn new(default_rps: f64, concurrency: usize, robots: Arc<RobotsEvaluator>) -> Self {
        Self {
            default_rps,
            concurrency: Arc::new(Semaphore::new(concurrency)),
            buckets: Cache::new(10_000),
            robots,
        }
    }

    async fn bucket_for(&self, origin: &Origin) -> Arc<Mutex<TokenBucket>> {
        if let Some(existing) = self.buckets.get(origin).await {
            return existing;
        }
        let bucket = Arc::new(Mutex::new(TokenBucket::new(self.default_rps)));
        self.buckets.insert(origin.clone(), bucket.clone()).await;
        bucket
    }

    /// Blocks until both a concurrency slot and a per-origin rate token are
    /// available, applying the robots.txt crawl-delay override if one is
    /// known for `origin`.
    pub async fn acquire(&self, origin: &Origin) -> RateLease {
        let permit = self
            .concurrency
            .clone()
            .acquire_owned()
            .await
            .expect("concurrency semaphore never closed");

        let bucket = self.bucket_for(origin).await;
        if let Some(crawl_delay) = self.robots.crawl_delay_for(origin).await {
            if crawl_delay > 0.0 {
                let mut guard = bucket.lock().await;
                let capped = self.default_rps.min(1.0 / crawl_delay as f64);
                guard.set_rate(capped);
            }
        }

        loop {
            let wait = {
                let mut guard = bucket.lock().await;
                guard.try_take()
            };
            match wait {
                None => break,
                Some(duration) => tokio::time::sleep(duration).await,
            }
        }

        RateLease { _permit: permit }
    }

    pub fn available_concurrency(&self) -> usize {
        self.concurrency.available_permits()
    }

    /// Snapshots every known origin's bucket state for checkpointing.
    pub async fn export_state(&self) -> IndexMap<String, OriginRateState> {
        let mut out = IndexMap::new();
        for (origin, bucket) in self.buckets.iter() {
            let guard = bucket.lock().await;
            out.insert(
                origin.to_string(),
                OriginRateState {
                    tokens: guard.tokens,
                    last_refill_ms: (guard.last_refill.unix_timestamp_nanos() / 1_000_000) as i64,
                },
            );
        }
        out
    }

    /// Reseeds per-origin buckets from a checkpoint's rate state, so a
    /// resumed crawl does not burst past the configured rate for origins it
    /// had already been throttling.
    pub async fn restore_state(&self, state: &IndexMap<String, OriginRateState>) {
        for (origin_key, origin_state) in state {
            let origin = Origin::from_key(origin_key);
            let bucket = Arc::new(Mutex::new(TokenBucket::from_state(self.default_rps, origin_state)));
            self.buckets.insert(origin, bucket).await;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::url::Origin;
    use reqwest::Client;

    #[tokio::test]
    async fn acquires_immediately_under_capacity() {
        let robots = Arc::new(RobotsEvaluator::new(Client::new(), "test-agent".into(), false));
        let governor = RateGovernor::new(100.0, 4, robots);
        let origin = Origin::from_url(&url::Url::parse("https://example.com/").unwrap()).unwrap();
        let _lease = governor.acquire(&origin).await;
        assert_eq!(governor.available_concurrency(), 3);
    }

    #[tokio::test]
    async fn token_bucket_throttles_bursts() {
        let mut bucket = TokenBucket::new(1.0);
        assert!(bucket.try_take().is_none());
        assert!(bucket.try_take().is_some());
    }
}
