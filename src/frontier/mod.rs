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

//! Frontier: the single guarded owner of pending URLs,
//! de-duplicated by url_key, ordered breadth-first by depth and FIFO within
//! a depth (one logical owner; all admit/pop pass through a
//! single guarded interface").

pub mod error;

pub use error::AdmitRejection;

use crate::config::LimitsConfig;
use crate::ids::PageId;
use crate::url::UrlWithDepth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmitOutcome {
    pub admitted: bool,
    pub page_id: PageId,
    pub rejection: Option<AdmitRejection>,
}

#[derive(Debug, Clone)]
pub struct PoppedUrl {
    pub url: UrlWithDepth,
    pub page_id: PageId,
}

/// A frontier entry stripped of anything not needed for ordering/dedup, so
/// the snapshot is small and deterministic to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueuedEntry {
    raw_url: String,
    param_policy: crate::url::ParamPolicy,
    depth: u32,
    discovered_from: Option<PageId>,
    discovery_source: crate::url::DiscoverySource,
    page_id: PageId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierSnapshot {
    pub visited: HashMap<String, PageId>,
    pub queued: Vec<(u32, Vec<QueuedEntry>)>,
    pub admitted_count: u64,
}

struct Inner {
    visited: HashMap<String, PageId>,
    by_depth: BTreeMap<u32, VecDeque<QueuedEntry>>,
    admitted_count: u64,
}

/// The frontier's single guarded interface; `admit`/`pop` are the only ways
/// in or out, so no two workers can ever be handed the same url_key.
pub struct Frontier {
    inner: Mutex<Inner>,
    max_depth: i64,
    max_pages: u64,
}

impl Frontier {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                visited: HashMap::new(),
                by_depth: BTreeMap::new(),
                admitted_count: 0,
            }),
            max_depth: limits.max_depth,
            max_pages: limits.max_pages,
        }
    }

    fn depth_allowed(&self, depth: u32) -> bool {
        if self.max_depth < 0 {
            true
        } else {
            (depth as i64) <= self.max_depth
        }
    }

    pub async fn admit(&self, url: &UrlWithDepth) -> AdmitOutcome {
        let mut inner = self.inner.lock().await;
        let key = url.url_key().to_string();

        if let Some(existing) = inner.visited.get(&key) {
            return AdmitOutcome {
                admitted: false,
                page_id: *existing,
                rejection: None,
            };
        }

        if !self.depth_allowed(url.depth) {
            return AdmitOutcome {
                admitted: false,
                page_id: PageId::new(),
                rejection: Some(AdmitRejection::DepthExceeded),
            };
        }

        if self.max_pages > 0 && inner.admitted_count >= self.max_pages {
            return AdmitOutcome {
                admitted: false,
                page_id: PageId::new(),
                rejection: Some(AdmitRejection::PageCapReached),
            };
        }

        let page_id = PageId::new();
        inner.visited.insert(key, page_id);
        inner.admitted_count += 1;
        inner
            .by_depth
            .entry(url.depth)
            .or_default()
            .push_back(QueuedEntry {
                raw_url: url.raw.clone(),
                param_policy: crate::url::ParamPolicy::default(),
                depth: url.depth,
                discovered_from: url.discovered_from,
                discovery_source: url.discovery_source,
                page_id,
            });

        AdmitOutcome {
            admitted: true,
            page_id,
            rejection: None,
        }
    }

    /// Pops the earliest-queued entry at the lowest pending depth
    /// (breadth-first by depth, FIFO within a depth).
    pub async fn pop(&self) -> Option<PoppedUrl> {
        let mut inner = self.inner.lock().await;
        let lowest_depth = *inner.by_depth.keys().next()?;
        let queue = inner.by_depth.get_mut(&lowest_depth)?;
        let entry = queue.pop_front()?;
        if queue.is_empty() {
            inner.by_depth.remove(&lowest_depth);
        }
        let url = UrlWithDepth::new(
            entry.raw_url,
            entry.param_policy,
            entry.depth,
            entry.discovered_from,
            entry.discovery_source,
        )
        .expect("previously-normalized url must re-normalize");
        Some(PoppedUrl {
            url,
            page_id: entry.page_id,
        })
    }

    pub async fn size(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.by_depth.values().map(|q| q.len()).sum()
    }

    pub async fn admitted_count(&self) -> u64 {
        self.inner.lock().await.admitted_count
    }

    pub async fn snapshot(&self) -> FrontierSnapshot {
        let inner = self.inner.lock().await;
        FrontierSnapshot {
            visited: inner.visited.clone(),
            queued: inner
                .by_depth
                .iter()
                .map(|(depth, q)| (*depth, q.iter().cloned().collect()))
                .collect(),
            admitted_count: inner.admitted_count,
        }
    }

    pub async fn restore(&self, snapshot: FrontierSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.visited = snapshot.visited;
        inner.admitted_count = snapshot.admitted_count;
        inner.by_depth = snapshot
            .queued
            .into_iter()
            .map(|(depth, entries)| (depth, entries.into_iter().collect()))
            .collect();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::LimitsConfig;
    use crate::url::{DiscoverySource, ParamPolicy};

    fn seed(url: &str, depth: u32) -> UrlWithDepth {
        UrlWithDepth::new(url, ParamPolicy::Keep, depth, None, DiscoverySource::Seed).unwrap()
    }

    #[tokio::test]
    async fn dedup_by_url_key_returns_same_page_id() {
        let frontier = Frontier::new(&LimitsConfig::default());
        let first = frontier.admit(&seed("https://example.com/a", 0)).await;
        let second = frontier.admit(&seed("https://example.com/a", 0)).await;
        assert!(first.admitted);
        assert!(!second.admitted);
        assert_eq!(first.page_id, second.page_id);
    }

    #[tokio::test]
    async fn pops_breadth_first_by_depth() {
        let frontier = Frontier::new(&LimitsConfig::default());
        frontier.admit(&seed("https://example.com/deep", 2)).await;
        frontier.admit(&seed("https://example.com/shallow", 0)).await;
        frontier.admit(&seed("https://example.com/mid", 1)).await;

        let first = frontier.pop().await.unwrap();
        let second = frontier.pop().await.unwrap();
        let third = frontier.pop().await.unwrap();
        assert_eq!(first.url.depth, 0);
        assert_eq!(second.url.depth, 1);
        assert_eq!(third.url.depth, 2);
        assert!(frontier.pop().await.is_none());
    }

    #[tokio::test]
    async fn rejects_beyond_max_depth() {
        let limits = LimitsConfig {
            max_depth: 1,
            ..Default::default()
        };
        let frontier = Frontier::new(&limits);
        let outcome = frontier.admit(&seed("https://example.com/too-deep", 2)).await;
        assert!(!outcome.admitted);
        assert_eq!(outcome.rejection, Some(AdmitRejection::DepthExceeded));
    }

    #[tokio::test]
    async fn rejects_past_page_cap() {
        let limits = LimitsConfig {
            max_pages: 1,
            ..Default::default()
        };
        let frontier = Frontier::new(&limits);
        let first = frontier.admit(&seed("https://example.com/a", 0)).await;
        let second = frontier.admit(&seed("https://example.com/b", 0)).await;
        assert!(first.admitted);
        assert!(!second.admitted);
        assert_eq!(second.rejection, Some(AdmitRejection::PageCapReached));
    }

    #[tokio::test]
    async fn snapshot_and_restore_round_trip() {
        let frontier = Frontier::new(&LimitsConfig::default());
        frontier.admit(&seed("https://example.com/a", 0)).await;
        frontier.admit(&seed("https://example.com/b", 1)).await;
        let snapshot = frontier.snapshot().await;

        let restored = Frontier::new(&LimitsConfig::default());
        restored.restore(snapshot).await;
        assert_eq!(restored.size().await, 2);
        assert_eq!(restored.admitted_count().await, 2);

        let dup = restored.admit(&seed("https://example.com/a", 0)).await;
        assert!(!dup.admitted);
    }
}
