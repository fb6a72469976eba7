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

//! Scheduler: owns the worker pool that drains the Frontier, and wires every
//! other module together into the per-page pipeline (robots -> rate limit ->
//! render -> extract -> write -> discover). It is the only module that calls
//! into all the others.

pub mod events;

pub use events::{EventLog, SchedulerEvent};

use crate::blobstore::BlobStore;
use crate::checkpoint::{Checkpoint, Checkpointer};
use crate::config::{CrawlConfig, RenderMode, UrlFilterConfig, UrlFilterRule};
use crate::data::accessibility::{AuditEngine, AuditProfile};
use crate::data::asset::AssetRecord;
use crate::data::edge::EdgeRecord;
use crate::data::error_record::{ErrorCode, ErrorPhase, ErrorRecord};
use crate::data::page::{
    MediaRefs, NavEndReason, NetworkAggregation, PageRecord, RenderModeUsed, TimingBreakdown,
};
use crate::data::{AccessibilityRecord, ConsoleRecord, DatasetRecord, DomSnapshotRecord, StyleSampleRecord};
use crate::dataset::registry::WriterRegistry;
use crate::dataset::writer::WriterError;
use crate::extraction::{self, PageExtraction};
use crate::fetching::Fetcher;
use crate::frontier::{AdmitRejection, Frontier, PoppedUrl};
use crate::ids::{sha256_hex, AssetId, PageId};
use crate::rate::RateGovernor;
use crate::render::{FullRenderResult, PrerenderRenderResult, RawRenderResult, RenderError, RenderResult, Renderer};
use crate::robots::RobotsEvaluator;
use crate::schema::SchemaRegistry;
use crate::url::{DiscoverySource, Origin, ParamPolicy, UrlWithDepth};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Finalizing,
    Canceling,
    Done,
    Failed,
}

/// Why a run stopped. Precedence when more than one condition is true at
/// once: an exhausted error budget always wins, then an explicit page cap,
/// then an operator-requested cancellation, then ordinary exhaustion.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CompletionReason {
    ErrorBudget,
    Capped,
    Manual,
    Finished,
}

impl CompletionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionReason::ErrorBudget => "error_budget",
            CompletionReason::Capped => "capped",
            CompletionReason::Manual => "manual",
            CompletionReason::Finished => "finished",
        }
    }
}

pub struct SchedulerOutcome {
    pub completion_reason: CompletionReason,
    pub pages_written: u64,
    pub errors_emitted: u64,
    pub dataset_metas: Vec<crate::dataset::writer::DatasetMetadata>,
    pub warnings: Vec<String>,
    /// Set when a dataset write hit an unrecoverable I/O error (disk full,
    /// permission denied): the run stops early and this becomes a
    /// scheduler-fatal failure rather than an ordinary completion reason.
    pub fatal_writer_error: Option<crate::dataset::writer::WriterError>,
}

/// Lightweight, cloneable control surface for a running [Scheduler], since
/// `run()` consumes the scheduler by value to hand worker tasks their
/// `Arc`-shared state.
#[derive(Clone)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
}

impl SchedulerHandle {
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
    }

    pub fn state(&self) -> SchedulerState {
        if self.cancel.is_cancelled() {
            SchedulerState::Canceling
        } else if self.paused.load(Ordering::SeqCst) {
            SchedulerState::Paused
        } else {
            SchedulerState::Running
        }
    }
}

fn rule_matches(rule: &UrlFilterRule, candidate: &str) -> bool {
    if rule.is_regex {
        Regex::new(&rule.pattern)
            .map(|re| re.is_match(candidate))
            .unwrap_or(false)
    } else {
        candidate.contains(rule.pattern.as_str())
    }
}

/// Allow/deny URL filtering applied to every link discovered during a crawl.
/// Deny always wins; an empty allow list means "anything not denied".
fn url_passes_filter(filter: &UrlFilterConfig, candidate: &str) -> bool {
    if filter.deny.iter().any(|r| rule_matches(r, candidate)) {
        return false;
    }
    filter.allow.is_empty() || filter.allow.iter().any(|r| rule_matches(r, candidate))
}

fn render_mode_used(mode: RenderMode) -> RenderModeUsed {
    match mode {
        RenderMode::Raw => RenderModeUsed::Raw,
        RenderMode::Prerender => RenderModeUsed::Prerender,
        RenderMode::Full => RenderModeUsed::Full,
    }
}

/// The fields of a [RenderResult] that matter to the pipeline, flattened out
/// of its three render-mode variants so the rest of the worker doesn't need
/// to match on them repeatedly.
struct Rendered {
    html_bytes: Vec<u8>,
    html_str: String,
    http_status: u16,
    headers: IndexMap<String, String>,
    final_url: String,
    redirect_chain: Vec<String>,
    title: Option<String>,
    accessibility: Option<serde_json::Value>,
    console: Vec<crate::browser::ConsoleMessage>,
    network: Vec<crate::browser::NetworkEvent>,
    screenshot_desktop: Option<Vec<u8>>,
    screenshot_mobile: Option<Vec<u8>>,
    favicon: Option<Vec<u8>>,
    computed_styles: Vec<(String, IndexMap<String, String>)>,
}

fn flatten_render_result(result: RenderResult) -> Rendered {
    match result {
        RenderResult::Raw(RawRenderResult { html, status, headers, final_url, redirect_chain }) => {
            let html_bytes = html.unwrap_or_default();
            let content_type = headers.get("content-type").map(|s| s.as_str());
            let html_str = crate::decoding::decode_html(&html_bytes, content_type);
            Rendered {
                html_bytes,
                html_str,
                http_status: status,
                headers,
                final_url,
                redirect_chain,
                title: None,
                accessibility: None,
                console: Vec::new(),
                network: Vec::new(),
                screenshot_desktop: None,
                screenshot_mobile: None,
                favicon: None,
                computed_styles: Vec::new(),
            }
        }
        RenderResult::Prerender(PrerenderRenderResult { html, title, accessibility, console, network, final_url, http_status }) => {
            let html_bytes = html.as_bytes().to_vec();
            Rendered {
                html_bytes,
                html_str: html,
                http_status: http_status.unwrap_or(200),
                headers: IndexMap::new(),
                final_url,
                redirect_chain: Vec::new(),
                title,
                accessibility: Some(accessibility),
                console,
                network,
                screenshot_desktop: None,
                screenshot_mobile: None,
                favicon: None,
                computed_styles: Vec::new(),
            }
        }
        RenderResult::Full(FullRenderResult { prerender, screenshot_desktop, screenshot_mobile, favicon, computed_styles }) => {
            let html_bytes = prerender.html.as_bytes().to_vec();
            let http_status = prerender.http_status.unwrap_or(200);
            Rendered {
                html_bytes,
                html_str: prerender.html,
                http_status,
                headers: IndexMap::new(),
                final_url: prerender.final_url,
                redirect_chain: Vec::new(),
                title: prerender.title,
                accessibility: Some(prerender.accessibility),
                console: prerender.console,
                network: prerender.network,
                screenshot_desktop: Some(screenshot_desktop),
                screenshot_mobile: Some(screenshot_mobile),
                favicon,
                computed_styles,
            }
        }
    }
}

/// Orchestrates the full crawl: worker pool, per-page pipeline, checkpointing
/// and completion-reason bookkeeping. Constructed once per run by the
/// application layer, which owns assembling every dependency it wires
/// together.
pub struct Scheduler {
    config: CrawlConfig,
    frontier: Arc<Frontier>,
    robots: Arc<RobotsEvaluator>,
    rate: Arc<RateGovernor>,
    renderer: Arc<Renderer>,
    writers: Arc<WriterRegistry>,
    blobs: Arc<BlobStore>,
    checkpointer: Arc<Checkpointer>,
    events: Arc<EventLog>,
    fetcher: Arc<Fetcher>,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
    pages_written: Arc<AtomicU64>,
    errors_emitted: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    hit_page_cap: Arc<AtomicBool>,
    fatal_writer_error: Arc<Mutex<Option<crate::dataset::writer::WriterError>>>,
    started_at: OffsetDateTime,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CrawlConfig,
        frontier: Arc<Frontier>,
        robots: Arc<RobotsEvaluator>,
        rate: Arc<RateGovernor>,
        renderer: Arc<Renderer>,
        writers: Arc<WriterRegistry>,
        blobs: Arc<BlobStore>,
        checkpointer: Arc<Checkpointer>,
        events: Arc<EventLog>,
        fetcher: Arc<Fetcher>,
    ) -> Self {
        Self::resumed(
            config,
            frontier,
            robots,
            rate,
            renderer,
            writers,
            blobs,
            checkpointer,
            events,
            fetcher,
            0,
            0,
        )
    }

    /// Like [Scheduler::new], but seeded with counters carried over from a
    /// resumed checkpoint so the error budget and summary totals reflect the
    /// whole run rather than just the resumed tail.
    #[allow(clippy::too_many_arguments)]
    pub fn resumed(
        config: CrawlConfig,
        frontier: Arc<Frontier>,
        robots: Arc<RobotsEvaluator>,
        rate: Arc<RateGovernor>,
        renderer: Arc<Renderer>,
        writers: Arc<WriterRegistry>,
        blobs: Arc<BlobStore>,
        checkpointer: Arc<Checkpointer>,
        events: Arc<EventLog>,
        fetcher: Arc<Fetcher>,
        initial_pages_written: u64,
        initial_errors_emitted: u64,
    ) -> Self {
        Self {
            config,
            frontier,
            robots,
            rate,
            renderer,
            writers,
            blobs,
            checkpointer,
            events,
            fetcher,
            cancel: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
            pages_written: Arc::new(AtomicU64::new(initial_pages_written)),
            errors_emitted: Arc::new(AtomicU64::new(initial_errors_emitted)),
            in_flight: Arc::new(AtomicU64::new(0)),
            hit_page_cap: Arc::new(AtomicBool::new(false)),
            fatal_writer_error: Arc::new(Mutex::new(None)),
            started_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            cancel: self.cancel.clone(),
            paused: self.paused.clone(),
            resume_notify: self.resume_notify.clone(),
        }
    }

    /// Admits every seed, spawns `concurrency` workers, joins them, and
    /// finalizes every dataset writer.
    pub async fn run(self, seeds: Vec<String>) -> SchedulerOutcome {
        let mut admitted_seeds = 0usize;
        for seed in &seeds {
            if let Ok(url) = UrlWithDepth::from_seed(seed.clone(), self.config.param_policy) {
                let outcome = self.frontier.admit(&url).await;
                if outcome.admitted {
                    admitted_seeds += 1;
                }
            } else {
                log::warn!("seed url failed to normalize and was dropped: {seed}");
            }
        }
        if !self.config.ignore_sitemap {
            for seed in &seeds {
                self.discover_sitemap(seed).await;
            }
        }
        self.events.emit(&SchedulerEvent::Started { seed_count: admitted_seeds });

        let concurrency = self.config.limits.concurrency.get() as usize;
        let mut handles = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let worker = Worker {
                config: self.config.clone(),
                frontier: self.frontier.clone(),
                robots: self.robots.clone(),
                rate: self.rate.clone(),
                renderer: self.renderer.clone(),
                writers: self.writers.clone(),
                blobs: self.blobs.clone(),
                checkpointer: self.checkpointer.clone(),
                events: self.events.clone(),
                cancel: self.cancel.clone(),
                paused: self.paused.clone(),
                resume_notify: self.resume_notify.clone(),
                pages_written: self.pages_written.clone(),
                errors_emitted: self.errors_emitted.clone(),
                in_flight: self.in_flight.clone(),
                hit_page_cap: self.hit_page_cap.clone(),
                fatal_writer_error: self.fatal_writer_error.clone(),
                started_at: self.started_at,
            };
            handles.push(tokio::spawn(worker.run_loop()));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("scheduler worker task panicked: {e}");
            }
        }

        self.events.emit(&SchedulerEvent::Finalizing);
        let dataset_metas = match Arc::try_unwrap(self.writers) {
            Ok(writers) => writers.finalize_all().await.unwrap_or_else(|e| {
                log::error!("failed to finalize dataset writers: {e}");
                Vec::new()
            }),
            Err(_) => {
                log::error!("writer registry still has outstanding references at finalize time");
                Vec::new()
            }
        };

        let pages_written = self.pages_written.load(Ordering::SeqCst);
        let errors_emitted = self.errors_emitted.load(Ordering::SeqCst);
        let fatal_writer_error = self.fatal_writer_error.lock().await.take();
        let completion_reason = self.completion_reason(errors_emitted);
        self.events.emit(&SchedulerEvent::Completed {
            reason: completion_reason.as_str().to_string(),
            pages_written,
            errors_emitted,
        });
        if let Some(e) = &fatal_writer_error {
            self.events.emit(&SchedulerEvent::ShutdownReason {
                reason: format!("writer_fatal: {e}"),
            });
        }

        SchedulerOutcome {
            completion_reason,
            pages_written,
            errors_emitted,
            dataset_metas,
            warnings: Vec::new(),
            fatal_writer_error,
        }
    }

    /// Fetches `<origin>/sitemap.xml` and admits every listed URL at depth 1
    /// with [DiscoverySource::Sitemap], same as ordinary page discovery.
    /// A missing or unparsable sitemap is normal, not an error.
    async fn discover_sitemap(&self, seed: &str) {
        let Ok(seed_url) = url::Url::parse(seed) else { return };
        let Ok(sitemap_url) = seed_url.join("/sitemap.xml") else { return };
        let Ok(response) = self.fetcher.fetch(sitemap_url.as_str(), true).await else { return };
        let Some(body) = response.body else { return };

        let reader = sitemap::reader::SiteMapReader::new(std::io::Cursor::new(body));
        for entity in reader {
            let sitemap::reader::SiteMapEntity::Url(entry) = entity else { continue };
            let sitemap::structs::Location::Url(loc) = entry.loc else { continue };
            if !url_passes_filter(&self.config.url_filter, loc.as_str()) {
                continue;
            }
            let Ok(discovered) = UrlWithDepth::new(
                loc.to_string(),
                self.config.param_policy,
                1,
                None,
                DiscoverySource::Sitemap,
            ) else {
                continue;
            };
            let outcome = self.frontier.admit(&discovered).await;
            if outcome.admitted {
                self.events.emit(&SchedulerEvent::PageAdmitted {
                    url: discovered.normalized.normalized_url.clone(),
                    depth: discovered.depth,
                });
            }
        }
    }

    fn completion_reason(&self, errors_emitted: u64) -> CompletionReason {
        let budget = self.config.error_handling.max_errors;
        if budget >= 0 && errors_emitted > budget as u64 {
            CompletionReason::ErrorBudget
        } else if self.hit_page_cap.load(Ordering::SeqCst) {
            CompletionReason::Capped
        } else if self.cancel.is_cancelled() {
            CompletionReason::Manual
        } else {
            CompletionReason::Finished
        }
    }
}

/// Per-worker clone of every shared dependency. Cheap: everything here is an
/// `Arc` or `Copy`/small-`Clone` value.
struct Worker {
    config: CrawlConfig,
    frontier: Arc<Frontier>,
    robots: Arc<RobotsEvaluator>,
    rate: Arc<RateGovernor>,
    renderer: Arc<Renderer>,
    writers: Arc<WriterRegistry>,
    blobs: Arc<BlobStore>,
    checkpointer: Arc<Checkpointer>,
    events: Arc<EventLog>,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
    pages_written: Arc<AtomicU64>,
    errors_emitted: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    hit_page_cap: Arc<AtomicBool>,
    fatal_writer_error: Arc<Mutex<Option<WriterError>>>,
    started_at: OffsetDateTime,
}

const FRONTIER_POLL_INTERVAL: Duration = Duration::from_millis(50);

impl Worker {
    async fn run_loop(self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            while self.paused.load(Ordering::SeqCst) {
                self.resume_notify.notified().await;
                if self.cancel.is_cancelled() {
                    return;
                }
            }

            match self.frontier.pop().await {
                Some(popped) => {
                    self.in_flight.fetch_add(1, Ordering::SeqCst);
                    self.process_page(popped).await;
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);

                    if self.checkpointer.tick().await {
                        self.write_checkpoint().await;
                    }

                    let budget = self.config.error_handling.max_errors;
                    if budget >= 0 && self.errors_emitted.load(Ordering::SeqCst) > budget as u64 {
                        self.cancel.cancel();
                        return;
                    }
                }
                None => {
                    // Other workers may still be mid-page and about to admit new
                    // URLs; only stop once nobody is in flight and the frontier
                    // is still empty.
                    if self.in_flight.load(Ordering::SeqCst) == 0 && self.frontier.size().await == 0 {
                        return;
                    }
                    tokio::time::sleep(FRONTIER_POLL_INTERVAL).await;
                }
            }
        }
    }

    async fn write_checkpoint(&self) {
        let checkpoint = Checkpoint {
            frontier: self.frontier.snapshot().await,
            pages_written: self.pages_written.load(Ordering::SeqCst),
            errors_emitted: self.errors_emitted.load(Ordering::SeqCst),
            crawl_started_at: self.started_at,
            checkpointed_at: OffsetDateTime::now_utc(),
            dataset_record_counts: self.writers.record_counts().await,
            origin_rate_state: self.rate.export_state().await,
        };
        if let Err(e) = self.checkpointer.write(&checkpoint) {
            log::warn!("checkpoint write failed: {e}");
        } else {
            self.events.emit(&SchedulerEvent::Checkpointed {
                pages_admitted: checkpoint.frontier.admitted_count,
            });
        }
    }

    /// Writes `record` through the shared registry, emitting a `PartRotated`
    /// event if this write rotated a part, and escalating an I/O failure
    /// (disk full, permission denied) into a scheduler-fatal condition that
    /// stops every worker rather than just logging and moving on.
    async fn write_record<T: DatasetRecord>(&self, record: &T, context: &str) {
        match self.writers.write(record).await {
            Ok(outcome) => {
                if let Some(part_index) = outcome.rotated_part {
                    self.events.emit(&SchedulerEvent::PartRotated {
                        dataset: T::DATASET_NAME.to_string(),
                        part_index,
                    });
                }
            }
            Err(e) => {
                log::error!("failed to write {context} record: {e}");
                if matches!(e, WriterError::Io { .. }) {
                    let mut fatal = self.fatal_writer_error.lock().await;
                    if fatal.is_none() {
                        *fatal = Some(e);
                    }
                    self.cancel.cancel();
                }
            }
        }
    }

    async fn emit_error(&self, url: &str, phase: ErrorPhase, code: ErrorCode, message: String) {
        let parsed = url::Url::parse(url).ok();
        let record = ErrorRecord {
            url: url.to_string(),
            origin: parsed.as_ref().and_then(Origin::from_url).map(|o| o.to_string()),
            host: parsed.as_ref().and_then(|u| u.host_str().map(str::to_string)),
            occurred_at: OffsetDateTime::now_utc(),
            phase,
            code,
            message,
        };
        self.write_record(&record, "error").await;
        self.errors_emitted.fetch_add(1, Ordering::SeqCst);
        self.events.emit(&SchedulerEvent::PageError {
            url: url.to_string(),
            phase: format!("{phase}"),
            code: format!("{code}"),
        });
    }

    async fn process_page(&self, popped: PoppedUrl) {
        let url = popped.url;
        let page_id = popped.page_id;
        let normalized_url = url.normalized.normalized_url.clone();

        if self.config.robots.respect_robots {
            match self.robots.evaluate(&url).await {
                Ok(decision) => {
                    self.events.emit(&SchedulerEvent::RobotsDecision {
                        url: normalized_url.clone(),
                        decision: decision.decision.to_string(),
                        reason: decision.reason.clone(),
                    });
                    if decision.decision == crate::data::RobotsDecision::Disallowed {
                        self.events.emit(&SchedulerEvent::PageSkipped {
                            url: normalized_url,
                            reason: "robots_disallowed".to_string(),
                        });
                        return;
                    }
                }
                Err(e) => {
                    log::warn!("robots evaluation failed for {normalized_url}, allowing: {e}");
                }
            }
        }

        let Some(origin) = url::Url::parse(&normalized_url).ok().and_then(|u| Origin::from_url(&u)) else {
            self.emit_error(&normalized_url, ErrorPhase::Fetch, ErrorCode::HttpError, "url has no origin".to_string()).await;
            return;
        };

        let _lease = self.rate.acquire(&origin).await;

        let render_mode_str = self.config.render_mode.to_string();
        self.events.emit(&SchedulerEvent::RenderStarted {
            url: normalized_url.clone(),
            render_mode: render_mode_str.clone(),
        });

        let nav_timeout = Duration::from_millis(self.config.limits.timeout_ms);
        let render_outcome = self
            .renderer
            .render(&normalized_url, &origin, self.config.render_mode, None, nav_timeout)
            .await;

        let (result, nav_end_reason, elapsed) = match render_outcome {
            Ok(ok) => ok,
            Err(e) => {
                if let RenderError::ChallengeUnresolved(_) = &e {
                    self.events.emit(&SchedulerEvent::ChallengeDetected {
                        url: normalized_url.clone(),
                    });
                }
                self.emit_error(&normalized_url, render_error_phase(&e), e.code(), e.to_string()).await;
                return;
            }
        };
        self.events.emit(&SchedulerEvent::RenderFinished {
            url: normalized_url.clone(),
            render_mode: render_mode_str,
            render_ms: elapsed.as_millis() as u64,
        });

        let rendered = flatten_render_result(result);
        let robots_header = rendered.headers.get("x-robots-tag").map(String::as_str);
        let extraction = extraction::extract_page(&rendered.html_str, &normalized_url, &rendered.headers, robots_header);
        if rendered.html_str.is_empty() && !rendered.html_bytes.is_empty() {
            self.events.emit(&SchedulerEvent::ExtractFailed {
                url: normalized_url.clone(),
                message: "decoded HTML was empty".to_string(),
            });
        }

        self.write_page_record(&url, page_id, &rendered, &extraction, nav_end_reason, elapsed).await;
        self.write_edges(&url, page_id, &extraction).await;
        self.write_assets(page_id, &normalized_url, &extraction).await;

        if self.config.render_mode.at_least(RenderMode::Prerender) {
            self.write_accessibility(&normalized_url, &extraction, &rendered).await;
        }
        if self.config.render_mode == RenderMode::Full {
            self.write_console(page_id, &rendered).await;
            self.write_styles(page_id, &rendered).await;
            self.write_dom_snapshot(page_id, &normalized_url, &rendered).await;
        }

        self.discover_links(&url, page_id, &extraction).await;

        self.pages_written.fetch_add(1, Ordering::SeqCst);
        self.events.emit(&SchedulerEvent::PageWritten {
            url: normalized_url,
            http_status: rendered.http_status,
            render_ms: elapsed.as_millis() as u64,
        });
    }

    async fn write_page_record(
        &self,
        url: &UrlWithDepth,
        page_id: PageId,
        rendered: &Rendered,
        extraction: &PageExtraction,
        nav_end_reason: NavEndReason,
        elapsed: Duration,
    ) {
        let body_blob_ref = if rendered.html_bytes.is_empty() {
            None
        } else {
            match self.blobs.store(rendered.html_bytes.clone()).await {
                Ok(outcome) => Some(outcome.blob_ref),
                Err(e) => {
                    log::warn!("failed to store page body blob for {}: {e}", url.raw);
                    None
                }
            }
        };

        let media = MediaRefs {
            screenshot_desktop_blob_ref: self.store_optional_blob(rendered.screenshot_desktop.clone()).await,
            screenshot_mobile_blob_ref: self.store_optional_blob(rendered.screenshot_mobile.clone()).await,
            favicon_blob_ref: self.store_optional_blob(rendered.favicon.clone()).await,
        };

        let network = if rendered.network.is_empty() {
            None
        } else {
            let mut status_counts: IndexMap<u16, u32> = IndexMap::new();
            let mut total_bytes = 0u64;
            for event in &rendered.network {
                total_bytes += event.bytes;
                if let Some(status) = event.status {
                    *status_counts.entry(status).or_insert(0) += 1;
                }
            }
            Some(NetworkAggregation {
                request_count: rendered.network.len() as u32,
                total_bytes,
                compressed_bytes: 0,
                status_code_counts: status_counts,
            })
        };

        let raw_html_hash = sha256_hex(&rendered.html_bytes);
        let dom_hash = if self.config.render_mode == RenderMode::Raw {
            None
        } else {
            Some(raw_html_hash.clone())
        };

        let record = PageRecord {
            page_id,
            url: url.raw.clone(),
            normalized_url: url.normalized.normalized_url.clone(),
            final_url: rendered.final_url.clone(),
            url_key: url.url_key().to_string(),
            depth: url.depth,
            discovered_from: url.discovered_from,
            discovery_source: url.discovery_source,

            http_status: rendered.http_status,
            content_type: rendered.headers.get("content-type").cloned(),
            redirect_chain: rendered.redirect_chain.clone(),
            fetched_at: OffsetDateTime::now_utc(),
            response_headers: rendered.headers.clone(),
            cdn_indicators: extraction.cdn_indicators.clone(),
            compression_details: rendered.headers.get("content-encoding").cloned(),

            render_mode: render_mode_used(self.config.render_mode),
            nav_end_reason,
            render_ms: elapsed.as_millis() as u64,
            fetch_ms: if self.config.render_mode == RenderMode::Raw { elapsed.as_millis() as u64 } else { 0 },
            wait_condition: None,
            timing: TimingBreakdown::default(),

            title: extraction.facts.title.clone().or_else(|| rendered.title.clone()),
            meta_description: extraction.facts.meta_description.clone(),
            h1: extraction.facts.h1.clone(),
            headings: extraction.facts.headings.clone(),
            canonical_raw: extraction.facts.canonical_raw.clone(),
            canonical_resolved: extraction.facts.canonical_raw.as_deref().and_then(|raw| {
                url::Url::parse(&rendered.final_url).ok().and_then(|base| base.join(raw).ok()).map(|u| u.to_string())
            }),
            robots_meta: extraction.facts.robots_meta.clone(),
            robots_header: rendered.headers.get("x-robots-tag").cloned(),
            noindex_surface: extraction.noindex_surface,
            text_sample: extraction.facts.text_sample.clone(),
            word_count: extraction.facts.word_count,
            language: extraction.facts.language.clone(),
            raw_html_hash,
            dom_hash,
            content_hash: sha256_hex(extraction.facts.text_sample.as_bytes()),
            body_blob_ref,

            enhanced_seo: extraction.enhanced_seo.clone(),
            open_graph: extraction.facts.open_graph.clone(),
            twitter_card: extraction.facts.twitter_card.clone(),
            structured_data_types: extraction.facts.structured_data_types.clone(),
            tech_stack: extraction.tech_stack.clone(),
            security_headers: extraction.security_headers.clone(),
            performance: None,
            network,
            media,

            previous_page_id: None,
            content_changed: None,
            dom_changed: None,
        };

        self.write_record(&record, "page").await;
    }

    async fn store_optional_blob(&self, bytes: Option<Vec<u8>>) -> Option<String> {
        let bytes = bytes.filter(|b| !b.is_empty())?;
        match self.blobs.store(bytes).await {
            Ok(outcome) => Some(outcome.blob_ref),
            Err(e) => {
                log::warn!("failed to store media blob: {e}");
                None
            }
        }
    }

    async fn write_edges(&self, url: &UrlWithDepth, page_id: PageId, extraction: &PageExtraction) {
        for link in &extraction.links {
            let record = EdgeRecord {
                source_page_id: page_id,
                target_page_id: None,
                source_url: url.normalized.normalized_url.clone(),
                target_url: link.target_url.clone(),
                anchor_text: link.anchor_text.clone(),
                rel: link.rel.clone(),
                nofollow: link.nofollow,
                sponsored: link.sponsored,
                ugc: link.ugc,
                is_external: link.is_external,
                location: link.location,
                selector_hint: link.selector_hint.clone(),
                discovered_in_mode: self.config.render_mode.to_string(),
                http_status_at_to: None,
                link_type: link.link_type,
                target_attr: link.target_attr.clone(),
                title_attr: link.title_attr.clone(),
                download_attr: link.download_attr.clone(),
                hreflang: link.hreflang.clone(),
                type_attr: link.type_attr.clone(),
                aria_label: link.aria_label.clone(),
                role: link.role.clone(),
                is_primary_nav: link.is_primary_nav,
                is_breadcrumb: link.is_breadcrumb,
                is_skip_link: link.is_skip_link,
                is_pagination: link.is_pagination,
            };
            self.write_record(&record, "edge").await;
        }
    }

    async fn write_assets(&self, page_id: PageId, page_url: &str, extraction: &PageExtraction) {
        for asset in &extraction.assets {
            let record = AssetRecord {
                page_id,
                asset_id: AssetId::from_normalized_url(&asset.asset_url),
                page_url: page_url.to_string(),
                asset_url: asset.asset_url.clone(),
                r#type: asset.r#type,
                alt: asset.alt.clone(),
                has_alt: asset.has_alt,
                visible: asset.visible,
                in_viewport: asset.in_viewport,
                was_lazy_loaded: asset.was_lazy_loaded,
                srcset: asset.srcset.clone(),
                srcset_candidates: asset.srcset_candidates.clone(),
                sizes: asset.sizes.clone(),
                picture_context: asset.picture_context.clone(),
                duration: asset.duration,
                mime_type: asset.mime_type.clone(),
                has_controls: asset.has_controls,
                autoplay: asset.autoplay,
                r#loop: asset.r#loop,
                muted: asset.muted,
                preload: asset.preload.clone(),
                poster: asset.poster.clone(),
                tracks: asset.tracks.clone(),
                sources: asset.sources.clone(),
                lazy_strategy: asset.lazy_strategy,
                lazy_data_attrs: asset.lazy_data_attrs.clone(),
                lazy_classes: asset.lazy_classes.clone(),
            };
            self.write_record(&record, "asset").await;
        }
    }

    async fn write_accessibility(&self, page_url: &str, extraction: &PageExtraction, rendered: &Rendered) {
        let audit_profile = match self.config.profile {
            crate::config::ProfilePreset::Core => AuditProfile::Essential,
            crate::config::ProfilePreset::Full => AuditProfile::Full,
        };
        let record = AccessibilityRecord {
            page_url: page_url.to_string(),
            lang: extraction.facts.language.clone(),
            heading_order: extraction.accessibility.heading_order.clone(),
            landmarks: extraction.accessibility.landmarks.clone(),
            roles: extraction.accessibility.roles.clone(),
            missing_alt_count: extraction.accessibility.missing_alt_count,
            missing_alt_sources: extraction.accessibility.missing_alt_sources.clone(),
            form_controls: None,
            focus_order: None,
            audit_engine: AuditEngine {
                name: "atlas-crawler".to_string(),
                version: option_env!("CARGO_PKG_VERSION").unwrap_or("0.0.0").to_string(),
            },
            wcag_version: "2.1".to_string(),
            audit_profile,
            audited_at: OffsetDateTime::now_utc(),
        };
        let _ = &rendered.accessibility;
        self.write_record(&record, "accessibility").await;
    }

    async fn write_console(&self, page_id: PageId, rendered: &Rendered) {
        for message in &rendered.console {
            let record = ConsoleRecord {
                page_id,
                level: message.level.clone(),
                text: message.text.clone(),
                source: message.source.clone(),
                location: message.location.clone(),
            };
            self.write_record(&record, "console").await;
        }
    }

    async fn write_styles(&self, page_id: PageId, rendered: &Rendered) {
        for (selector_hint, computed_styles) in &rendered.computed_styles {
            let record = StyleSampleRecord {
                page_id,
                selector_hint: selector_hint.clone(),
                computed_styles: computed_styles.clone(),
            };
            self.write_record(&record, "style sample").await;
        }
    }

    async fn write_dom_snapshot(&self, page_id: PageId, page_url: &str, rendered: &Rendered) {
        let blob_ref = if rendered.html_bytes.is_empty() {
            None
        } else {
            match self.blobs.store(rendered.html_bytes.clone()).await {
                Ok(outcome) => Some(outcome.blob_ref),
                Err(e) => {
                    log::warn!("failed to store dom snapshot blob for {page_url}: {e}");
                    None
                }
            }
        };
        let record = DomSnapshotRecord {
            page_id,
            page_url: page_url.to_string(),
            dom_hash: sha256_hex(&rendered.html_bytes),
            blob_ref,
            captured_at: OffsetDateTime::now_utc(),
        };
        self.write_record(&record, "dom snapshot").await;
    }

    async fn discover_links(&self, source: &UrlWithDepth, page_id: PageId, extraction: &PageExtraction) {
        for link in &extraction.links {
            if link.is_external {
                continue;
            }
            if !url_passes_filter(&self.config.url_filter, &link.target_url) {
                continue;
            }
            let discovered = UrlWithDepth::new(
                link.target_url.clone(),
                self.config.param_policy,
                source.depth + 1,
                Some(page_id),
                DiscoverySource::Page,
            );
            let Ok(discovered) = discovered else { continue };

            let outcome = self.frontier.admit(&discovered).await;
            if outcome.admitted {
                self.events.emit(&SchedulerEvent::PageAdmitted {
                    url: discovered.normalized.normalized_url.clone(),
                    depth: discovered.depth,
                });
            } else if outcome.rejection == Some(AdmitRejection::PageCapReached) {
                self.hit_page_cap.store(true, Ordering::SeqCst);
            }
        }
    }
}

fn render_error_phase(error: &RenderError) -> ErrorPhase {
    match error {
        RenderError::Fetch(_) => ErrorPhase::Fetch,
        RenderError::Browser(_) | RenderError::ChallengeUnresolved(_) => ErrorPhase::Render,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::UrlFilterRule;

    #[test]
    fn deny_rule_wins_over_allow() {
        let filter = UrlFilterConfig {
            allow: vec![UrlFilterRule { pattern: "example.com".to_string(), is_regex: false }],
            deny: vec![UrlFilterRule { pattern: "/admin".to_string(), is_regex: false }],
        };
        assert!(!url_passes_filter(&filter, "https://example.com/admin/panel"));
        assert!(url_passes_filter(&filter, "https://example.com/blog"));
    }

    #[test]
    fn empty_allow_list_permits_anything_not_denied() {
        let filter = UrlFilterConfig::default();
        assert!(url_passes_filter(&filter, "https://anything.example/"));
    }

    #[test]
    fn regex_rule_matches_pattern() {
        let filter = UrlFilterConfig {
            allow: vec![UrlFilterRule { pattern: r"/\d+$".to_string(), is_regex: true }],
            deny: Vec::new(),
        };
        assert!(url_passes_filter(&filter, "https://example.com/post/42"));
        assert!(!url_passes_filter(&filter, "https://example.com/post/forty-two"));
    }

    #[test]
    fn completion_reason_precedence_prefers_error_budget() {
        assert_eq!(CompletionReason::ErrorBudget.as_str(), "error_budget");
        assert_eq!(CompletionReason::Capped.as_str(), "capped");
        assert_eq!(CompletionReason::Manual.as_str(), "manual");
        assert_eq!(CompletionReason::Finished.as_str(), "finished");
    }
}
