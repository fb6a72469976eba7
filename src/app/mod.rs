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

//! Wires every module together into one runnable crawl: parses/merges
//! configuration, builds every dependency the Scheduler needs, runs it, and
//! finalizes the archive. This is the only module allowed to construct all
//! the others.

pub mod args;
pub mod exitcode;
pub mod logging;

pub use args::AtlasArgs;

use crate::archive::ArchiveFinalizer;
use crate::blobstore::BlobStore;
use crate::browser::BrowserPool;
use crate::checkpoint::Checkpointer;
use crate::config::{self, CrawlConfig, RenderMode};
use crate::cookies::CookieJar;
use crate::data::manifest::Manifest;
use crate::dataset::registry::WriterRegistry;
use crate::fetching::{Fetcher, HeaderPolicy};
use crate::frontier::Frontier;
use crate::manifest::ManifestBuilder;
use crate::rate::RateGovernor;
use crate::render::Renderer;
use crate::robots::RobotsEvaluator;
use crate::schema::build_registry;
use crate::scheduler::{EventLog, Scheduler, SchedulerOutcome};
use camino::{Utf8Path, Utf8PathBuf};
use exitcode::RunFailure;
use reqwest::Client;
use std::process::ExitCode;
use std::sync::Arc;
use time::OffsetDateTime;

fn staging_dir_for(output_path: &Utf8Path) -> Utf8PathBuf {
    let mut dir = output_path.to_path_buf();
    dir.set_extension("atls.staging");
    dir
}

pub async fn exec_args(args: AtlasArgs) -> ExitCode {
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => failure.into(),
    }
}

async fn run(args: AtlasArgs) -> Result<(), RunFailure> {
    let base = match &args.config {
        Some(path) => config::load_from_file(path).map_err(RunFailure::Config)?,
        None => CrawlConfig::default(),
    };
    let (mut crawl_config, overridden) = args.merge_into(base);
    crawl_config.apply_preset(&overridden);
    config::validate(&crawl_config).map_err(RunFailure::Config)?;

    let output_path = Utf8PathBuf::from(
        crawl_config
            .output_path
            .clone()
            .unwrap_or_else(|| "crawl.atls".to_string()),
    );
    let staging_dir = staging_dir_for(&output_path);
    std::fs::create_dir_all(&staging_dir).map_err(|e| RunFailure::Logging(anyhow::anyhow!(e)))?;

    logging::configure_logging(
        &staging_dir,
        crawl_config.output_control.quiet,
        crawl_config.output_control.verbose,
        crawl_config.output_control.log_file.as_deref(),
    )
    .map_err(RunFailure::Logging)?;

    let json_summary = crawl_config.output_control.json_summary;
    log::info!("starting crawl with {} seed(s)", crawl_config.seeds.len());

    let crawl_id = uuid::Uuid::now_v7().to_string();
    let started_at = OffsetDateTime::now_utc();

    let http_client = Client::new();
    let header_policy = HeaderPolicy {
        strip_cookies: crawl_config.privacy.strip_cookies,
        strip_auth_headers: crawl_config.privacy.strip_auth_headers,
        user_agent: crawl_config.robots.user_agent.clone(),
    };
    let fetcher = Arc::new(Fetcher::new(
        http_client.clone(),
        header_policy,
        crawl_config.limits.max_bytes_per_page,
    ));

    let frontier = Arc::new(Frontier::new(&crawl_config.limits));
    let mut resumed_pages_written = 0u64;
    let mut resumed_errors_emitted = 0u64;
    let mut resumed_rate_state = None;
    let mut resumed_dataset_record_counts = None;
    if let Some(resume_from) = crawl_config.resume.resume_from.clone() {
        match Checkpointer::load(Utf8Path::new(&resume_from)) {
            Ok(Some(checkpoint)) => {
                frontier.restore(checkpoint.frontier).await;
                resumed_pages_written = checkpoint.pages_written;
                resumed_errors_emitted = checkpoint.errors_emitted;
                resumed_rate_state = Some(checkpoint.origin_rate_state);
                resumed_dataset_record_counts = Some(checkpoint.dataset_record_counts);
                log::info!("resumed from checkpoint at {resume_from}");
            }
            Ok(None) => log::warn!("no checkpoint found at {resume_from}, starting fresh"),
            Err(e) => log::warn!("failed to load checkpoint at {resume_from}: {e}"),
        }
    }

    let robots = Arc::new(RobotsEvaluator::new(
        http_client.clone(),
        crawl_config.robots.user_agent.clone(),
        crawl_config.robots.override_robots,
    ));
    let rate = Arc::new(RateGovernor::new(
        crawl_config.limits.rps,
        crawl_config.limits.concurrency.get() as usize,
        robots.clone(),
    ));
    if let Some(origin_rate_state) = &resumed_rate_state {
        rate.restore_state(origin_rate_state).await;
    }

    let browser_pool = if crawl_config.render_mode == RenderMode::Raw {
        None
    } else {
        let mut pool = BrowserPool::new(
            crawl_config.limits.concurrency.get() as usize,
            crawl_config.session.persist_session,
            crawl_config.robots.user_agent.clone(),
            (1366, 900),
        );
        if crawl_config.session.persist_session {
            pool = pool.with_cookie_jar(Arc::new(CookieJar::new()));
        }
        Some(Arc::new(pool))
    };
    let renderer = Arc::new(Renderer::new((*fetcher).clone(), browser_pool));

    let schemas = build_registry().expect("bundled schemas must parse");
    let writers = Arc::new(WriterRegistry::new(
        &staging_dir,
        schemas,
        crawl_config.error_handling.strict,
    ));
    let blobs = Arc::new(BlobStore::new(&staging_dir));
    let checkpointer = Arc::new(Checkpointer::new(
        &staging_dir,
        crawl_config.resume.checkpoint_interval,
    ));
    let events = Arc::new(
        EventLog::open(&staging_dir).map_err(|e| RunFailure::Logging(anyhow::anyhow!(e)))?,
    );

    if let Some(expected) = &resumed_dataset_record_counts {
        let actual = writers.record_counts().await;
        for (dataset, expected_count) in expected {
            let actual_count = actual.get(dataset).copied().unwrap_or(0);
            if actual_count < *expected_count {
                log::warn!(
                    "dataset {dataset} has fewer on-disk records ({actual_count}) than the checkpoint recorded ({expected_count})"
                );
            }
        }
    }

    let seeds = crawl_config.seeds.clone();
    let scheduler = Scheduler::resumed(
        crawl_config.clone(),
        frontier,
        robots,
        rate,
        renderer,
        writers,
        blobs,
        checkpointer,
        events,
        fetcher,
        resumed_pages_written,
        resumed_errors_emitted,
    );

    let outcome: SchedulerOutcome = scheduler.run(seeds).await;
    if let Some(e) = outcome.fatal_writer_error {
        return Err(RunFailure::Writer(e));
    }

    let mut manifest_builder = ManifestBuilder::new(crawl_id, crawl_config, started_at);
    for warning in &outcome.warnings {
        manifest_builder.warn(warning.clone());
    }
    let schemas_for_archive = build_registry().expect("bundled schemas must parse");
    let finalizer = ArchiveFinalizer::new(&staging_dir, &output_path);
    let manifest = finalizer
        .finalize(
            outcome.dataset_metas.clone(),
            &schemas_for_archive,
            &manifest_builder,
            outcome.completion_reason.as_str(),
        )
        .map_err(RunFailure::Archive)?;

    print_summary(&manifest, &outcome, json_summary);
    Ok(())
}

fn print_summary(manifest: &Manifest, outcome: &SchedulerOutcome, json_summary: bool) {
    if json_summary {
        match serde_json::to_string(manifest) {
            Ok(text) => println!("{text}"),
            Err(e) => log::error!("failed to serialize summary: {e}"),
        }
    } else {
        println!(
            "crawl {} finished: {} page(s) written, {} error(s), reason={}",
            manifest.crawl_id,
            outcome.pages_written,
            outcome.errors_emitted,
            outcome.completion_reason.as_str(),
        );
    }
}
