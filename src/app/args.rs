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

use crate::config::{CrawlConfig, ProfilePreset, RenderMode, ReplayTier};
use clap::Parser;
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct AtlasArgs {
    pub seeds: Vec<String>,

    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long)]
    pub output: Option<String>,

    #[arg(long, value_parser = ProfilePreset::from_str)]
    pub profile: Option<ProfilePreset>,

    #[arg(long = "render-mode", value_parser = RenderMode::from_str)]
    pub render_mode: Option<RenderMode>,

    #[arg(long = "replay-tier", value_parser = ReplayTier::from_str)]
    pub replay_tier: Option<ReplayTier>,

    #[arg(long = "max-pages")]
    pub max_pages: Option<u64>,

    #[arg(long = "max-depth")]
    pub max_depth: Option<i64>,

    #[arg(long)]
    pub rps: Option<f64>,

    #[arg(long)]
    pub concurrency: Option<u32>,

    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    #[arg(long = "ignore-robots")]
    pub ignore_robots: bool,

    #[arg(long = "override-robots")]
    pub override_robots: bool,

    #[arg(long = "ignore-sitemap")]
    pub ignore_sitemap: bool,

    #[arg(long = "resume-from")]
    pub resume_from: Option<String>,

    #[arg(long = "checkpoint-interval")]
    pub checkpoint_interval: Option<u64>,

    #[arg(long = "max-errors")]
    pub max_errors: Option<i64>,

    #[arg(short, long)]
    pub quiet: bool,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long = "json-summary")]
    pub json_summary: bool,

    #[arg(long = "no-color")]
    pub no_color: bool,

    #[arg(long = "log-file")]
    pub log_file: Option<String>,
}

impl AtlasArgs {
    /// Layers these flags over `base` (typically loaded from `--config`, or
    /// [CrawlConfig::default]), returning the merged config and the set of
    /// field keys explicitly present on the command line so
    /// [CrawlConfig::apply_preset] knows which ones the preset must not
    /// touch.
    pub fn merge_into(self, mut base: CrawlConfig) -> (CrawlConfig, HashSet<String>) {
        let mut overridden = HashSet::new();

        if !self.seeds.is_empty() {
            base.seeds = self.seeds;
        }
        if self.output.is_some() {
            base.output_path = self.output;
        }
        if let Some(profile) = self.profile {
            base.profile = profile;
        }
        if let Some(mode) = self.render_mode {
            base.render_mode = mode;
            overridden.insert("render_mode".to_string());
        }
        if let Some(tier) = self.replay_tier {
            base.replay_tier = tier;
            overridden.insert("replay_tier".to_string());
        }
        if let Some(max_pages) = self.max_pages {
            base.limits.max_pages = max_pages;
        }
        if let Some(max_depth) = self.max_depth {
            base.limits.max_depth = max_depth;
        }
        if let Some(rps) = self.rps {
            base.limits.rps = rps;
        }
        if let Some(concurrency) = self.concurrency {
            if let Some(nz) = std::num::NonZeroU32::new(concurrency) {
                base.limits.concurrency = nz;
            }
        }
        if let Some(timeout_ms) = self.timeout_ms {
            base.limits.timeout_ms = timeout_ms;
        }
        if self.ignore_robots {
            base.robots.respect_robots = false;
        }
        if self.override_robots {
            base.robots.override_robots = true;
        }
        if self.ignore_sitemap {
            base.ignore_sitemap = true;
        }
        if self.resume_from.is_some() {
            base.resume.resume_from = self.resume_from;
        }
        if let Some(interval) = self.checkpoint_interval {
            base.resume.checkpoint_interval = interval;
        }
        if let Some(max_errors) = self.max_errors {
            base.error_handling.max_errors = max_errors;
        }
        if self.quiet {
            base.output_control.quiet = true;
        }
        if self.verbose {
            base.output_control.verbose = true;
        }
        if self.json_summary {
            base.output_control.json_summary = true;
        }
        if self.no_color {
            base.output_control.no_color = true;
        }
        if self.log_file.is_some() {
            base.output_control.log_file = self.log_file;
        }

        (base, overridden)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn args_with_seed(seed: &str) -> AtlasArgs {
        AtlasArgs {
            seeds: vec![seed.to_string()],
            config: None,
            output: None,
            profile: None,
            render_mode: None,
            replay_tier: None,
            max_pages: None,
            max_depth: None,
            rps: None,
            concurrency: None,
            timeout_ms: None,
            ignore_robots: false,
            override_robots: false,
            ignore_sitemap: false,
            resume_from: None,
            checkpoint_interval: None,
            max_errors: None,
            quiet: false,
            verbose: false,
            json_summary: false,
            no_color: false,
            log_file: None,
        }
    }

    #[test]
    fn unset_flags_leave_defaults_untouched() {
        let (config, overridden) = args_with_seed("https://example.com/").merge_into(CrawlConfig::default());
        assert_eq!(config.seeds, vec!["https://example.com/".to_string()]);
        assert_eq!(config.render_mode, RenderMode::Full);
        assert!(overridden.is_empty());
    }

    #[test]
    fn explicit_render_mode_is_tracked_as_overridden() {
        let mut args = args_with_seed("https://example.com/");
        args.render_mode = Some(RenderMode::Raw);
        let (config, overridden) = args.merge_into(CrawlConfig::default());
        assert_eq!(config.render_mode, RenderMode::Raw);
        assert!(overridden.contains("render_mode"));
    }

    #[test]
    fn ignore_robots_flag_disables_respect_robots() {
        let mut args = args_with_seed("https://example.com/");
        args.ignore_robots = true;
        let (config, _) = args.merge_into(CrawlConfig::default());
        assert!(!config.robots.respect_robots);
    }
}
