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

//! The configuration surface consumed by the core. The CLI
//! front-end that produces a [CrawlConfig] is out of scope; this struct is
//! what it is expected to build.

use crate::url::ParamPolicy;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RenderMode {
    Raw,
    Prerender,
    #[default]
    Full,
}

impl RenderMode {
    pub fn at_least(self, other: RenderMode) -> bool {
        self.rank() >= other.rank()
    }

    fn rank(self) -> u8 {
        match self {
            RenderMode::Raw => 0,
            RenderMode::Prerender => 1,
            RenderMode::Full => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReplayTier {
    Html,
    #[serde(rename = "html+css")]
    #[strum(serialize = "html+css")]
    HtmlCss,
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScreenshotFormat {
    #[default]
    Jpeg,
    Png,
}

/// Profile presets set sensible defaults; explicitly supplied options always
/// override the preset (a deliberate divergence from the
/// teacher's own quirk of letting the preset win).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProfilePreset {
    Core,
    #[default]
    Full,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct UrlFilterRule {
    pub pattern: String,
    pub is_regex: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
pub struct UrlFilterConfig {
    pub allow: Vec<UrlFilterRule>,
    pub deny: Vec<UrlFilterRule>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RobotsConfig {
    pub respect_robots: bool,
    pub override_robots: bool,
    pub user_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            respect_robots: true,
            override_robots: false,
            user_agent: format!(
                "AtlasCrawler/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub persist_session: bool,
    pub stealth: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist_session: false,
            stealth: false,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub capture_screenshots: bool,
    pub screenshot_quality: u8,
    pub screenshot_format: ScreenshotFormat,
    pub capture_favicons: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            capture_screenshots: true,
            screenshot_quality: 80,
            screenshot_format: ScreenshotFormat::default(),
            capture_favicons: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PrivacyConfig {
    pub strip_cookies: bool,
    pub strip_auth_headers: bool,
    pub redact_input_values: bool,
    pub redact_forms: bool,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            strip_cookies: true,
            strip_auth_headers: true,
            redact_input_values: true,
            redact_forms: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// 0 = unlimited.
    pub max_pages: u64,
    /// -1 = unlimited, 0 = seeds only.
    pub max_depth: i64,
    pub max_bytes_per_page: Option<u64>,
    pub timeout_ms: u64,
    pub rps: f64,
    pub concurrency: NonZeroU32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            max_depth: -1,
            max_bytes_per_page: None,
            timeout_ms: 30_000,
            rps: 1.0,
            concurrency: NonZeroU32::new(8).unwrap(),
        }
    }
}

impl LimitsConfig {
    pub fn depth_allowed(&self, depth: u32) -> bool {
        if self.max_depth < 0 {
            true
        } else {
            (depth as i64) <= self.max_depth
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResumeConfig {
    pub resume_from: Option<String>,
    pub checkpoint_interval: u64,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            resume_from: None,
            checkpoint_interval: 500,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    /// -1 = unlimited.
    pub max_errors: i64,
    /// When true, a record that fails schema validation aborts the page's
    /// write. When false, it is written anyway with a logged warning.
    pub strict: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            max_errors: -1,
            strict: true,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct OutputControlConfig {
    pub quiet: bool,
    pub json_summary: bool,
    pub verbose: bool,
    pub no_color: bool,
    pub log_file: Option<String>,
}

impl Default for OutputControlConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            json_summary: false,
            verbose: false,
            no_color: false,
            log_file: None,
        }
    }
}

/// The full configuration surface for a single crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub seeds: Vec<String>,
    pub output_path: Option<String>,
    pub profile: ProfilePreset,
    pub render_mode: RenderMode,
    pub replay_tier: ReplayTier,
    pub param_policy: ParamPolicy,
    pub limits: LimitsConfig,
    pub robots: RobotsConfig,
    pub url_filter: UrlFilterConfig,
    pub session: SessionConfig,
    pub media: MediaConfig,
    pub privacy: PrivacyConfig,
    pub resume: ResumeConfig,
    pub error_handling: ErrorHandlingConfig,
    pub output_control: OutputControlConfig,
    /// Skips `sitemap.xml` discovery at each seed's origin. Mirrors the
    /// teacher's own flag of the same name.
    pub ignore_sitemap: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            output_path: None,
            profile: ProfilePreset::default(),
            render_mode: RenderMode::default(),
            replay_tier: ReplayTier::default(),
            param_policy: ParamPolicy::default(),
            limits: LimitsConfig::default(),
            robots: RobotsConfig::default(),
            url_filter: UrlFilterConfig::default(),
            session: SessionConfig::default(),
            media: MediaConfig::default(),
            privacy: PrivacyConfig::default(),
            resume: ResumeConfig::default(),
            error_handling: ErrorHandlingConfig::default(),
            output_control: OutputControlConfig::default(),
            ignore_sitemap: false,
        }
    }
}

impl CrawlConfig {
    /// Applies a profile preset's defaults, but only to fields the caller has
    /// not explicitly overridden. `overridden` names the fields present in the
    /// raw configuration source (e.g. CLI flags actually passed); anything not
    /// in that set is free to take the preset's value.
    pub fn apply_preset(&mut self, overridden: &std::collections::HashSet<String>) {
        match self.profile {
            ProfilePreset::Core => {
                if !overridden.contains("render_mode") {
                    self.render_mode = RenderMode::Prerender;
                }
                if !overridden.contains("replay_tier") {
                    self.replay_tier = ReplayTier::Html;
                }
                if !overridden.contains("media.capture_screenshots") {
                    self.media.capture_screenshots = false;
                }
            }
            ProfilePreset::Full => {
                if !overridden.contains("render_mode") {
                    self.render_mode = RenderMode::Full;
                }
                if !overridden.contains("replay_tier") {
                    self.replay_tier = ReplayTier::Full;
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn explicit_replay_tier_beats_preset() {
        let mut cfg = CrawlConfig {
            profile: ProfilePreset::Core,
            replay_tier: ReplayTier::Full,
            ..Default::default()
        };
        let mut overridden = HashSet::new();
        overridden.insert("replay_tier".to_string());
        cfg.apply_preset(&overridden);
        assert_eq!(cfg.replay_tier, ReplayTier::Full, "explicit flag must win over preset");
    }

    #[test]
    fn preset_fills_unset_fields() {
        let mut cfg = CrawlConfig {
            profile: ProfilePreset::Core,
            ..Default::default()
        };
        cfg.apply_preset(&HashSet::new());
        assert_eq!(cfg.render_mode, RenderMode::Prerender);
        assert_eq!(cfg.replay_tier, ReplayTier::Html);
        assert!(!cfg.media.capture_screenshots);
    }

    #[test]
    fn depth_rule_respects_unlimited() {
        let limits = LimitsConfig {
            max_depth: -1,
            ..Default::default()
        };
        assert!(limits.depth_allowed(9999));
    }

    #[test]
    fn depth_rule_rejects_beyond_max() {
        let limits = LimitsConfig {
            max_depth: 2,
            ..Default::default()
        };
        assert!(limits.depth_allowed(2));
        assert!(!limits.depth_allowed(3));
    }
}
