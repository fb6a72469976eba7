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

pub mod crawl;

pub use crawl::{
    CrawlConfig, ErrorHandlingConfig, LimitsConfig, MediaConfig, OutputControlConfig,
    PrivacyConfig, ProfilePreset, RenderMode, ReplayTier, ResumeConfig, RobotsConfig,
    ScreenshotFormat, SessionConfig, UrlFilterConfig, UrlFilterRule,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one seed URL is required")]
    NoSeeds,
    #[error("failed to load configuration file: {0}")]
    Load(#[from] config::ConfigError),
}

/// Loads a [CrawlConfig] from an optional file using the `config` crate's
/// layering: file values act as the base, later overrides (e.g. CLI flags
/// applied by the caller) take precedence.
pub fn load_from_file(path: &str) -> Result<CrawlConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;
    let cfg = settings.try_deserialize::<CrawlConfig>()?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn validate(cfg: &CrawlConfig) -> Result<(), ConfigError> {
    if cfg.seeds.is_empty() {
        return Err(ConfigError::NoSeeds);
    }
    Ok(())
}
