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

use camino::Utf8Path;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

const PATTERN: &str = "{l}@Thread{I} - {d} - {m}{n}";

fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Writes `<staging>/crawl.log` unconditionally and additionally echoes to
/// stderr unless `quiet` is set. `log_file` overrides the default staging
/// path when given.
pub fn configure_logging(
    staging_dir: &Utf8Path,
    quiet: bool,
    verbose: bool,
    log_file: Option<&str>,
) -> anyhow::Result<()> {
    let level = level_for(quiet, verbose);
    let log_path = log_file
        .map(Utf8Path::new)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| staging_dir.join("crawl.log"));

    let file_logger = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(log_path.as_std_path())
        .expect("staging directory must already exist by the time logging is configured");

    let mut builder =
        Config::builder().appender(Appender::builder().build("file", Box::new(file_logger)));

    if !quiet {
        let console_logger = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build();
        builder = builder.appender(Appender::builder().build("stderr", Box::new(console_logger)));
    }

    let mut root = Root::builder().appender("file");
    if !quiet {
        root = root.appender("stderr");
    }

    let config = builder
        .logger(Logger::builder().build("atlas_crawler", level))
        .build(root.build(LevelFilter::Warn))?;

    let _ = log4rs::init_config(config);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn quiet_forces_warn_level() {
        assert_eq!(level_for(true, true), LevelFilter::Warn);
    }

    #[test]
    fn verbose_without_quiet_is_debug() {
        assert_eq!(level_for(false, true), LevelFilter::Debug);
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(level_for(false, false), LevelFilter::Info);
    }
}
