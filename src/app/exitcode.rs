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

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::dataset::writer::WriterError;
use std::process::ExitCode;

impl From<&ConfigError> for ExitCode {
    fn from(value: &ConfigError) -> Self {
        match value {
            ConfigError::NoSeeds => ExitCode::from(3),
            ConfigError::Load(_) => ExitCode::from(4),
        }
    }
}

impl From<&ArchiveError> for ExitCode {
    fn from(value: &ArchiveError) -> Self {
        match value {
            ArchiveError::Io { .. } => ExitCode::from(2),
            ArchiveError::Zip { .. } => ExitCode::from(5),
            ArchiveError::Serialize(_) => ExitCode::from(70),
        }
    }
}

impl From<&WriterError> for ExitCode {
    fn from(_value: &WriterError) -> Self {
        ExitCode::from(4)
    }
}

/// Top-level failure a run can end in, each mapped to a distinct exit code
/// so callers scripting around the binary can distinguish them.
pub enum RunFailure {
    Config(ConfigError),
    Logging(anyhow::Error),
    Archive(ArchiveError),
    Writer(WriterError),
}

impl From<RunFailure> for ExitCode {
    fn from(value: RunFailure) -> Self {
        match value {
            RunFailure::Config(e) => ExitCode::from(&e),
            RunFailure::Logging(_) => ExitCode::from(10),
            RunFailure::Archive(e) => ExitCode::from(&e),
            RunFailure::Writer(e) => ExitCode::from(&e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_seeds_maps_to_three() {
        let code: ExitCode = RunFailure::Config(ConfigError::NoSeeds).into();
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(3)));
    }
}
