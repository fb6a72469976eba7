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

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorPhase {
    Fetch,
    Render,
    Extract,
    Write,
}

/// A stable, machine-readable error code. Extend as new failure
/// modes are identified; never repurpose an existing code for a new meaning.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DnsResolutionFailed,
    TcpConnectFailed,
    TlsHandshakeFailed,
    HttpError,
    Timeout,
    Truncated,
    BrowserCrashed,
    NavTimeout,
    WaitSelectorTimeout,
    DomSerializationFailed,
    ChallengeDetected,
    ExtractorFailed,
    SchemaValidationFailed,
    WriterFatal,
}

/// Error record emitted whenever a fetch or render attempt fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub url: String,
    pub origin: Option<String>,
    pub host: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub phase: ErrorPhase,
    pub code: ErrorCode,
    pub message: String,
}
