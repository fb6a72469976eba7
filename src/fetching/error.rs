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

use crate::data::ErrorCode;
use thiserror::Error;

/// A fetch-phase failure, already mapped to a stable [ErrorCode].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("dns resolution failed for {url}")]
    Dns { url: String },
    #[error("tcp connect failed for {url}")]
    TcpConnect { url: String },
    #[error("tls handshake failed for {url}")]
    TlsHandshake { url: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("response body for {url} was truncated")]
    Truncated { url: String },
    #[error("protocol error fetching {url}: {message}")]
    Protocol { url: String, message: String },
}

impl FetchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            FetchError::Dns { .. } => ErrorCode::DnsResolutionFailed,
            FetchError::TcpConnect { .. } => ErrorCode::TcpConnectFailed,
            FetchError::TlsHandshake { .. } => ErrorCode::TlsHandshakeFailed,
            FetchError::Timeout { .. } => ErrorCode::Timeout,
            FetchError::Truncated { .. } => ErrorCode::Truncated,
            FetchError::Protocol { .. } => ErrorCode::HttpError,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Dns { url }
            | FetchError::TcpConnect { url }
            | FetchError::TlsHandshake { url }
            | FetchError::Timeout { url }
            | FetchError::Truncated { url }
            | FetchError::Protocol { url, .. } => url,
        }
    }

    /// Classifies a [reqwest::Error] into one of the stable failure classes
    /// above. reqwest collapses DNS/TCP/TLS into its own connect error, so
    /// the message is inspected for the commonly-surfaced substrings.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout { url: url.to_string() };
        }
        if err.is_connect() {
            let message = err.to_string();
            if message.contains("dns") || message.contains("resolve") {
                return FetchError::Dns { url: url.to_string() };
            }
            if message.contains("tls") || message.contains("certificate") || message.contains("ssl") {
                return FetchError::TlsHandshake { url: url.to_string() };
            }
            return FetchError::TcpConnect { url: url.to_string() };
        }
        if err.is_body() || err.is_decode() {
            return FetchError::Truncated { url: url.to_string() };
        }
        FetchError::Protocol {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
