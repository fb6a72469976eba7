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

//! NDJSON progress/event log, one line per state transition or page outcome,
//! written alongside the staging datasets so a caller can tail the crawl
//! without polling the Scheduler directly.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Debug, Error)]
#[error("io error writing scheduler event log to {path}: {source}")]
pub struct EventLogError {
    path: Utf8PathBuf,
    #[source]
    source: std::io::Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Started { seed_count: usize },
    PageAdmitted { url: String, depth: u32 },
    PageSkipped { url: String, reason: String },
    RobotsDecision { url: String, decision: String, reason: String },
    RenderStarted { url: String, render_mode: String },
    RenderFinished { url: String, render_mode: String, render_ms: u64 },
    ChallengeDetected { url: String },
    ExtractFailed { url: String, message: String },
    PageWritten { url: String, http_status: u16, render_ms: u64 },
    PageError { url: String, phase: String, code: String },
    PartRotated { dataset: String, part_index: u32 },
    Checkpointed { pages_admitted: u64 },
    Paused,
    Resumed,
    Finalizing,
    Completed { reason: String, pages_written: u64, errors_emitted: u64 },
    ShutdownReason { reason: String },
}

/// Appends one NDJSON line per event to `<staging>/events.jsonl`. Every write
/// takes an internal lock so concurrent workers never interleave partial
/// lines.
pub struct EventLog {
    path: Utf8PathBuf,
    file: Mutex<std::fs::File>,
}

impl EventLog {
    pub fn open(staging_dir: &Utf8Path) -> Result<Self, EventLogError> {
        let path = staging_dir.join("events.jsonl");
        std::fs::create_dir_all(staging_dir).map_err(|e| Self::err(&path, e))?;
        let file = std::fs::File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Self::err(&path, e))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn emit(&self, event: &SchedulerEvent) {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(with = "time::serde::rfc3339")]
            at: OffsetDateTime,
            #[serde(flatten)]
            event: &'a SchedulerEvent,
        }
        let envelope = Envelope {
            at: OffsetDateTime::now_utc(),
            event,
        };
        let Ok(mut line) = serde_json::to_vec(&envelope) else {
            log::warn!("failed to serialize scheduler event");
            return;
        };
        line.push(b'\n');
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(&line) {
            log::warn!("failed to append scheduler event to {}: {e}", self.path);
        }
    }

    fn err(path: &Utf8Path, source: std::io::Error) -> EventLogError {
        EventLogError {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emits_ndjson_lines() {
        let dir = camino_tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        log.emit(&SchedulerEvent::Started { seed_count: 3 });
        log.emit(&SchedulerEvent::PageWritten {
            url: "https://example.com/".to_string(),
            http_status: 200,
            render_ms: 120,
        });
        let contents = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("event").is_some());
            assert!(value.get("at").is_some());
        }
    }
}
