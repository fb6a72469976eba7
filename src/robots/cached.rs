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

use std::sync::Arc;
use texting_robots::Robot;
use time::OffsetDateTime;

/// What we learned about an origin's robots.txt, cached for the run.
#[derive(Debug, Clone)]
pub enum CachedRobots {
    /// robots.txt parsed successfully.
    HasRobots {
        robot: Arc<Robot>,
        retrieved_at: OffsetDateTime,
    },
    /// No robots.txt (404/4xx), or the body was empty: everything is allowed.
    NoRobots { retrieved_at: OffsetDateTime },
    /// robots.txt was unreachable (5xx/timeout): allow, but the caller should warn.
    Unknown { retrieved_at: OffsetDateTime },
}

impl CachedRobots {
    pub fn retrieved_at(&self) -> OffsetDateTime {
        match self {
            CachedRobots::HasRobots { retrieved_at, .. }
            | CachedRobots::NoRobots { retrieved_at }
            | CachedRobots::Unknown { retrieved_at } => *retrieved_at,
        }
    }

    /// Crawl-delay in seconds, if the robots.txt declared one for this agent.
    pub fn crawl_delay(&self) -> Option<f32> {
        match self {
            CachedRobots::HasRobots { robot, .. } => robot.delay,
            _ => None,
        }
    }

    pub fn is_allowed(&self, path_and_query: &str) -> bool {
        match self {
            CachedRobots::HasRobots { robot, .. } => robot.allowed(path_and_query),
            CachedRobots::NoRobots { .. } | CachedRobots::Unknown { .. } => true,
        }
    }

    pub fn emitted_warning(&self) -> bool {
        matches!(self, CachedRobots::Unknown { .. })
    }
}
