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

//! Approximate performance metrics (full mode only) derived from timing and
//! network data already captured during render — no separate CDP Performance
//! domain collection is wired up, so per-paint timings are left absent rather
//! than fabricated.

use crate::data::page::{NetworkAggregation, PerformanceMetrics, TimingBreakdown};

pub fn derive(render_ms: u64, timing: &TimingBreakdown, network: &NetworkAggregation) -> PerformanceMetrics {
    let ttfb_ms = timing.ttfb_ms.map(|v| v as f64);
    let approximate_score = approximate_score(render_ms, network.request_count, network.total_bytes);

    PerformanceMetrics {
        lcp_ms: None,
        cls: None,
        inp_ms: None,
        ttfb_ms,
        fcp_ms: None,
        tbt_ms: None,
        tti_ms: Some(render_ms as f64),
        speed_index: None,
        approximate_score: Some(approximate_score),
    }
}

/// A coarse 0-100 heuristic: penalizes slow renders and heavy payloads. Not a
/// substitute for a real Lighthouse-style audit, just a cheap signal to sort
/// pages by.
fn approximate_score(render_ms: u64, request_count: u32, total_bytes: u64) -> u8 {
    let mut score: i32 = 100;
    score -= (render_ms / 200) as i32;
    score -= (request_count / 5) as i32;
    score -= (total_bytes / 500_000) as i32;
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fast_light_page_scores_high() {
        let timing = TimingBreakdown {
            ttfb_ms: Some(50),
            ..Default::default()
        };
        let network = NetworkAggregation {
            request_count: 2,
            total_bytes: 10_000,
            ..Default::default()
        };
        let metrics = derive(300, &timing, &network);
        assert!(metrics.approximate_score.unwrap() > 90);
    }

    #[test]
    fn slow_heavy_page_scores_low() {
        let timing = TimingBreakdown::default();
        let network = NetworkAggregation {
            request_count: 200,
            total_bytes: 20_000_000,
            ..Default::default()
        };
        let metrics = derive(10_000, &timing, &network);
        assert_eq!(metrics.approximate_score.unwrap(), 0);
    }
}
