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

//! Aggregates the per-request network events a [crate::browser::BrowserContext]
//! observed during a full render into one [NetworkAggregation] row.

use crate::browser::NetworkEvent;
use crate::data::page::NetworkAggregation;

pub fn aggregate(events: &[NetworkEvent]) -> NetworkAggregation {
    let mut agg = NetworkAggregation {
        request_count: events.len() as u32,
        ..Default::default()
    };
    for event in events {
        agg.total_bytes += event.bytes;
        if let Some(status) = event.status {
            *agg.status_code_counts.entry(status).or_insert(0) += 1;
        }
    }
    agg
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_requests_and_bytes() {
        let events = vec![
            NetworkEvent {
                url: "https://example.com/a.js".to_string(),
                status: Some(200),
                bytes: 1200,
                resource_type: "script".to_string(),
            },
            NetworkEvent {
                url: "https://example.com/b.js".to_string(),
                status: Some(200),
                bytes: 800,
                resource_type: "script".to_string(),
            },
        ];
        let agg = aggregate(&events);
        assert_eq!(agg.request_count, 2);
        assert_eq!(agg.total_bytes, 2000);
        assert_eq!(agg.status_code_counts.get(&200), Some(&2));
    }
}
