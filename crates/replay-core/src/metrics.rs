//! Per-endpoint execution metrics

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dispatcher::ExecutionRecord;

/// Timing and counts for one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetrics {
    pub count: u64,
    pub failures: u64,
    pub total_time_ms: u64,
    pub total_retries: u64,
}

impl ApiMetrics {
    pub fn average_time_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / self.count as f64
        }
    }
}

/// Aggregated metrics across a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    apis: IndexMap<String, ApiMetrics>,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution
    pub fn record(&mut self, record: &ExecutionRecord) {
        let entry = self.apis.entry(record.api.clone()).or_default();
        entry.count += 1;
        entry.total_time_ms += record.elapsed_ms;
        entry.total_retries += u64::from(record.retries);
        if !record.is_success() {
            entry.failures += 1;
        }
    }

    pub fn get(&self, api: &str) -> Option<&ApiMetrics> {
        self.apis.get(api)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiMetrics)> {
        self.apis.iter().map(|(api, metrics)| (api.as_str(), metrics))
    }

    pub fn total_calls(&self) -> u64 {
        self.apis.values().map(|m| m.count).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.apis.values().map(|m| m.failures).sum()
    }

    /// Plain-text report, one line per endpoint
    pub fn report(&self) -> String {
        let mut lines: Vec<String> = self
            .iter()
            .map(|(api, m)| {
                format!(
                    "{:<40} calls={:<4} failures={:<4} avg={:.1}ms retries={}",
                    api,
                    m.count,
                    m.failures,
                    m.average_time_ms(),
                    m.total_retries
                )
            })
            .collect();
        lines.push(format!(
            "total calls={} failures={}",
            self.total_calls(),
            self.total_failures()
        ));
        lines.join("\n")
    }
}
