//! Per-endpoint call counters. Diagnostic only.

use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointUsage {
    pub count: u64,
    pub elapsed: Duration,
}

impl EndpointUsage {
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.elapsed.div_f64(self.count as f64)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UsageStats {
    by_endpoint: BTreeMap<String, EndpointUsage>,
}

impl UsageStats {
    /// Reduce an endpoint to its path plus `action`, so that calls differing
    /// only in ids share a counter.
    pub fn key_for(endpoint: &str) -> String {
        let (path, query) = match endpoint.split_once('?') {
            Some((path, query)) => (path, query),
            None => return endpoint.to_string(),
        };
        match query.split('&').find(|kv| kv.starts_with("action=")) {
            Some(action) => format!("{}?{}", path, action),
            None => path.to_string(),
        }
    }

    pub fn record(&mut self, endpoint: &str, elapsed: Duration) {
        let entry = self.by_endpoint.entry(Self::key_for(endpoint)).or_default();
        entry.count += 1;
        entry.elapsed += elapsed;
    }

    pub fn get(&self, endpoint: &str) -> EndpointUsage {
        self.by_endpoint
            .get(&Self::key_for(endpoint))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> u64 {
        self.by_endpoint.values().map(|u| u.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EndpointUsage)> {
        self.by_endpoint.iter().map(|(k, v)| (k.as_str(), v))
    }
}
