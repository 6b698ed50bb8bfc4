//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterMetric {
    /// Bar and adjustment rows upserted
    RowsWritten,
    /// Rows rejected during a write
    RowsSkipped,
    /// Reader lookups served from the query cache
    CacheHits,
    /// Reader lookups that went to SQLite
    CacheMisses,
}

impl CounterMetric {
    pub fn name(self) -> &'static str {
        match self {
            CounterMetric::RowsWritten => "daily_pricing_rows_written_total",
            CounterMetric::RowsSkipped => "daily_pricing_rows_skipped_total",
            CounterMetric::CacheHits => "daily_pricing_cache_hits_total",
            CounterMetric::CacheMisses => "daily_pricing_cache_misses_total",
        }
    }
}

/// Reader query kinds timed by [`record_latency`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Value,
    RawArrays,
}

impl QueryKind {
    fn label(self) -> &'static str {
        match self {
            QueryKind::Value => "value",
            QueryKind::RawArrays => "raw_arrays",
        }
    }
}

const QUERY_LATENCY: &str = "daily_pricing_query_latency_ms";

/// Add `n` to a counter
pub fn increment(metric: CounterMetric, n: u64) {
    if n == 0 {
        return;
    }
    metrics::counter!(metric.name()).increment(n);
}

/// Record a reader query latency
pub fn record_latency(kind: QueryKind, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1000.0;
    metrics::histogram!(QUERY_LATENCY, "query" => kind.label()).record(value_ms);
    tracing::trace!(
        metric = QUERY_LATENCY,
        query = kind.label(),
        value_ms,
        "Recording latency"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_names_are_distinct() {
        let names = [
            CounterMetric::RowsWritten,
            CounterMetric::RowsSkipped,
            CounterMetric::CacheHits,
            CounterMetric::CacheMisses,
        ]
        .map(CounterMetric::name);
        for (i, a) in names.iter().enumerate() {
            assert!(a.starts_with("daily_pricing_"));
            assert!(names[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        increment(CounterMetric::RowsWritten, 3);
        record_latency(QueryKind::Value, Duration::from_micros(250));
    }
}
