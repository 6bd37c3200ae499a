use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;

use crate::error::DigestError;
use crate::parser::LogRecord;

/// Inclusive `[from, to]` filter applied to record timestamps before
/// grouping. An unset bound does not constrain that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if self.from.is_some_and(|from| ts < from) {
            return false;
        }
        if self.to.is_some_and(|to| ts > to) {
            return false;
        }
        true
    }
}

/// Aggregated statistics for one distinct query string.
///
/// All derived values are computed once at construction; the group never
/// changes afterwards. Max provenance is kept as indices into `records` so
/// the winning record can be borrowed without aliasing.
#[derive(Debug)]
pub struct QueryStats {
    query: String,
    records: Vec<LogRecord>,
    pub avg_exec_total_time: f64,
    pub avg_total_queryable_samples: f64,
    pub avg_peak_samples: f64,
    max_exec_total_time_idx: usize,
    max_total_queryable_samples_idx: usize,
    max_peak_samples_idx: usize,
}

impl QueryStats {
    /// Builds the group and computes its statistics. Ties on a maximum keep
    /// the earliest record (strict `>` comparison).
    pub fn new(query: String, records: Vec<LogRecord>) -> Result<Self, DigestError> {
        if query.is_empty() {
            return Err(DigestError::EmptyQuery);
        }
        if records.is_empty() {
            return Err(DigestError::EmptyGroup);
        }

        let mut exec_time_sum = 0.0;
        let mut queryable_samples_sum = 0u64;
        let mut peak_samples_sum = 0u64;
        let mut max_exec_total_time_idx = 0;
        let mut max_total_queryable_samples_idx = 0;
        let mut max_peak_samples_idx = 0;

        for (idx, record) in records.iter().enumerate() {
            let timings = &record.stats.timings;
            let samples = &record.stats.samples;
            exec_time_sum += timings.exec_total_time;
            queryable_samples_sum += samples.total_queryable_samples;
            peak_samples_sum += samples.peak_samples;

            if timings.exec_total_time
                > records[max_exec_total_time_idx].stats.timings.exec_total_time
            {
                max_exec_total_time_idx = idx;
            }
            if samples.total_queryable_samples
                > records[max_total_queryable_samples_idx]
                    .stats
                    .samples
                    .total_queryable_samples
            {
                max_total_queryable_samples_idx = idx;
            }
            if samples.peak_samples > records[max_peak_samples_idx].stats.samples.peak_samples {
                max_peak_samples_idx = idx;
            }
        }

        let count = records.len() as f64;
        Ok(Self {
            query,
            avg_exec_total_time: exec_time_sum / count,
            avg_total_queryable_samples: queryable_samples_sum as f64 / count,
            avg_peak_samples: peak_samples_sum as f64 / count,
            max_exec_total_time_idx,
            max_total_queryable_samples_idx,
            max_peak_samples_idx,
            records,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn max_exec_total_time_record(&self) -> &LogRecord {
        &self.records[self.max_exec_total_time_idx]
    }

    pub fn max_total_queryable_samples_record(&self) -> &LogRecord {
        &self.records[self.max_total_queryable_samples_idx]
    }

    pub fn max_peak_samples_record(&self) -> &LogRecord {
        &self.records[self.max_peak_samples_idx]
    }
}

/// Result of one aggregation pass: the per-query groups plus the flat list
/// of every record that survived the time window, in arrival order.
#[derive(Debug)]
pub struct Aggregation {
    pub groups: Vec<QueryStats>,
    pub records: Vec<LogRecord>,
}

impl Aggregation {
    pub fn exec_total_times(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.stats.timings.exec_total_time)
            .collect()
    }

    pub fn total_queryable_samples(&self) -> Vec<u64> {
        self.records
            .iter()
            .map(|r| r.stats.samples.total_queryable_samples)
            .collect()
    }

    pub fn peak_samples(&self) -> Vec<u64> {
        self.records
            .iter()
            .map(|r| r.stats.samples.peak_samples)
            .collect()
    }
}

/// Consumes the decoded record stream once, applies the time window, and
/// groups the survivors by query text.
///
/// Groups come out in the order each query was first seen, which makes the
/// later stable sorts deterministic across runs. The first decode error
/// aborts the pass.
pub fn aggregate(
    records: impl Iterator<Item = Result<LogRecord, DigestError>>,
    window: TimeWindow,
) -> Result<Aggregation, DigestError> {
    let mut buckets: Vec<(String, Vec<LogRecord>)> = Vec::new();
    let mut bucket_index: HashMap<String, usize> = HashMap::new();
    let mut filtered: Vec<LogRecord> = Vec::new();

    for record in records {
        let record = record?;
        if !window.contains(record.ts) {
            continue;
        }

        match bucket_index.get(&record.params.query) {
            Some(&idx) => buckets[idx].1.push(record.clone()),
            None => {
                let query = record.params.query.clone();
                bucket_index.insert(query.clone(), buckets.len());
                buckets.push((query, vec![record.clone()]));
            }
        }
        filtered.push(record);
    }

    if let (Some(first), Some(last)) = (
        filtered.iter().map(|r| r.ts).min(),
        filtered.iter().map(|r| r.ts).max(),
    ) {
        info!(
            "loaded {} entries from [{}] to [{}]",
            filtered.len(),
            first.to_rfc3339(),
            last.to_rfc3339()
        );
    }

    let groups = buckets
        .into_iter()
        .map(|(query, records)| QueryStats::new(query, records))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Aggregation {
        groups,
        records: filtered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RecordReader;
    use chrono::Duration;
    use indoc::indoc;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn record(query: &str, ts_str: &str, exec_time: f64, peak: u64) -> LogRecord {
        let line = format!(
            r#"{{"params":{{"query":{}}},"stats":{{"timings":{{"execTotalTime":{}}},"samples":{{"totalQueryableSamples":{},"peakSamples":{}}}}},"ts":"{}"}}"#,
            serde_json::to_string(query).unwrap(),
            exec_time,
            peak * 10,
            peak,
            ts_str
        );
        serde_json::from_str(&line).unwrap()
    }

    fn aggregate_records(
        records: Vec<LogRecord>,
        window: TimeWindow,
    ) -> Result<Aggregation, DigestError> {
        aggregate(records.into_iter().map(Ok), window)
    }

    #[test]
    fn test_group_construction_rejects_empty_query() {
        let records = vec![record("up", "2024-03-01T00:00:00Z", 1.0, 1)];
        let err = QueryStats::new(String::new(), records).unwrap_err();
        assert!(matches!(err, DigestError::EmptyQuery));
    }

    #[test]
    fn test_group_construction_rejects_empty_records() {
        let err = QueryStats::new("up".to_string(), Vec::new()).unwrap_err();
        assert!(matches!(err, DigestError::EmptyGroup));
    }

    #[test]
    fn test_avg_and_max_provenance() {
        let records = vec![
            record("up", "2024-03-01T00:00:00Z", 1.0, 1),
            record("up", "2024-03-01T00:01:00Z", 2.0, 2),
            record("up", "2024-03-01T00:02:00Z", 3.0, 3),
        ];
        let stats = QueryStats::new("up".to_string(), records).unwrap();

        assert_eq!(stats.avg_exec_total_time, 2.0);
        assert_eq!(
            stats.max_exec_total_time_record().ts,
            ts("2024-03-01T00:02:00Z")
        );
    }

    #[test]
    fn test_max_tie_keeps_first_record() {
        let records = vec![
            record("up", "2024-03-01T00:00:00Z", 5.0, 7),
            record("up", "2024-03-01T00:01:00Z", 5.0, 7),
        ];
        let stats = QueryStats::new("up".to_string(), records).unwrap();

        assert_eq!(
            stats.max_exec_total_time_record().ts,
            ts("2024-03-01T00:00:00Z")
        );
        assert_eq!(stats.max_peak_samples_record().ts, ts("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn test_grouping_partitions_filtered_records() {
        let records = vec![
            record("up", "2024-03-01T00:00:00Z", 1.0, 1),
            record("rate(x[5m])", "2024-03-01T00:01:00Z", 2.0, 2),
            record("up", "2024-03-01T00:02:00Z", 3.0, 3),
        ];
        let agg = aggregate_records(records, TimeWindow::default()).unwrap();

        assert_eq!(agg.records.len(), 3);
        let grouped: usize = agg.groups.iter().map(QueryStats::count).sum();
        assert_eq!(grouped, agg.records.len());

        // Groups keep first-arrival order.
        assert_eq!(agg.groups[0].query(), "up");
        assert_eq!(agg.groups[1].query(), "rate(x[5m])");
        assert_eq!(agg.groups[0].count(), 2);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let from = ts("2024-03-01T00:00:00Z");
        let to = ts("2024-03-01T01:00:00Z");
        let window = TimeWindow {
            from: Some(from),
            to: Some(to),
        };

        assert!(window.contains(from));
        assert!(window.contains(to));
        assert!(!window.contains(from - Duration::microseconds(1)));
        assert!(!window.contains(to + Duration::microseconds(1)));
    }

    #[test]
    fn test_window_filters_before_grouping() {
        let records = vec![
            record("up", "2024-02-29T23:59:59Z", 1.0, 1),
            record("up", "2024-03-01T00:00:00Z", 2.0, 2),
            record("up", "2024-03-01T02:00:00Z", 3.0, 3),
        ];
        let window = TimeWindow {
            from: Some(ts("2024-03-01T00:00:00Z")),
            to: Some(ts("2024-03-01T01:00:00Z")),
        };
        let agg = aggregate_records(records, window).unwrap();

        assert_eq!(agg.records.len(), 1);
        assert_eq!(agg.groups.len(), 1);
        assert_eq!(agg.groups[0].avg_exec_total_time, 2.0);
    }

    #[test]
    fn test_decode_error_aborts_aggregation() {
        let log = indoc! {r#"
            {"params":{"query":"up"},"ts":"2024-03-01T00:00:00Z"}
            not json
        "#};
        let err = aggregate(RecordReader::new(log.as_bytes()), TimeWindow::default()).unwrap_err();
        assert!(matches!(err, DigestError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn test_empty_query_lines_yield_zero_groups() {
        let log = r#"{"params":{"query":""},"ts":"2024-03-01T00:00:00Z"}"#;
        let agg = aggregate(RecordReader::new(log.as_bytes()), TimeWindow::default()).unwrap();

        assert!(agg.groups.is_empty());
        assert!(agg.records.is_empty());
    }

    #[test]
    fn test_value_extraction_covers_all_filtered_records() {
        let records = vec![
            record("up", "2024-03-01T00:00:00Z", 1.5, 4),
            record("down", "2024-03-01T00:01:00Z", 0.5, 9),
        ];
        let agg = aggregate_records(records, TimeWindow::default()).unwrap();

        assert_eq!(agg.exec_total_times(), vec![1.5, 0.5]);
        assert_eq!(agg.total_queryable_samples(), vec![40, 90]);
        assert_eq!(agg.peak_samples(), vec![4, 9]);
    }
}
