use chrono::{DateTime, Utc};
use log::warn;
use serde::Deserialize;
use std::io::BufRead;

use crate::error::DigestError;

/// One decoded query log line.
///
/// The wire format is the engine's JSON query log: one object per line with
/// nested `params`, `stats` and optional `ruleGroup` sections. Fields not
/// listed here are ignored, and numeric fields the logging configuration
/// left out decode to zero.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub stats: Stats,
    #[serde(rename = "ruleGroup")]
    pub rule_group: Option<RuleGroup>,
    /// When the query ran. A record without a timestamp is malformed.
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    /// The literal query text, the grouping key. May decode empty; the
    /// reader skips such records.
    #[serde(default)]
    pub query: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub timings: Timings,
    #[serde(default)]
    pub samples: Samples,
}

/// Per-phase durations in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    #[serde(default)]
    pub eval_total_time: f64,
    #[serde(default)]
    pub exec_queue_time: f64,
    #[serde(default)]
    pub exec_total_time: f64,
    #[serde(default)]
    pub inner_eval_time: f64,
    #[serde(default)]
    pub query_preparation_time: f64,
    #[serde(default)]
    pub result_sort_time: f64,
}

/// Sample counters. Only present when the engine logs sample statistics.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Samples {
    #[serde(default)]
    pub total_queryable_samples: u64,
    #[serde(default)]
    pub peak_samples: u64,
}

/// Provenance for queries issued by an alerting or recording rule.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file: String,
}

/// Reads a query log line by line, yielding decoded records.
///
/// Records with an empty query are logged and skipped; the first line that
/// fails to decode ends the iteration with a `MalformedRecord` carrying its
/// 1-based line number.
pub struct RecordReader<R> {
    reader: R,
    line_buffer: String,
    line_num: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buffer: String::new(),
            line_num: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<LogRecord, DigestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_buffer.clear();
            match self.reader.read_line(&mut self.line_buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(DigestError::Io(e))),
            }
            self.line_num += 1;

            match serde_json::from_str::<LogRecord>(&self.line_buffer) {
                Ok(record) if record.params.query.is_empty() => {
                    warn!("skipping line {}: empty query", self.line_num);
                }
                Ok(record) => return Some(Ok(record)),
                Err(source) => {
                    return Some(Err(DigestError::MalformedRecord {
                        line: self.line_num,
                        source,
                    }))
                }
            }
        }
    }
}
