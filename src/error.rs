use thiserror::Error;

/// Everything that can stop a digest run.
///
/// The only recoverable condition in the pipeline (a structurally valid
/// record with an empty query) never surfaces here; it is logged and
/// skipped by the decoder.
#[derive(Error, Debug)]
pub enum DigestError {
    /// A line that could not be decoded as a query log record. Fatal for
    /// the whole run; `line` is 1-based.
    #[error("failed to parse line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The stream broke mid-scan.
    #[error("failed to read the query log: {0}")]
    Io(#[from] std::io::Error),

    /// Percentile rank outside 1..=100.
    #[error("percentile rank {0} is out of range, must be between 1 and 100")]
    InvalidRank(i64),

    /// Percentile requested over zero samples.
    #[error("cannot compute a percentile over an empty sample set")]
    EmptyInput,

    /// The log yielded no query groups at all.
    #[error("loaded 0 queries")]
    EmptyLog,

    /// The configured input could not be opened.
    #[error("failed to open the query log at {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Group constructor guard: the grouping key must not be empty.
    #[error("a query cannot be empty")]
    EmptyQuery,

    /// Group constructor guard: a group must hold at least one record.
    #[error("a query group must contain at least one record")]
    EmptyGroup,
}
