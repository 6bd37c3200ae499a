use std::cmp::Ordering;
use std::fmt;

use crate::aggregator::QueryStats;
use crate::parser::LogRecord;

/// The six ranking dimensions, each carrying its report title, unit and
/// value extractor so one render loop can drive every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    AvgExecTotalTime,
    MaxExecTotalTime,
    AvgTotalQueryableSamples,
    MaxTotalQueryableSamples,
    AvgPeakSamples,
    MaxPeakSamples,
}

/// A metric observation. Durations and averages are floats and print to
/// three decimals; maxima of the sample counters stay integers so they
/// compare and print exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Float(f64),
    Count(u64),
}

impl MetricValue {
    fn partial_cmp_same(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Count(a), Self::Count(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v:.3}"),
            Self::Count(v) => write!(f, "{v}"),
        }
    }
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::AvgExecTotalTime,
        Metric::MaxExecTotalTime,
        Metric::AvgTotalQueryableSamples,
        Metric::MaxTotalQueryableSamples,
        Metric::AvgPeakSamples,
        Metric::MaxPeakSamples,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Metric::AvgExecTotalTime => "average execution time",
            Metric::MaxExecTotalTime => "max execution time",
            Metric::AvgTotalQueryableSamples => "average total queryable samples",
            Metric::MaxTotalQueryableSamples => "max total queryable samples",
            Metric::AvgPeakSamples => "average peak samples",
            Metric::MaxPeakSamples => "max peak samples",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::AvgExecTotalTime | Metric::MaxExecTotalTime => "s",
            _ => "",
        }
    }

    pub fn value(&self, group: &QueryStats) -> MetricValue {
        match self {
            Metric::AvgExecTotalTime => MetricValue::Float(group.avg_exec_total_time),
            Metric::MaxExecTotalTime => MetricValue::Float(
                group.max_exec_total_time_record().stats.timings.exec_total_time,
            ),
            Metric::AvgTotalQueryableSamples => {
                MetricValue::Float(group.avg_total_queryable_samples)
            }
            Metric::MaxTotalQueryableSamples => MetricValue::Count(
                group
                    .max_total_queryable_samples_record()
                    .stats
                    .samples
                    .total_queryable_samples,
            ),
            Metric::AvgPeakSamples => MetricValue::Float(group.avg_peak_samples),
            Metric::MaxPeakSamples => MetricValue::Count(
                group.max_peak_samples_record().stats.samples.peak_samples,
            ),
        }
    }

    /// Whether this metric reports a per-group maximum (and therefore has a
    /// provenance record) rather than a mean.
    pub fn is_max(&self) -> bool {
        matches!(
            self,
            Metric::MaxExecTotalTime | Metric::MaxTotalQueryableSamples | Metric::MaxPeakSamples
        )
    }

    /// The record that set the maximum, for metrics that have one.
    pub fn provenance<'a>(&self, group: &'a QueryStats) -> Option<&'a LogRecord> {
        match self {
            Metric::MaxExecTotalTime => Some(group.max_exec_total_time_record()),
            Metric::MaxTotalQueryableSamples => Some(group.max_total_queryable_samples_record()),
            Metric::MaxPeakSamples => Some(group.max_peak_samples_record()),
            _ => None,
        }
    }
}

/// Sorts the groups by `metric`, descending, and keeps the first
/// `min(count, groups.len())`.
///
/// The sort is stable, so groups with equal values rank in the order they
/// first appeared in the log.
pub fn rank(groups: &[QueryStats], metric: Metric, count: usize) -> Vec<&QueryStats> {
    let mut ranked: Vec<&QueryStats> = groups.iter().collect();
    ranked.sort_by(|a, b| {
        metric
            .value(b)
            .partial_cmp_same(&metric.value(a))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(count.min(ranked.len()));
    ranked
}
