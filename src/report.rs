use regex::Regex;
use std::io::Write;
use std::sync::OnceLock;
use tabled::{Table, Tabled};

use crate::aggregator::{Aggregation, QueryStats};
use crate::percentile::percentile;
use crate::ranker::{rank, Metric};

static RE_NEWLINE: OnceLock<Regex> = OnceLock::new();

#[derive(Tabled)]
struct AvgRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Query ID")]
    query_id: String,
    #[tabled(rename = "Query")]
    query: String,
    #[tabled(rename = "Rule Group")]
    rule_group: String,
}

#[derive(Tabled)]
struct MaxRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Query ID")]
    query_id: String,
    #[tabled(rename = "Query")]
    query: String,
    #[tabled(rename = "Rule Group")]
    rule_group: String,
}

/// Prints the full digest: three percentile summary lines interleaved with
/// the six ranked views, in the same order the metrics are extracted.
pub fn print_report(
    agg: &Aggregation,
    percentile_rank: i64,
    top: usize,
    writer: &mut dyn Write,
) -> anyhow::Result<()> {
    let top = top.min(agg.groups.len());

    let p = percentile(percentile_rank, &mut agg.exec_total_times())?;
    writeln!(writer)?;
    writeln!(
        writer,
        "The {}th percentile of total execution time is {:.3} seconds",
        percentile_rank, p
    )?;
    print_view(writer, agg, Metric::AvgExecTotalTime, top)?;
    print_view(writer, agg, Metric::MaxExecTotalTime, top)?;

    let p = percentile(percentile_rank, &mut agg.total_queryable_samples())?;
    writeln!(writer)?;
    writeln!(
        writer,
        "The {}th percentile of total queryable samples is {}",
        percentile_rank, p
    )?;
    print_view(writer, agg, Metric::AvgTotalQueryableSamples, top)?;
    print_view(writer, agg, Metric::MaxTotalQueryableSamples, top)?;

    let p = percentile(percentile_rank, &mut agg.peak_samples())?;
    writeln!(writer)?;
    writeln!(
        writer,
        "The {}th percentile of peak samples is {}",
        percentile_rank, p
    )?;
    print_view(writer, agg, Metric::AvgPeakSamples, top)?;
    print_view(writer, agg, Metric::MaxPeakSamples, top)?;

    Ok(())
}

fn print_view(
    writer: &mut dyn Write,
    agg: &Aggregation,
    metric: Metric,
    top: usize,
) -> anyhow::Result<()> {
    let ranked = rank(&agg.groups, metric, top);

    writeln!(writer)?;
    writeln!(writer, "Top {} queries by {}:", top, metric.title())?;
    let table = if metric.is_max() {
        let rows: Vec<MaxRow> = ranked
            .iter()
            .enumerate()
            .map(|(i, group)| MaxRow {
                rank: i + 1,
                time: metric
                    .provenance(group)
                    .map(|record| record.ts.to_rfc3339())
                    .unwrap_or_default(),
                value: format!("{}{}", metric.value(group), metric.unit()),
                query_id: query_id(group.query()),
                query: collapse_newlines(group.query()),
                rule_group: rule_group_name(group),
            })
            .collect();
        Table::new(rows)
    } else {
        let rows: Vec<AvgRow> = ranked
            .iter()
            .enumerate()
            .map(|(i, group)| AvgRow {
                rank: i + 1,
                count: group.count(),
                value: format!("{}{}", metric.value(group), metric.unit()),
                query_id: query_id(group.query()),
                query: collapse_newlines(group.query()),
                rule_group: rule_group_name(group),
            })
            .collect();
        Table::new(rows)
    };
    writeln!(writer, "{}", table)?;
    Ok(())
}

fn query_id(query: &str) -> String {
    format!("{:x}", md5::compute(query))
}

/// Collapses embedded newlines and their indentation so a multi-line query
/// renders as one row.
fn collapse_newlines(query: &str) -> String {
    let re = RE_NEWLINE.get_or_init(|| Regex::new(r"\n\s*").unwrap());
    re.replace_all(query, "").into_owned()
}

/// The annotation shown when the group's first record came from an
/// alerting or recording rule.
fn rule_group_name(group: &QueryStats) -> String {
    group.records()[0]
        .rule_group
        .as_ref()
        .map(|rg| rg.name.clone())
        .unwrap_or_default()
}
