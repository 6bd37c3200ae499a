mod aggregator;
mod error;
mod parser;
mod percentile;
mod ranker;
mod report;

use chrono::{DateTime, Utc};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::aggregator::TimeWindow;
use crate::error::DigestError;
use crate::parser::RecordReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the query log file. Pass '-' to read from stdin
    #[arg(short = 'f', long = "file", default_value = "-")]
    file: String,

    /// Load log entries at or after this time (RFC 3339, e.g. 2024-03-01T00:00:00Z)
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Load log entries at or before this time (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    /// Number of top queries to display per view
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Percentile rank for the summary lines
    #[arg(short = 'p', long = "percentile", default_value_t = 95)]
    percentile: i64,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !(1..=100).contains(&args.percentile) {
        return Err(DigestError::InvalidRank(args.percentile).into());
    }

    let reader: Box<dyn BufRead> = if args.file == "-" {
        info!("reading the query log from stdin");
        Box::new(BufReader::new(io::stdin()))
    } else {
        info!("reading the query log from {}", args.file);
        let file = File::open(&args.file).map_err(|source| DigestError::SourceUnavailable {
            path: args.file.clone(),
            source,
        })?;
        Box::new(BufReader::new(file))
    };

    let window = TimeWindow {
        from: args.from,
        to: args.to,
    };
    let agg = aggregator::aggregate(RecordReader::new(reader), window)?;
    if agg.groups.is_empty() {
        return Err(DigestError::EmptyLog.into());
    }

    let mut writer: Box<dyn Write> = if let Some(path) = &args.output {
        Box::new(File::create(path)?)
    } else {
        Box::new(io::stdout())
    };
    report::print_report(&agg, args.percentile, args.top, &mut writer)?;

    Ok(())
}
