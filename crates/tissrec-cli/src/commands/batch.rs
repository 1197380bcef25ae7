//! Batch processing: parse TISS XML files, ingest demonstratives,
//! reconcile.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::debug;

use tissrec_core::demonstrative::{read_statement_file, DemonstrativeBank};
use tissrec_core::recon::{reconcile, ReconciliationRecord};
use tissrec_core::{lot_from_filename, parse_document, DocumentKind, SummaryRecord};

use super::{load_config, OutputFormat};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input directory or glob pattern of TISS XML files
    #[arg(required = true)]
    input: String,

    /// Demonstrative workbook(s) (.xlsx) to reconcile against
    #[arg(short, long = "demonstrative")]
    demonstratives: Vec<PathBuf>,

    /// Output directory for the result tables
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for the result tables
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,
}

pub fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files = expand_input(&args.input)?;
    if files.is_empty() {
        anyhow::bail!("no matching XML files found for: {}", args.input);
    }
    println!("{} Found {} XML file(s)", style("ℹ").blue(), files.len());

    // Demonstrative structural failures abort the run: the workbook is
    // incompatible, not merely dirty.
    let mut bank = DemonstrativeBank::new();
    for path in &args.demonstratives {
        let statement = read_statement_file(path, &config.demonstrative)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        bank.merge(&statement);
    }
    if !bank.is_empty() {
        println!(
            "{} Demonstrative bank holds {} known lot(s)",
            style("ℹ").blue(),
            bank.known_lots().len()
        );
    }

    let documents: Vec<(String, Vec<u8>)> = files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("document.xml")
                .to_string();
            Ok((name, fs::read(path)?))
        })
        .collect::<anyhow::Result<_>>()?;

    let progress = ProgressBar::new(documents.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    // Per-document parses share nothing; results come back in file order.
    let mut summaries: Vec<SummaryRecord> = documents
        .par_iter()
        .map(|(name, bytes)| {
            let record = parse_document(bytes, name)
                .unwrap_or_else(|e| SummaryRecord::failed(name, e.to_string()));
            progress.inc(1);
            record
        })
        .collect();
    progress.finish_and_clear();

    summaries.sort_by(|a, b| {
        (&a.lot_number, a.kind.as_str(), &a.file_name)
            .cmp(&(&b.lot_number, b.kind.as_str(), &b.file_name))
    });

    print_summaries(&summaries);
    let aggregate = aggregate_by_lot(&summaries);
    print_aggregate(&aggregate);

    let records = reconcile(&summaries, &bank, &config.reconciliation);
    if !bank.is_empty() {
        print_reconciliation(&records);
    }

    print_alerts(&summaries);

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
        write_outputs(output_dir, args.format, &summaries, &aggregate, &records)?;
        println!(
            "{} Result tables written to {}",
            style("✓").green(),
            output_dir.display()
        );
    }

    let failed = summaries.iter().filter(|s| s.error.is_some()).count();
    println!(
        "{} Processed {} file(s) in {:?} ({} failed)",
        style("✓").green(),
        summaries.len(),
        start.elapsed(),
        failed
    );
    Ok(())
}

/// Accept either a directory or a glob pattern.
fn expand_input(input: &str) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = if PathBuf::from(input).is_dir() {
        format!("{}/*.xml", input.trim_end_matches('/'))
    } else {
        input.to_string()
    };
    let mut files: Vec<PathBuf> = glob(&pattern)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
        })
        .collect();
    files.sort();
    debug!("expanded {input} to {} file(s)", files.len());
    Ok(files)
}

#[derive(serde::Serialize)]
struct AggregateRow {
    lot_number: String,
    kind: DocumentKind,
    file_count: usize,
    guide_count: usize,
    total: Decimal,
}

/// Per-(lot, kind) aggregation of the summary table.
fn aggregate_by_lot(summaries: &[SummaryRecord]) -> Vec<AggregateRow> {
    let mut groups: BTreeMap<(String, &'static str), AggregateRow> = BTreeMap::new();
    for summary in summaries {
        let row = groups
            .entry((summary.lot_number.clone(), summary.kind.as_str()))
            .or_insert_with(|| AggregateRow {
                lot_number: summary.lot_number.clone(),
                kind: summary.kind,
                file_count: 0,
                guide_count: 0,
                total: Decimal::ZERO,
            });
        row.file_count += 1;
        row.guide_count += summary.guide_count;
        row.total += summary.total;
    }
    groups.into_values().collect()
}

fn print_summaries(summaries: &[SummaryRecord]) {
    println!();
    println!("{}", style("Summary per file").bold());
    println!(
        "{:<12} {:<13} {:>6} {:>12}  {:<28} {}",
        "lot", "kind", "guides", "total", "strategy", "file"
    );
    for s in summaries {
        println!(
            "{:<12} {:<13} {:>6} {:>12}  {:<28} {}",
            s.lot_number,
            s.kind.as_str(),
            s.guide_count,
            s.total.round_dp(2),
            s.strategy,
            s.file_name
        );
    }
}

fn print_aggregate(rows: &[AggregateRow]) {
    println!();
    println!("{}", style("Aggregate per lot and kind").bold());
    println!(
        "{:<12} {:<13} {:>6} {:>7} {:>12}",
        "lot", "kind", "files", "guides", "total"
    );
    for row in rows {
        println!(
            "{:<12} {:<13} {:>6} {:>7} {:>12}",
            row.lot_number,
            row.kind.as_str(),
            row.file_count,
            row.guide_count,
            row.total.round_dp(2)
        );
    }
}

fn print_reconciliation(records: &[ReconciliationRecord]) {
    println!();
    println!("{}", style("Reconciliation (XML × demonstrative)").bold());
    println!(
        "{:<24} {:<10} {:>12} {:>12} {:>10} {:>8} {:>8}",
        "key", "period", "xml total", "presented", "diff", "match", "stmt ok"
    );
    for r in records {
        println!(
            "{:<24} {:<10} {:>12} {:>12} {:>10} {:>8} {:>8}",
            r.key,
            r.period.as_deref().unwrap_or("-"),
            r.xml_total.round_dp(2),
            r.presented
                .map(|v| v.round_dp(2).to_string())
                .unwrap_or_else(|| "-".to_string()),
            r.presented_diff.round_dp(2),
            if r.presented_matches { "yes" } else { "NO" },
            if r.statement_consistent { "yes" } else { "NO" },
        );
    }
}

fn print_alerts(summaries: &[SummaryRecord]) {
    let suspects: Vec<&str> = summaries
        .iter()
        .filter(|s| s.error.is_none() && s.is_suspect())
        .map(|s| s.file_name.as_str())
        .collect();
    if !suspects.is_empty() {
        println!(
            "{} {} file(s) with guides but zero total: {}",
            style("⚠").yellow(),
            suspects.len(),
            suspects.join(", ")
        );
    }

    let failed: Vec<&SummaryRecord> = summaries.iter().filter(|s| s.error.is_some()).collect();
    if !failed.is_empty() {
        println!("{}", style("Failed files:").red());
        for s in &failed {
            println!("  - {}: {}", s.file_name, s.error.as_deref().unwrap_or("unknown error"));
        }
    }
}

fn write_outputs(
    output_dir: &std::path::Path,
    format: OutputFormat,
    summaries: &[SummaryRecord],
    aggregate: &[AggregateRow],
    records: &[ReconciliationRecord],
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            fs::write(
                output_dir.join("summary.json"),
                serde_json::to_string_pretty(summaries)?,
            )?;
            fs::write(
                output_dir.join("aggregate.json"),
                serde_json::to_string_pretty(aggregate)?,
            )?;
            fs::write(
                output_dir.join("reconciliation.json"),
                serde_json::to_string_pretty(records)?,
            )?;
        }
        OutputFormat::Csv => {
            write_summary_csv(&output_dir.join("summary.csv"), summaries)?;
            write_aggregate_csv(&output_dir.join("aggregate.csv"), aggregate)?;
            write_reconciliation_csv(&output_dir.join("reconciliation.csv"), records)?;
        }
    }
    Ok(())
}

fn write_summary_csv(path: &std::path::Path, summaries: &[SummaryRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "lot_number",
        "protocol",
        "kind",
        "guide_count",
        "total",
        "strategy",
        "file_name",
        "file_lot",
        "lot_matches_filename",
        "suspect",
        "error",
    ])?;
    for s in summaries {
        let file_lot = lot_from_filename(&s.file_name).unwrap_or_default();
        let lot_matches = !file_lot.is_empty() && file_lot == s.lot_number;
        wtr.write_record([
            s.lot_number.as_str(),
            s.protocol.as_deref().unwrap_or(""),
            s.kind.as_str(),
            &s.guide_count.to_string(),
            &s.total.to_string(),
            s.strategy.as_str(),
            s.file_name.as_str(),
            file_lot.as_str(),
            &lot_matches.to_string(),
            &s.is_suspect().to_string(),
            s.error.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_aggregate_csv(path: &std::path::Path, rows: &[AggregateRow]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["lot_number", "kind", "file_count", "guide_count", "total"])?;
    for row in rows {
        wtr.write_record([
            row.lot_number.as_str(),
            row.kind.as_str(),
            &row.file_count.to_string(),
            &row.guide_count.to_string(),
            &row.total.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_reconciliation_csv(
    path: &std::path::Path,
    records: &[ReconciliationRecord],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "key",
        "lot",
        "kind",
        "period",
        "file_count",
        "guide_count",
        "xml_total",
        "presented",
        "approved",
        "withheld",
        "approved_plus_withheld",
        "presented_diff",
        "presented_matches",
        "statement_consistent",
        "xml_lot",
        "file_lot",
    ])?;
    for r in records {
        let approved_plus_withheld =
            r.approved.unwrap_or_default() + r.withheld.unwrap_or_default();
        wtr.write_record([
            r.key.as_str(),
            r.lot.as_deref().unwrap_or(""),
            r.kind.as_str(),
            r.period.as_deref().unwrap_or(""),
            &r.file_count.to_string(),
            &r.guide_count.to_string(),
            &r.xml_total.to_string(),
            &r.presented.map(|v| v.to_string()).unwrap_or_default(),
            &r.approved.map(|v| v.to_string()).unwrap_or_default(),
            &r.withheld.map(|v| v.to_string()).unwrap_or_default(),
            &approved_plus_withheld.to_string(),
            &r.presented_diff.to_string(),
            &r.presented_matches.to_string(),
            &r.statement_consistent.to_string(),
            r.xml_lot.as_deref().unwrap_or(""),
            r.file_lot.as_deref().unwrap_or(""),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
