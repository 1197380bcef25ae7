//! Duplicate-guide removal across files.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use tissrec_core::{audit_bytes, find_duplicates, remove_guides, GuideAudit};

/// Arguments for the dedupe command.
#[derive(Args)]
pub struct DedupeArgs {
    /// Base file to rewrite
    base: PathBuf,

    /// Files to compare against
    #[arg(required = true)]
    others: Vec<PathBuf>,

    /// Where to write the rewritten base file
    #[arg(short, long)]
    output: PathBuf,
}

pub fn run(args: DedupeArgs) -> anyhow::Result<()> {
    let base_bytes = fs::read(&args.base)?;
    let base_name = file_name(&args.base);
    let base_rows = audit_bytes(&base_bytes, &base_name)?;

    let mut other_rows: Vec<GuideAudit> = Vec::new();
    for path in &args.others {
        let bytes = fs::read(path)?;
        other_rows.extend(audit_bytes(&bytes, &file_name(path))?);
    }

    let duplicates = find_duplicates(&base_rows, &other_rows);
    if duplicates.is_empty() {
        println!("{} No duplicated guides found", style("✓").green());
        fs::write(&args.output, &base_bytes)?;
        return Ok(());
    }

    println!(
        "{} {} duplicated guide(s) in {}:",
        style("⚠").yellow(),
        duplicates.len(),
        base_name
    );
    for guide in &duplicates {
        println!("  - {}", guide.identity_key().unwrap_or("?"));
    }

    let rewritten = remove_guides(&base_bytes, &duplicates)?;
    fs::write(&args.output, rewritten)?;
    println!(
        "{} Rewritten file without duplicates: {}",
        style("✓").green(),
        args.output.display()
    );
    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document.xml")
        .to_string()
}
