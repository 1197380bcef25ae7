//! Per-guide audit of a single TISS file.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;

use tissrec_core::{audit_bytes, GuideAudit};

use super::{load_config, OutputFormat};

/// Arguments for the audit command.
#[derive(Args)]
pub struct AuditArgs {
    /// TISS XML file to audit
    input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,
}

pub fn run(args: AuditArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    // Config carries no audit knobs today; loading still validates the file.
    let _config = load_config(config_path)?;

    let bytes = fs::read(&args.input)?;
    let name = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document.xml");
    let rows = audit_bytes(&bytes, name)?;

    let content = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&rows)?,
        OutputFormat::Csv => rows_to_csv(&rows)?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, content)?;
            println!(
                "{} {} guide row(s) written to {}",
                style("✓").green(),
                rows.len(),
                path.display()
            );
        }
        None => print!("{content}"),
    }
    Ok(())
}

/// Flatten the audit variants into one CSV table; fields that do not
/// apply to a row's kind stay empty.
fn rows_to_csv(rows: &[GuideAudit]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "kind",
        "file_name",
        "lot_number",
        "protocol",
        "provider_guide",
        "origin_guide",
        "operator_guide",
        "date",
        "patient_card",
        "provider_code",
        "total",
        "declared_total",
        "procedure_items",
        "other_expense_items",
        "itemized_total",
    ])?;

    for row in rows {
        let date = |d: &Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        match row {
            GuideAudit::Consultation {
                file_name,
                lot_number,
                provider_guide,
                service_date,
                patient_card,
                provider_code,
                total,
            } => wtr.write_record([
                "CONSULTATION",
                file_name,
                lot_number,
                "",
                provider_guide,
                "",
                "",
                &date(service_date),
                patient_card,
                provider_code,
                &total.to_string(),
                "",
                "",
                "",
                "",
            ])?,
            GuideAudit::Sadt {
                file_name,
                lot_number,
                provider_guide,
                service_date,
                patient_card,
                provider_code,
                declared_total,
                procedure_items,
                other_expense_items,
                itemized_total,
            } => wtr.write_record([
                "SADT",
                file_name,
                lot_number,
                "",
                provider_guide,
                "",
                "",
                &date(service_date),
                patient_card,
                provider_code,
                "",
                &declared_total.to_string(),
                &procedure_items.to_string(),
                &other_expense_items.to_string(),
                &itemized_total.to_string(),
            ])?,
            GuideAudit::Appeal {
                file_name,
                lot_number,
                protocol,
                origin_guide,
                operator_guide,
                appeal_date,
                patient_card,
                provider_code,
            } => wtr.write_record([
                "APPEAL",
                file_name,
                lot_number,
                protocol,
                "",
                origin_guide,
                operator_guide,
                &date(appeal_date),
                patient_card,
                provider_code,
                "",
                "",
                "",
                "",
                "",
            ])?,
        }
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}
