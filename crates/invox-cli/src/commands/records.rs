//! Record commands - list, show, check, correct and link invoices.

use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use console::style;
use rust_decimal::Decimal;
use serde::Serialize;

use invox_core::{ContentHash, InvoicePatch, InvoiceRecord, ServiceError};

use super::parse_hash;
use crate::context::App;

/// Output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// A single invoice hash.
#[derive(Args)]
pub struct HashArgs {
    /// Content hash of the invoice
    #[arg(value_parser = parse_hash)]
    hash: ContentHash,
}

/// Arguments for the update command.
#[derive(Args)]
pub struct UpdateArgs {
    /// Content hash of the invoice
    #[arg(value_parser = parse_hash)]
    hash: ContentHash,

    /// Set the invoice number
    #[arg(long, conflicts_with = "clear_id")]
    id: Option<String>,

    /// Clear the invoice number
    #[arg(long)]
    clear_id: bool,

    /// Set the invoice date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "clear_date")]
    date: Option<NaiveDate>,

    /// Clear the invoice date
    #[arg(long)]
    clear_date: bool,

    /// Set the invoice total
    #[arg(long, conflicts_with = "clear_amount")]
    amount: Option<Decimal>,

    /// Clear the invoice total
    #[arg(long)]
    clear_amount: bool,

    /// Set the paid flag
    #[arg(long)]
    paid: Option<bool>,

    /// Set the reviewed flag
    #[arg(long)]
    reviewed: Option<bool>,
}

impl UpdateArgs {
    fn patch(&self) -> InvoicePatch {
        fn field<T: Clone>(value: &Option<T>, clear: bool) -> Option<Option<T>> {
            if clear {
                Some(None)
            } else {
                value.clone().map(Some)
            }
        }

        InvoicePatch {
            external_id: field(&self.id, self.clear_id),
            invoice_date: field(&self.date, self.clear_date),
            amount: field(&self.amount, self.clear_amount),
            is_paid: self.paid,
            is_reviewed: self.reviewed,
        }
    }
}

/// Arguments for the link command.
#[derive(Args)]
pub struct LinkArgs {
    /// Content hash of the invoice
    #[arg(value_parser = parse_hash)]
    hash: ContentHash,

    /// Link lifetime in seconds
    #[arg(long, default_value = "600")]
    ttl_secs: u64,
}

pub async fn list(args: ListArgs, app: &App) -> anyhow::Result<()> {
    let records = app.service().list().await?;
    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&records)?,
        OutputFormat::Csv => format_csv(&records)?,
        OutputFormat::Text => format_text(&records),
    };
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub async fn show(args: HashArgs, app: &App) -> anyhow::Result<()> {
    match app.service().get(&args.hash).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => Err(ServiceError::NotFound(args.hash).into()),
    }
}

pub async fn exists(args: HashArgs, app: &App) -> anyhow::Result<()> {
    let view = app.service().exists(&args.hash).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub async fn update(args: UpdateArgs, app: &App) -> anyhow::Result<()> {
    let patch = args.patch();
    if patch.is_empty() {
        anyhow::bail!("Nothing to update. Pass at least one field option.");
    }

    let record = app.service().update(&args.hash, &patch).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

pub async fn link(args: LinkArgs, app: &App) -> anyhow::Result<()> {
    let url = app
        .service()
        .file_link(&args.hash, Duration::from_secs(args.ttl_secs))
        .await?;
    println!("{}", url);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsvRow<'a> {
    content_hash: &'a str,
    original_file_name: &'a str,
    id: Option<&'a str>,
    date: Option<String>,
    amount: Option<String>,
    is_paid: bool,
    is_reviewed: bool,
    file_exists: bool,
}

fn format_csv(records: &[InvoiceRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(CsvRow {
            content_hash: record.content_hash.as_str(),
            original_file_name: &record.original_file_name,
            id: record.external_id.as_deref(),
            date: record.invoice_date.map(|d| d.to_string()),
            amount: record.amount.map(|a| a.to_string()),
            is_paid: record.is_paid,
            is_reviewed: record.is_reviewed,
            file_exists: record.file_exists,
        })?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(records: &[InvoiceRecord]) -> String {
    if records.is_empty() {
        return "No invoices stored.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let file = if record.file_exists {
            style("file ok").green().to_string()
        } else {
            style("file missing").red().to_string()
        };
        let flags = match (record.is_paid, record.is_reviewed) {
            (true, true) => "paid, reviewed",
            (true, false) => "paid",
            (false, true) => "reviewed",
            (false, false) => "open",
        };
        out.push_str(&format!(
            "{}  {}\n    id: {}  date: {}  amount: {}  [{}] {}\n",
            style(&record.content_hash.as_str()[..12]).dim(),
            record.original_file_name,
            record.external_id.as_deref().unwrap_or("-"),
            record
                .invoice_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .amount
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
            flags,
            file
        ));
    }
    out
}
