//! Ingest command - store invoice PDFs and persist their records.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use invox_core::{FormFields, IngestError, IngestionPipeline, InvoiceRecord, Upload};

use crate::context::App;

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Invoice number to record
    #[arg(long)]
    id: Option<String>,

    /// Invoice date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Invoice total
    #[arg(long)]
    amount: Option<String>,

    /// Mark as paid
    #[arg(long)]
    paid: bool,

    /// Mark as reviewed
    #[arg(long)]
    reviewed: bool,

    /// Skip automatic field extraction
    #[arg(long)]
    no_llm: bool,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

impl IngestArgs {
    /// Form values, if any field was given on the command line.
    fn form(&self) -> Option<FormFields> {
        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(id) = &self.id {
            pairs.push(("id", id.clone()));
        }
        if let Some(date) = &self.date {
            pairs.push(("date", date.clone()));
        }
        if let Some(amount) = &self.amount {
            pairs.push(("amount", amount.clone()));
        }
        if self.paid {
            pairs.push(("isPaid", "true".to_string()));
        }
        if self.reviewed {
            pairs.push(("isReviewed", "true".to_string()));
        }

        if pairs.is_empty() {
            return None;
        }
        let form = FormFields::parse(pairs);
        if self.date.is_some() && form.invoice_date.is_none() {
            warn!("Ignoring unparsable --date");
        }
        if self.amount.is_some() && form.amount.is_none() {
            warn!("Ignoring unparsable --amount");
        }
        Some(form)
    }
}

enum Outcome {
    Stored(InvoiceRecord),
    Duplicate(String),
    Failed(String),
}

pub async fn run(args: IngestArgs, app: &App) -> anyhow::Result<()> {
    let start = Instant::now();

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(" "));
    }

    let pipeline = app.pipeline(!args.no_llm)?;
    let form = args.form();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let outcome = tokio::select! {
            outcome = ingest_file(&pipeline, &path, form.as_ref()) => outcome,
            _ = tokio::signal::ctrl_c() => {
                pb.abandon();
                anyhow::bail!("Interrupted while ingesting {}", path.display());
            }
        };

        if let Outcome::Failed(msg) = &outcome {
            if !args.continue_on_error {
                pb.abandon();
                error!("Failed to ingest {}: {}", path.display(), msg);
                anyhow::bail!("Ingestion failed: {}", msg);
            }
            warn!("Failed to ingest {}: {}", path.display(), msg);
        }

        results.push((path, outcome));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let mut stored = 0;
    let mut duplicates = 0;
    let mut failed = 0;
    for (path, outcome) in &results {
        match outcome {
            Outcome::Stored(record) => {
                stored += 1;
                println!(
                    "{} {} {}",
                    style("✓").green(),
                    path.display(),
                    style(&record.content_hash).dim()
                );
            }
            Outcome::Duplicate(key) => {
                duplicates += 1;
                println!(
                    "{} {} already stored as {}",
                    style("ℹ").blue(),
                    path.display(),
                    key
                );
            }
            Outcome::Failed(msg) => {
                failed += 1;
                println!("{} {}: {}", style("✗").red(), path.display(), msg);
            }
        }
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} stored, {} duplicate, {} failed",
        style(stored).green(),
        style(duplicates).blue(),
        style(failed).red()
    );

    if failed > 0 {
        anyhow::bail!("{} files failed to ingest", failed);
    }
    Ok(())
}

async fn ingest_file(pipeline: &IngestionPipeline, path: &Path, form: Option<&FormFields>) -> Outcome {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => return Outcome::Failed(e.to_string()),
    };
    let mut upload = Upload::new(file_name(path), file);
    if let Ok(meta) = upload.reader.metadata().await {
        upload = upload.with_declared_size(meta.len());
    }

    match pipeline.ingest(upload, form).await {
        Ok(record) => Outcome::Stored(record),
        Err(IngestError::Conflict { key }) => Outcome::Duplicate(key),
        Err(e) => {
            let hint = if e.is_retryable() { " (retryable)" } else { "" };
            Outcome::Failed(format!("{}{}", e, hint))
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Expand each input as a glob pattern. A pattern matching nothing is kept
/// as a literal path so the failure is reported for it.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let matched: Vec<PathBuf> = glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            files.push(PathBuf::from(input));
        } else {
            files.extend(matched);
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}
