//! CLI application for invoice ingestion and correction.

mod commands;
mod context;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, ingest, records, sync};

/// Invoice manager - store PDF invoices by content and extract their fields
#[derive(Parser)]
#[command(name = "invox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest invoice PDFs
    Ingest(ingest::IngestArgs),

    /// List stored invoices
    List(records::ListArgs),

    /// Show one invoice
    Show(records::HashArgs),

    /// Show whether an invoice and its file exist
    Exists(records::HashArgs),

    /// Correct invoice fields
    Update(records::UpdateArgs),

    /// Print a time-limited link to an invoice file
    Link(records::LinkArgs),

    /// Reconcile file flags with the object store
    Sync,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Config(args) => config::run(args, config_path).await,
        Commands::Sync => sync::run(config_path).await,
        command => {
            let app = context::App::load(config_path)?;
            app.startup_sweep().await;
            match command {
                Commands::Ingest(args) => ingest::run(args, &app).await,
                Commands::List(args) => records::list(args, &app).await,
                Commands::Show(args) => records::show(args, &app).await,
                Commands::Exists(args) => records::exists(args, &app).await,
                Commands::Update(args) => records::update(args, &app).await,
                Commands::Link(args) => records::link(args, &app).await,
                Commands::Sync | Commands::Config(_) => Ok(()),
            }
        }
    }
}
