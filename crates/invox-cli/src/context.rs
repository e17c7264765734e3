//! Configuration loading and collaborator wiring shared by commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, warn};

use invox_core::models::config::AppConfig;
use invox_core::{
    AutoFieldExtractor, FsObjectStore, IngestionPipeline, InvoiceService, OpenAiClient,
    ReconciliationSweep, SqliteInvoiceStore,
};

/// Default configuration file, `<config_dir>/invox/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("invox")
        .join("config.json")
}

/// Load `path`, or the default file if it exists, or built-in defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    if let Some(path) = path {
        return AppConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        AppConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()))
    } else {
        debug!("No config file at {}, using defaults", default_path.display());
        Ok(AppConfig::default())
    }
}

/// Opened collaborators for one CLI invocation.
pub struct App {
    pub config: AppConfig,
    objects: Arc<FsObjectStore>,
    invoices: Arc<SqliteInvoiceStore>,
}

impl App {
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        Self::open(load_config(config_path)?)
    }

    pub fn open(config: AppConfig) -> anyhow::Result<Self> {
        let objects = Arc::new(FsObjectStore::new(&config.storage.objects_dir));
        let invoices = Arc::new(
            SqliteInvoiceStore::open(&config.storage.database_path).with_context(|| {
                format!(
                    "Failed to open database {}",
                    config.storage.database_path.display()
                )
            })?,
        );
        Ok(Self {
            config,
            objects,
            invoices,
        })
    }

    /// Build the ingestion pipeline. The language model is attached only when
    /// `use_llm` is set and the configuration yields a client.
    pub fn pipeline(&self, use_llm: bool) -> anyhow::Result<IngestionPipeline> {
        let mut pipeline = IngestionPipeline::new(self.objects.clone(), self.invoices.clone())
            .with_max_file_size(self.config.ingest.max_file_size);

        if use_llm {
            if let Some(client) = OpenAiClient::from_config(&self.config.llm)? {
                debug!("Using language model {}", client.model());
                let auto = AutoFieldExtractor::new(Arc::new(client))
                    .with_max_content_chars(self.config.llm.max_content_chars);
                pipeline = pipeline.with_auto_fields(auto);
            }
        }

        Ok(pipeline)
    }

    pub fn service(&self) -> InvoiceService {
        InvoiceService::new(self.objects.clone(), self.invoices.clone())
    }

    pub fn sweep(&self) -> ReconciliationSweep {
        ReconciliationSweep::new(self.objects.clone(), self.invoices.clone())
    }

    /// Run the configured startup sweep. Failures are logged, not fatal.
    pub async fn startup_sweep(&self) {
        if !self.config.sync.on_startup {
            return;
        }
        if let Err(e) = self.sweep().run().await {
            warn!("Startup reconciliation failed: {}", e);
        }
    }
}
