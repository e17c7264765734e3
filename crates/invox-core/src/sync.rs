//! Reconciliation of the `file_exists` flag against the object store.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::models::invoice::ContentHash;
use crate::storage::{InvoiceStore, ObjectStore};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Object keys listed.
    pub keys_seen: usize,
    /// Records now flagged as having their file.
    pub present: usize,
    /// Records now flagged as missing their file.
    pub missing: usize,
    pub elapsed: Duration,
}

/// Recomputes `file_exists` for every record from one object listing.
///
/// Idempotent. Never creates or deletes records, and may run while uploads
/// are in progress.
pub struct ReconciliationSweep {
    objects: Arc<dyn ObjectStore>,
    invoices: Arc<dyn InvoiceStore>,
}

impl ReconciliationSweep {
    pub fn new(objects: Arc<dyn ObjectStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        Self { objects, invoices }
    }

    /// Run one sweep. A failed listing aborts the sweep and leaves every
    /// flag as it was.
    pub async fn run(&self) -> Result<SweepReport, SyncError> {
        let started = Instant::now();

        let keys = self.objects.list_keys().await?;
        let present: HashSet<ContentHash> = keys
            .iter()
            .filter_map(|key| {
                let hash = ContentHash::from_object_key(key);
                if hash.is_none() {
                    debug!("Ignoring object {} with no content hash name", key);
                }
                hash
            })
            .collect();

        let counts = self.invoices.bulk_set_file_exists(&present).await?;
        let report = SweepReport {
            keys_seen: keys.len(),
            present: counts.present,
            missing: counts.missing,
            elapsed: started.elapsed(),
        };

        if report.missing > 0 {
            warn!("{} invoice records have no stored file", report.missing);
        }
        info!(
            "Reconciled file flags: {} objects, {} present, {} missing in {:?}",
            report.keys_seen, report.present, report.missing, report.elapsed
        );
        Ok(report)
    }
}
