//! Record queries, user corrections and file links.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ServiceError;
use crate::models::invoice::{ContentHash, ExistenceView, InvoicePatch, InvoiceRecord};
use crate::storage::{InvoiceStore, ObjectStore};

/// Default lifetime of a file link.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(10 * 60);

/// Read and correction access to stored invoices.
pub struct InvoiceService {
    objects: Arc<dyn ObjectStore>,
    invoices: Arc<dyn InvoiceStore>,
}

impl InvoiceService {
    pub fn new(objects: Arc<dyn ObjectStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        Self { objects, invoices }
    }

    pub async fn get(&self, hash: &ContentHash) -> Result<Option<InvoiceRecord>, ServiceError> {
        Ok(self.invoices.get(hash).await?)
    }

    /// The record for `hash`, if any, and whether its file is stored.
    pub async fn exists(&self, hash: &ContentHash) -> Result<ExistenceView, ServiceError> {
        Ok(ExistenceView::new(self.invoices.get(hash).await?))
    }

    /// All records, ordered by original file name then hash.
    pub async fn list(&self) -> Result<Vec<InvoiceRecord>, ServiceError> {
        let mut records = self.invoices.list_all().await?;
        records.sort_by(|a, b| {
            a.original_file_name
                .cmp(&b.original_file_name)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });
        Ok(records)
    }

    /// Apply a user correction and return the updated record.
    ///
    /// Only the fields the patch carries are written, so a concurrent sweep
    /// updating `file_exists` is never overwritten.
    pub async fn update(
        &self,
        hash: &ContentHash,
        patch: &InvoicePatch,
    ) -> Result<InvoiceRecord, ServiceError> {
        if patch.is_empty() {
            debug!("Empty update for {}", hash);
            return self
                .invoices
                .get(hash)
                .await?
                .ok_or_else(|| ServiceError::NotFound(hash.clone()));
        }

        let patch = patch.clone().normalized();
        let record = self
            .invoices
            .apply_patch(hash, &patch)
            .await?
            .ok_or_else(|| ServiceError::NotFound(hash.clone()))?;
        info!("Updated invoice {}", hash);
        Ok(record)
    }

    pub async fn set_paid(&self, hash: &ContentHash, paid: bool) -> Result<InvoiceRecord, ServiceError> {
        self.update(hash, &InvoicePatch::paid(paid)).await
    }

    pub async fn set_reviewed(
        &self,
        hash: &ContentHash,
        reviewed: bool,
    ) -> Result<InvoiceRecord, ServiceError> {
        self.update(hash, &InvoicePatch::reviewed(reviewed)).await
    }

    /// A link to the stored file valid for `ttl`.
    pub async fn file_link(&self, hash: &ContentHash, ttl: Duration) -> Result<Url, ServiceError> {
        Ok(self.objects.presigned_link(&hash.object_key(), ttl).await?)
    }
}
