use serde_json::Value;
use std::sync::Arc;

use crate::{
    db::ProgressStore,
    error::{AppError, AppResult},
    models::{MediaDetail, ProgressRecord},
    services::providers::CatalogProvider,
};

/// Attaches catalog metadata to progress records
#[derive(Clone)]
pub struct DetailEnricher {
    catalog: Arc<dyn CatalogProvider>,
    store: Arc<dyn ProgressStore>,
}

impl DetailEnricher {
    pub fn new(catalog: Arc<dyn CatalogProvider>, store: Arc<dyn ProgressStore>) -> Self {
        Self { catalog, store }
    }

    /// Enriches one record
    ///
    /// Records that already carry detail pass through without a catalog call.
    /// `None` means the record cannot be shown: its id isn't a catalog id or
    /// the lookup failed.
    pub async fn enrich(&self, record: ProgressRecord) -> Option<ProgressRecord> {
        if record.has_detail() {
            return Some(record);
        }

        let Some(catalog_id) = catalog_id(&record.media_id) else {
            tracing::debug!(key = %record.key, "Dropping record with non-numeric media id");
            return None;
        };

        let detail = match self
            .catalog
            .fetch_media_detail(catalog_id, record.media_type)
            .await
        {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(key = %record.key, error = %e, "Detail enrichment failed");
                return None;
            }
        };

        match cache_fill(self.store.as_ref(), &record.key, &detail).await {
            Ok(true) => tracing::debug!(key = %record.key, "Cached detail in progress slot"),
            Ok(false) => tracing::debug!(key = %record.key, "Progress slot gone, detail not cached"),
            Err(e) => tracing::warn!(key = %record.key, error = %e, "Cache-fill failed"),
        }

        Some(ProgressRecord {
            detail: Some(detail),
            ..record
        })
    }

    /// Enriches a batch concurrently
    ///
    /// Results line up with the input. A failing or panicking lookup only
    /// empties its own slot.
    pub async fn enrich_batch(&self, records: Vec<ProgressRecord>) -> Vec<Option<ProgressRecord>> {
        let mut tasks = Vec::with_capacity(records.len());

        for record in records {
            let enricher = self.clone();
            let task = tokio::spawn(async move { enricher.enrich(record).await });
            tasks.push(task);
        }

        let mut results = Vec::with_capacity(tasks.len());

        for task in tasks {
            match task.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::error!(error = %e, "Enrichment task join error");
                    results.push(None);
                }
            }
        }

        let dropped = results.iter().filter(|r| r.is_none()).count();
        if dropped > 0 {
            tracing::warn!(
                enriched = results.len() - dropped,
                dropped = dropped,
                "Partial enrichment failure"
            );
        }

        results
    }
}

/// Canonical decimal catalog id: digits only, no sign, no leading zeros
fn catalog_id(media_id: &str) -> Option<u64> {
    if media_id.is_empty() || !media_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if media_id.len() > 1 && media_id.starts_with('0') {
        return None;
    }
    media_id.parse().ok()
}

/// Cache-fill: writes fetched detail back into the record's own slot
///
/// Re-reads the slot so a progress update written since the pass started is
/// kept, and writes quietly so filling the cache doesn't trigger another
/// pass. Returns `false` when the slot no longer exists.
pub async fn cache_fill(
    store: &dyn ProgressStore,
    key: &str,
    detail: &MediaDetail,
) -> AppResult<bool> {
    let Some(raw) = store.get(key).await? else {
        return Ok(false);
    };

    let mut value: Value = serde_json::from_str(&raw)?;
    let Some(slot) = value.as_object_mut() else {
        return Err(AppError::Internal(format!(
            "Progress slot {} is not an object",
            key
        )));
    };

    slot.insert("detail".to_string(), serde_json::to_value(detail)?);
    store.put(key, &value.to_string()).await?;

    Ok(true)
}
