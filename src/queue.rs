// src/queue.rs
//
// Batch generation runs on a single background worker fed through a channel.
// Jobs are processed one at a time and items sequentially, so the model API
// sees at most one request from the batch path at any moment.

use std::time::Duration;

use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::billing;
use crate::db::{self, QueuedBatch};
use crate::generation::{GenerationRequest, Generator};
use crate::models::{BatchItemResult, BatchStatus, ItemStatus};

pub const MAX_BATCH_SIZE: usize = 50;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("batch worker is not running")]
    Closed,
}

#[derive(Clone)]
pub struct BatchQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl BatchQueue {
    /// Spawns the worker. Must be called from within a tokio runtime.
    pub fn start(pool: SqlitePool, generator: Generator, item_delay: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            while let Some(batch_id) = rx.recv().await {
                match process_batch(&pool, &generator, &batch_id, item_delay).await {
                    Ok(status) => log::info!("batch finished batch_id={batch_id} status={}", status.as_str()),
                    Err(e) => log::error!("batch worker error batch_id={batch_id}: {e}"),
                }
            }
            log::warn!("batch worker stopped");
        });

        Self { tx }
    }

    pub fn submit(&self, batch_id: String) -> Result<(), QueueError> {
        self.tx.send(batch_id).map_err(|_| QueueError::Closed)
    }

    /// Requeues jobs left `pending` or `processing` by a previous run.
    pub async fn resume(&self, pool: &SqlitePool) -> Result<usize, sqlx::Error> {
        let ids = db::unfinished_batch_ids(pool).await?;
        let count = ids.len();
        for id in ids {
            if self.submit(id).is_err() {
                log::error!("batch worker closed while resuming");
                break;
            }
        }
        if count > 0 {
            log::info!("resumed unfinished batches count={count}");
        }
        Ok(count)
    }
}

/// Up-front checks run before a batch is accepted. Returns every problem found.
pub fn validate_batch(items: &[Value]) -> Vec<String> {
    if items.is_empty() {
        return vec!["Properties array is required and cannot be empty".to_string()];
    }

    let mut errors = Vec::new();
    if items.len() > MAX_BATCH_SIZE {
        errors.push(format!("Maximum {MAX_BATCH_SIZE} properties allowed per batch"));
    }
    for (index, item) in items.iter().enumerate() {
        let n = index + 1;
        if !has_text(item, "/property/address") {
            errors.push(format!("Property {n}: Address is required"));
        }
        if !has_text(item, "/property/type") {
            errors.push(format!("Property {n}: Property type is required"));
        }
    }
    errors
}

fn has_text(item: &Value, pointer: &str) -> bool {
    item.pointer(pointer)
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty())
}

/// Runs a stored batch to completion, continuing after any results that were
/// already persisted. Per-item failures are recorded and do not stop the run;
/// a database failure marks the job `failed`.
pub async fn process_batch(
    pool: &SqlitePool,
    generator: &Generator,
    batch_id: &str,
    item_delay: Duration,
) -> Result<BatchStatus, sqlx::Error> {
    let Some(QueuedBatch { job, items }) = db::load_queued_batch(pool, batch_id).await? else {
        log::warn!("batch not found batch_id={batch_id}");
        return Ok(BatchStatus::Failed);
    };

    if matches!(job.status, BatchStatus::Completed | BatchStatus::Failed) {
        return Ok(job.status);
    }

    let mut results = job.results;
    results.truncate(items.len());
    if !results.is_empty() {
        log::info!(
            "resuming batch batch_id={batch_id} from item={} of {}",
            results.len() + 1,
            items.len()
        );
    }

    db::update_batch_job(pool, batch_id, BatchStatus::Processing, results.len(), &results).await?;

    let status = match run_items(pool, generator, &job.user_email, batch_id, &items, &mut results, item_delay).await
    {
        Ok(()) => BatchStatus::Completed,
        Err(e) => {
            log::error!("batch failed batch_id={batch_id}: {e}");
            BatchStatus::Failed
        }
    };

    db::update_batch_job(pool, batch_id, status, results.len(), &results).await?;
    Ok(status)
}

async fn run_items(
    pool: &SqlitePool,
    generator: &Generator,
    email: &str,
    batch_id: &str,
    items: &[Value],
    results: &mut Vec<BatchItemResult>,
    item_delay: Duration,
) -> Result<(), sqlx::Error> {
    let total = items.len();
    for item in items.iter().skip(results.len()) {
        let result = process_item(pool, generator, email, item).await?;
        if let Some(error) = &result.error {
            log::warn!("batch item failed batch_id={batch_id} item={}: {error}", results.len() + 1);
        }
        results.push(result);

        // debited items must be stored before the next one starts; resume skips stored results
        let done = results.len();
        if done < total {
            db::update_batch_job(pool, batch_id, BatchStatus::Processing, done, results).await?;
        }
        if done < total && !item_delay.is_zero() {
            tokio::time::sleep(item_delay).await;
        }
    }
    Ok(())
}

async fn process_item(
    pool: &SqlitePool,
    generator: &Generator,
    email: &str,
    item: &Value,
) -> Result<BatchItemResult, sqlx::Error> {
    let property = item.get("property").cloned().unwrap_or_else(|| Value::Object(Default::default()));

    let mut request: GenerationRequest = match serde_json::from_value(item.clone()) {
        Ok(request) => request,
        Err(e) => return Ok(BatchItemResult::failed(property, format!("invalid property: {e}"))),
    };
    request.variations = Some(1);

    if !billing::debit(pool, Some(email)).await? {
        return Ok(BatchItemResult::failed(property, "Not enough credits".to_string()));
    }

    match generator.generate(Some(email), request).await {
        Ok(outcome) => Ok(BatchItemResult {
            property,
            flags: outcome.primary.flags.clone(),
            result: Some(outcome.primary),
            status: ItemStatus::Success,
            error: None,
        }),
        Err(e) => {
            billing::credit(pool, email, 1).await?;
            Ok(BatchItemResult::failed(property, e.to_string()))
        }
    }
}

impl BatchItemResult {
    fn failed(property: Value, error: String) -> Self {
        Self {
            property,
            result: None,
            flags: Vec::new(),
            status: ItemStatus::Error,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_batch_is_rejected() {
        assert_eq!(validate_batch(&[]).len(), 1);
    }

    #[test]
    fn each_missing_field_is_reported() {
        let items = vec![
            json!({"property": {"address": "1 Main St", "type": "House"}}),
            json!({"property": {"type": "Condo"}}),
            json!({"property": {"address": "  "}}),
        ];
        let errors = validate_batch(&items);
        assert_eq!(
            errors,
            vec![
                "Property 2: Address is required",
                "Property 3: Address is required",
                "Property 3: Property type is required",
            ]
        );
    }

    #[test]
    fn oversized_batch_is_rejected() {
        let items = vec![json!({"property": {"address": "1 Main St", "type": "House"}}); MAX_BATCH_SIZE + 1];
        assert_eq!(validate_batch(&items), vec![format!("Maximum {MAX_BATCH_SIZE} properties allowed per batch")]);
    }
}
