//! HTTP client for the remote tabular store.
//!
//! One table endpoint, bearer-token auth, JSON bodies. Listing follows the
//! opaque offset cursor until the store stops returning one. Mutations run in
//! batches no larger than the platform ceiling, separated by a pacing delay,
//! and share one retry shape: 429 and 5xx back off and try again up to the
//! attempt ceiling, everything else is a hard error carrying the body.

use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::StoreSettings;

use super::diff::{CatalogDiff, RecordUpdate};
use super::retry::{RetryPolicy, parse_retry_after};
use super::{RemoteRecord, StoreError};

/// Paged list response shape.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<RemoteRecord>,
    /// Opaque cursor; absent on the last page.
    offset: Option<String>,
}

/// Remote tabular store client.
pub struct RemoteStore {
    client: reqwest::Client,
    settings: StoreSettings,
    retry: RetryPolicy,
}

impl RemoteStore {
    /// Creates a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ClientBuild`] when the HTTP client cannot be
    /// constructed.
    pub fn new(settings: StoreSettings, retry: RetryPolicy) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .build()
            .map_err(|source| StoreError::ClientBuild { source })?;
        Ok(Self {
            client,
            settings,
            retry,
        })
    }

    /// Lists every row in the table, following the offset cursor.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on transport failure, a non-transient HTTP
    /// status, retry exhaustion, or an unparseable response body.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<RemoteRecord>, StoreError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page_size = self.settings.page_size.to_string();
            let mut query: Vec<(&str, String)> = vec![("pageSize", page_size)];
            if let Some(cursor) = &offset {
                query.push(("offset", cursor.clone()));
            }

            let response = self
                .send_with_retry(|| self.client.get(&self.settings.endpoint).query(&query))
                .await?;
            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| StoreError::invalid_response(&self.settings.endpoint, e.to_string()))?;

            debug!(rows = page.records.len(), "page listed");
            records.extend(page.records);

            match page.offset {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
        }

        info!(rows = records.len(), "store listing complete");
        Ok(records)
    }

    /// Applies a reconciliation diff in the fixed order delete, create,
    /// update.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] encountered; later phases are not
    /// attempted after a failure.
    #[instrument(skip_all, fields(
        delete = diff.delete.len(),
        create = diff.create.len(),
        update = diff.update.len(),
    ))]
    pub async fn apply_diff(&self, diff: &CatalogDiff) -> Result<(), StoreError> {
        self.delete_records(&diff.delete).await?;
        self.create_records(&diff.create).await?;
        self.update_records(&diff.update).await?;
        Ok(())
    }

    /// Deletes rows by store-side id, in batches.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when any batch fails.
    pub async fn delete_records(&self, record_ids: &[String]) -> Result<(), StoreError> {
        for (index, chunk) in record_ids.chunks(self.settings.batch_size).enumerate() {
            self.pace_between_batches(index).await;
            let query: Vec<(&str, &str)> =
                chunk.iter().map(|id| ("records[]", id.as_str())).collect();
            self.send_with_retry(|| self.client.delete(&self.settings.endpoint).query(&query))
                .await?;
            debug!(batch = index + 1, rows = chunk.len(), "batch deleted");
        }
        Ok(())
    }

    /// Creates rows in batches. Each batch first attempts a natural-key merge
    /// (`performUpsert` on the identifier field); when the store rejects the
    /// merge with the configured status, the batch is resent as a plain
    /// create.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when any batch fails both ways.
    pub async fn create_records(&self, rows: &[Map<String, Value>]) -> Result<(), StoreError> {
        for (index, chunk) in rows.chunks(self.settings.batch_size).enumerate() {
            self.pace_between_batches(index).await;

            let records: Vec<Value> = chunk
                .iter()
                .map(|fields| json!({ "fields": fields }))
                .collect();
            let upsert_body = json!({
                "records": records,
                "performUpsert": { "fieldsToMergeOn": [self.settings.fields.identifier] },
                "typecast": true,
            });

            let merge_attempt = self
                .send_with_retry(|| self.client.post(&self.settings.endpoint).json(&upsert_body))
                .await;

            match merge_attempt {
                Ok(_) => {}
                Err(StoreError::Http { status, .. })
                    if status == self.settings.upsert_reject_status =>
                {
                    warn!(status, "merge create rejected, retrying as plain create");
                    let plain_body = json!({ "records": records, "typecast": true });
                    self.send_with_retry(|| {
                        self.client.post(&self.settings.endpoint).json(&plain_body)
                    })
                    .await?;
                }
                Err(error) => return Err(error),
            }
            debug!(batch = index + 1, rows = chunk.len(), "batch created");
        }
        Ok(())
    }

    /// Updates rows in batches.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when any batch fails.
    pub async fn update_records(&self, updates: &[RecordUpdate]) -> Result<(), StoreError> {
        for (index, chunk) in updates.chunks(self.settings.batch_size).enumerate() {
            self.pace_between_batches(index).await;

            let records: Vec<Value> = chunk
                .iter()
                .map(|update| json!({ "id": update.record_id, "fields": update.fields }))
                .collect();
            let body = json!({ "records": records, "typecast": true });

            self.send_with_retry(|| self.client.patch(&self.settings.endpoint).json(&body))
                .await?;
            debug!(batch = index + 1, rows = chunk.len(), "batch updated");
        }
        Ok(())
    }

    /// Sends a request, retrying transient failures with backoff. The builder
    /// closure is re-invoked for each attempt.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let url = &self.settings.endpoint;

        for attempt in 1..=self.retry.max_attempts() {
            let result = build()
                .bearer_auth(&self.settings.token)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(source) if source.is_timeout() || source.is_connect() => {
                    if attempt == self.retry.max_attempts() {
                        return Err(StoreError::network(url, source));
                    }
                    warn!(attempt, error = %source, "transport failure, retrying");
                    sleep(self.retry.delay_after(attempt, None)).await;
                    continue;
                }
                Err(source) => return Err(StoreError::network(url, source)),
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response);
            }

            if RetryPolicy::is_transient(status) && attempt < self.retry.max_attempts() {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after);
                warn!(attempt, status, "transient store failure, retrying");
                sleep(self.retry.delay_after(attempt, retry_after)).await;
                continue;
            }

            if RetryPolicy::is_transient(status) {
                return Err(StoreError::retries_exhausted(url, self.retry.max_attempts()));
            }

            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::http(url, status, body));
        }

        Err(StoreError::retries_exhausted(url, self.retry.max_attempts()))
    }

    /// Pauses between consecutive batch calls (never before the first).
    async fn pace_between_batches(&self, batch_index: usize) {
        if batch_index > 0 && !self.settings.batch_pacing.is_zero() {
            sleep(self.settings.batch_pacing).await;
        }
    }
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("endpoint", &self.settings.endpoint)
            .field("batch_size", &self.settings.batch_size)
            .finish_non_exhaustive()
    }
}
