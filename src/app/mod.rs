//! The two run modes: catalog reconciliation and classification enrichment.
//!
//! Both are sequential pipelines over the shared component set. Reconciliation
//! downloads every source before touching the store, so a failed download can
//! never leave the table half-reconciled. Enrichment treats per-record
//! resolution failures as skips and store failures as fatal.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::catalog::{CatalogBuilder, CatalogError, CatalogRecord, retrocession};
use crate::config::SyncConfig;
use crate::fetch::{Fetcher, RequestPacer};
use crate::report::ReportWriter;
use crate::resolver::{DocumentResolver, PdfTextExtractor};
use crate::store::{RecordUpdate, RemoteRecord, RemoteStore, RetryPolicy, compute_diff};
use crate::text;

/// Reconciles the remote store against a freshly built catalog.
///
/// Every source download must succeed before any mutation is attempted. With
/// `dry_run` the computed diff is printed and nothing is written.
///
/// # Errors
///
/// Fails on any source download, spreadsheet, listing, or mutation error.
pub async fn run_reconcile(config: &SyncConfig, dry_run: bool) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let catalog = build_catalog(config, &fetcher).await?;
    info!(records = catalog.len(), "catalog built");

    let store = RemoteStore::new(config.store.clone(), RetryPolicy::new(&config.retry))?;
    let remote = store.list_all().await?;

    let diff = compute_diff(&catalog, &remote, &config.store.fields);
    info!(
        create = diff.create.len(),
        update = diff.update.len(),
        delete = diff.delete.len(),
        "reconciliation diff computed"
    );

    if dry_run {
        println!(
            "dry run: {} to create, {} to update, {} to delete",
            diff.create.len(),
            diff.update.len(),
            diff.delete.len()
        );
        return Ok(());
    }

    store.apply_diff(&diff).await?;
    info!("reconciliation applied");
    Ok(())
}

/// Resolves classification codes for store rows whose code field is blank.
///
/// Resolution failures are logged and skipped; store failures abort the run.
/// Updates are buffered and flushed in store-sized batches.
///
/// # Errors
///
/// Fails on listing errors, update errors, or an unwritable report path.
pub async fn run_enrich(
    config: &SyncConfig,
    limit: Option<usize>,
    report_path: Option<&Path>,
) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let resolver = DocumentResolver::new(
        fetcher,
        Arc::new(PdfTextExtractor::new()),
        config.resolver.clone(),
        config.registry.record_page_templates.clone(),
    );
    let store = RemoteStore::new(config.store.clone(), RetryPolicy::new(&config.retry))?;

    let remote = store.list_all().await?;
    let mut pending: Vec<&RemoteRecord> = remote
        .iter()
        .filter(|record| record.field_is_blank(&config.store.fields.atc_code))
        .filter(|record| !record.field_is_blank(&config.store.fields.identifier))
        .collect();
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    info!(pending = pending.len(), "records awaiting enrichment");

    let mut report = match report_path {
        Some(path) => Some(ReportWriter::create(path)?),
        None => None,
    };

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut buffer: Vec<RecordUpdate> = Vec::new();
    let mut resolved = 0usize;
    let mut unresolved = 0usize;

    for record in pending {
        let Some(identifier) = record.text_field(&config.store.fields.identifier) else {
            continue;
        };
        progress.set_message(identifier.to_string());

        let known_link = record.text_field(&config.store.fields.link);
        let result = resolver.resolve(identifier, known_link).await;

        if let Some(report) = report.as_mut() {
            report.append(identifier, &result);
        }

        if result.found() {
            resolved += 1;
            buffer.push(code_update(record, &result, config));
            if buffer.len() >= config.store.batch_size {
                store.update_records(&buffer).await?;
                buffer.clear();
            }
        } else {
            unresolved += 1;
            warn!(identifier, "no classification code found");
        }
        progress.inc(1);
    }

    if !buffer.is_empty() {
        store.update_records(&buffer).await?;
    }
    progress.finish_and_clear();

    if let Some(report) = report {
        report.finish()?;
    }

    info!(resolved, unresolved, "enrichment complete");
    println!("enriched {resolved} records, {unresolved} unresolved");
    Ok(())
}

fn build_fetcher(config: &SyncConfig) -> Result<Fetcher> {
    let pacer = Arc::new(RequestPacer::new(config.fetch.pacing));
    Ok(Fetcher::new(&config.fetch, pacer)?)
}

/// Downloads the three flat files plus the retrocession spreadsheet and
/// builds the catalog. Nothing is mutated here.
async fn build_catalog(
    config: &SyncConfig,
    fetcher: &Fetcher,
) -> Result<BTreeMap<String, CatalogRecord>> {
    let registry = &config.registry;

    let primary = download_table(fetcher, &registry.primary_url).await?;
    let packaging = download_table(fetcher, &registry.packaging_url).await?;
    let conditions = download_table(fetcher, &registry.conditions_url).await?;

    let index_url = Url::parse(&registry.retrocession_index_url)
        .with_context(|| format!("invalid index URL {}", registry.retrocession_index_url))?;
    let index_html = fetcher
        .get_text(&registry.retrocession_index_url)
        .await
        .context("retrocession index page download failed")?;

    let Some(spreadsheet_url) = retrocession::discover_spreadsheet_link(
        &index_html,
        &index_url,
        &registry.retrocession_keyword,
    ) else {
        return Err(CatalogError::missing_link(&registry.retrocession_index_url).into());
    };
    let spreadsheet = fetcher
        .get(&spreadsheet_url)
        .await
        .context("retrocession spreadsheet download failed")?;
    let retrocession_ids =
        retrocession::read_identifiers(&spreadsheet.bytes, registry.retrocession_id_column)?;
    info!(
        identifiers = retrocession_ids.len(),
        url = %spreadsheet_url,
        "retrocession list loaded"
    );

    let builder = CatalogBuilder::new(registry.clone());
    Ok(builder.build(&primary, &packaging, &conditions, &retrocession_ids))
}

/// Flat files keep their cell structure: decoded, not whitespace-collapsed.
async fn download_table(fetcher: &Fetcher, url: &str) -> Result<String> {
    let body = fetcher
        .get(url)
        .await
        .with_context(|| format!("source table download failed: {url}"))?;
    Ok(text::decode_bytes(&body.bytes))
}

/// Builds the enrichment update for one resolved record. The discovered
/// label is written only when the store's own label field is still blank;
/// hand-curated labels are never overwritten.
fn code_update(
    record: &RemoteRecord,
    result: &crate::resolver::ExtractionResult,
    config: &SyncConfig,
) -> RecordUpdate {
    let fields = &config.store.fields;
    let mut map = serde_json::Map::new();
    if let Some(code) = &result.code {
        map.insert(fields.atc_code.clone(), Value::String(code.clone()));
    }
    if let Some(level4) = &result.level4 {
        map.insert(fields.atc_level4.clone(), Value::String(level4.clone()));
    }
    if let Some(label) = &result.label
        && record.field_is_blank(&fields.atc_label)
    {
        map.insert(fields.atc_label.clone(), Value::String(label.clone()));
    }
    RecordUpdate {
        record_id: record.id.clone(),
        fields: map,
    }
}
