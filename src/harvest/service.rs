use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures::{stream, StreamExt};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::harvest::fetcher::ListingSource;
use crate::harvest::models::{MergedRecord, SummaryRecord};
use crate::harvest::parser::{parse_detail, parse_summary};
use crate::storage::csv::{CsvSink, SaveReason};

/// Shared accumulator for merged records. Cloning shares the underlying
/// collection, so worker tasks append concurrently while the drain path can
/// snapshot at any time. Insertion order is task completion order.
#[derive(Clone, Default)]
pub struct HarvestState {
    records: Arc<Mutex<Vec<MergedRecord>>>,
}

impl HarvestState {
    pub fn push(&self, record: MergedRecord) {
        self.records.lock().expect("harvest state poisoned").push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("harvest state poisoned").len()
    }

    pub fn snapshot(&self) -> Vec<MergedRecord> {
        self.records.lock().expect("harvest state poisoned").clone()
    }
}

#[derive(Debug)]
pub struct HarvestReport {
    pub reason: SaveReason,
    pub total_listed: u64,
    pub pages_planned: u64,
    pub pages_fetched: u64,
    pub records: usize,
    pub output: Option<PathBuf>,
}

/// Drives one harvest: size the result set, page through it in ascending
/// offset order fanning detail fetches onto a bounded worker pool, then hand
/// everything accumulated to the sink exactly once.
pub struct HarvestService<S> {
    cfg: Config,
    source: Arc<S>,
    sink: CsvSink,
    state: HarvestState,
    cancel: CancellationToken,
}

impl<S: ListingSource + 'static> HarvestService<S> {
    pub fn new(cfg: Config, source: S, sink: CsvSink, cancel: CancellationToken) -> Self {
        Self {
            cfg,
            source: Arc::new(source),
            sink,
            state: HarvestState::default(),
            cancel,
        }
    }

    pub async fn run(&self) -> anyhow::Result<HarvestReport> {
        // Sizing. Without a working count there is nothing to page through,
        // so this is the one failure that aborts the whole harvest.
        let total = self
            .source
            .total_count(&self.cfg.filter)
            .await
            .context("resolving total listing count")?;

        let planned = total.div_ceil(self.cfg.page_size);
        let pages = match self.cfg.max_pages {
            Some(cap) if planned > cap => {
                info!(planned, cap, "page cap truncates the plan");
                cap
            }
            _ => planned,
        };
        info!(total, pages, page_size = self.cfg.page_size, "sized harvest");

        // Paging.
        let mut reason = SaveReason::Completed;
        let mut pages_fetched = 0u64;

        for page in 0..pages {
            if self.cancel.is_cancelled() {
                info!(page, records = self.state.len(), "cancelled, stopping pagination");
                reason = SaveReason::Interrupted;
                break;
            }

            let offset = page * self.cfg.page_size;
            let batch = match self.source.fetch_page(offset, self.cfg.page_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    // Individual page failures are routine under rate
                    // limiting; losing one page must not lose the harvest.
                    warn!(page, error = %e, "page fetch failed, skipping");
                    sleep(self.cfg.page_delay()).await;
                    continue;
                }
            };
            pages_fetched += 1;

            if batch.is_empty() {
                info!(page, "empty page, upstream exhausted, stopping pagination");
                break;
            }
            info!(page = page + 1, pages, offset, count = batch.len(), "page fetched");

            let summaries: Vec<SummaryRecord> = batch
                .iter()
                .map(|item| parse_summary(&self.cfg.site_base, item))
                .collect();

            if self.cfg.fetch_details {
                self.merge_page_details(summaries).await;
            } else {
                for summary in summaries {
                    self.state.push(MergedRecord::from_summary(summary));
                }
            }

            sleep(self.cfg.page_delay()).await;
        }

        // Draining.
        let records = self.state.snapshot();
        let output = self
            .sink
            .save(&records, reason)
            .context("saving harvested records")?;

        Ok(HarvestReport {
            reason,
            total_listed: total,
            pages_planned: pages,
            pages_fetched,
            records: records.len(),
            output,
        })
    }

    /// Fans one detail-fetch-and-merge task per summary onto the worker pool
    /// and joins them all before returning. A failed or panicked task drops
    /// only its own record.
    async fn merge_page_details(&self, summaries: Vec<SummaryRecord>) {
        let mut tasks = stream::iter(summaries)
            .map(|summary| {
                let source = Arc::clone(&self.source);
                let state = self.state.clone();
                tokio::spawn(async move {
                    match source.fetch_detail(&summary.id).await {
                        Ok(raw) => {
                            let detail = parse_detail(&raw);
                            state.push(MergedRecord::from_summary(summary).merge_detail(detail));
                            Ok(())
                        }
                        Err(e) => Err((summary.id, e)),
                    }
                })
            })
            .buffer_unordered(self.cfg.max_workers);

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err((id, e))) => {
                    warn!(id = %id, error = %e, "detail fetch failed, dropping record");
                }
                Err(e) => warn!(error = %e, "detail task aborted, dropping record"),
            }
        }
    }
}
