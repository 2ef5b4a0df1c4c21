mod config;
mod harvest;
mod storage;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use harvest::fetcher::GraphqlFetcher;
use harvest::service::HarvestService;
use storage::csv::{CsvSink, SaveReason};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config::from_env().context("loading configuration")?;
    if cfg.proxy_url.is_none() {
        warn!("no proxy configured, harvesting from this machine's own address");
    }

    // Ctrl-C flips the token; the orchestrator notices at the next page
    // boundary and saves whatever has been accumulated.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing the current page before saving");
            interrupt.cancel();
        }
    });

    let fetcher = GraphqlFetcher::new(&cfg).context("building transport client")?;
    let sink = CsvSink::new(cfg.output_pattern.clone());
    let service = HarvestService::new(cfg, fetcher, sink, cancel);

    let report = service.run().await?;
    let output = report
        .output
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    info!(
        total = report.total_listed,
        pages_fetched = report.pages_fetched,
        pages_planned = report.pages_planned,
        records = report.records,
        output = %output,
        reason = report.reason.label(),
        "harvest finished"
    );

    if report.reason == SaveReason::Interrupted {
        std::process::exit(130);
    }
    Ok(())
}
