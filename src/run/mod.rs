pub mod clock;
pub mod config;
pub mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::SamplerArgs;
use crate::engine::Aggregator;
use crate::sink::CsvSink;
use crate::venues::deribit::DeribitClient;
use crate::venues::okx::OkxChain;

use clock::SystemClock;
use config::SamplerConfig;
use scheduler::{Controller, Schedule, Shutdown};

/// Entry point for the `run` command.
pub fn run(args: &SamplerArgs) -> Result<()> {
    let config = SamplerConfig::from_cli(args)?;

    info!("=== optchain-sampler run ===");
    info!(
        "Contracts: {}",
        config
            .contracts
            .iter()
            .map(|c| c.instrument_name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("Interval:  {:?}", config.interval);
    info!("Stop at:   {}", config.cutoff);
    info!("Output:    {}", config.output.display());
    info!("Once:      {}", config.once);

    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    rt.block_on(run_async(config))
}

async fn run_async(config: SamplerConfig) -> Result<()> {
    let deribit = DeribitClient::new(&config.deribit_url, &config.index_name, config.http_timeout)?;
    let okx = OkxChain::new(config.okx.clone());
    let aggregator = Aggregator::new(Box::new(deribit), Box::new(okx), config.contracts.clone());

    let sink = CsvSink::open(&config.output, aggregator.layout().clone())?;

    let shutdown = Arc::new(Shutdown::default());
    let handler_shutdown = Arc::clone(&shutdown);
    ctrlc::set_handler(move || handler_shutdown.request())
        .context("installing Ctrl-C handler")?;

    let schedule = Schedule {
        interval: config.interval,
        cutoff: config.cutoff,
        once: config.once,
    };
    let mut controller =
        Controller::new(aggregator, sink, SystemClock, schedule).with_shutdown(shutdown);

    let reason = controller.run().await?;
    let stats = controller.stats();
    info!(
        ?reason,
        sampled = stats.sampled,
        skipped = stats.skipped,
        output = %controller.sink().path().display(),
        "Stopped."
    );
    Ok(())
}

/// Entry point for the `contracts` command.
pub fn list_contracts(args: &SamplerArgs) -> Result<()> {
    let config = SamplerConfig::from_cli(args)?;

    println!("Contracts ({}):", config.contracts.len());
    for contract in &config.contracts {
        println!(
            "  {:<24} OKX strike {}",
            contract.instrument_name(),
            contract.strike_label()
        );
    }

    let layout = crate::model::snapshot::RowLayout::new(
        crate::venues::deribit::DERIBIT,
        crate::venues::okx::OKX,
        &config.contracts,
    );
    println!();
    println!("Header ({} price columns):", layout.price_width());
    println!("{}", layout.header().join(","));
    Ok(())
}
