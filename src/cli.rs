use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::logging::LogFormat;
use crate::venues::deribit::{DEFAULT_INDEX_NAME, DERIBIT_API_URL};
use crate::venues::okx::OKX_CHAIN_URL;

/// Option chain sampler: log Deribit and OKX BTC call prices side by side
/// until a daily stop time.
#[derive(Parser)]
#[command(name = "optchain-sampler", version, about)]
pub struct Cli {
    /// Console log format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sample both venues on a fixed interval and append rows to the log
    Run(SamplerArgs),

    /// Print the resolved contracts and the log header, then exit
    Contracts(SamplerArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SettleMode {
    /// Poll the page until the chain table is populated
    Poll,
    /// Sleep a fixed time after navigation
    Fixed,
}

#[derive(Args, Clone, Debug)]
pub struct SamplerArgs {
    /// Strikes to sample, comma separated
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "106000,108000,110000,112000,114000,116000"
    )]
    pub strikes: Vec<u64>,

    /// Expiry in Deribit notation
    #[arg(long, default_value = "3AUG25")]
    pub expiry: String,

    /// Underlying asset
    #[arg(long, default_value = "BTC")]
    pub underlying: String,

    /// Seconds to wait between rounds
    #[arg(long, default_value = "30")]
    pub interval: u64,

    /// Local stop time (HH:MM) in --timezone
    #[arg(long, default_value = "04:09")]
    pub stop_at: String,

    /// Reference timezone for --stop-at (IANA name)
    #[arg(long, default_value = "US/Eastern")]
    pub timezone: String,

    /// CSV log to append to
    #[arg(long, short = 'o', default_value = "option_chain_comparison.csv")]
    pub output: PathBuf,

    /// Run a single round then exit
    #[arg(long)]
    pub once: bool,

    /// Deribit public API base URL
    #[arg(long, default_value = DERIBIT_API_URL)]
    pub deribit_url: String,

    /// Deribit index used as spot
    #[arg(long, default_value = DEFAULT_INDEX_NAME)]
    pub index_name: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30")]
    pub http_timeout: u64,

    /// OKX option chain page
    #[arg(long, default_value = OKX_CHAIN_URL)]
    pub okx_url: String,

    /// How to wait for the OKX page to render
    #[arg(long, value_enum, default_value = "poll")]
    pub settle_mode: SettleMode,

    /// Upper bound (poll) or fixed delay (fixed) for page rendering, seconds
    #[arg(long, default_value = "8")]
    pub settle_secs: u64,

    /// Page navigation timeout in seconds
    #[arg(long, default_value = "30")]
    pub nav_timeout: u64,

    /// Chrome/Chromium executable (auto-detected when omitted)
    #[arg(long)]
    pub chrome: Option<PathBuf>,
}
