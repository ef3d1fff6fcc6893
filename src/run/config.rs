use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{SamplerArgs, SettleMode};
use crate::error::ConfigError;
use crate::model::contract::{Contract, Expiry, build_contracts};
use crate::run::clock::{Cutoff, parse_timezone};
use crate::venues::okx::{OkxConfig, Readiness, Selectors};

/// Validated configuration for the sampler. Resolved once at startup and
/// never re-read.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub contracts: Vec<Contract>,
    pub interval: Duration,
    pub cutoff: Cutoff,
    pub output: PathBuf,
    pub once: bool,
    pub deribit_url: String,
    pub index_name: String,
    pub http_timeout: Duration,
    pub okx: OkxConfig,
}

impl SamplerConfig {
    pub fn from_cli(args: &SamplerArgs) -> Result<Self, ConfigError> {
        if args.strikes.is_empty() {
            return Err(ConfigError::NoStrikes);
        }
        for (i, strike) in args.strikes.iter().enumerate() {
            if args.strikes[..i].contains(strike) {
                return Err(ConfigError::DuplicateStrike(*strike));
            }
        }

        let expiry: Expiry = args.expiry.parse()?;
        let cutoff = Cutoff {
            at: args.stop_at.parse()?,
            timezone: parse_timezone(&args.timezone)?,
        };

        let settle = Duration::from_secs(args.settle_secs);
        let readiness = match args.settle_mode {
            SettleMode::Fixed => Readiness::FixedDelay(settle),
            SettleMode::Poll => Readiness::poll(settle),
        };

        Ok(SamplerConfig {
            contracts: build_contracts(&args.underlying, expiry, &args.strikes),
            interval: Duration::from_secs(args.interval),
            cutoff,
            output: args.output.clone(),
            once: args.once,
            deribit_url: args.deribit_url.clone(),
            index_name: args.index_name.clone(),
            http_timeout: Duration::from_secs(args.http_timeout),
            okx: OkxConfig {
                url: args.okx_url.clone(),
                selectors: Selectors::default(),
                readiness,
                navigation_timeout: Duration::from_secs(args.nav_timeout),
                chrome_executable: args.chrome.clone(),
            },
        })
    }
}
