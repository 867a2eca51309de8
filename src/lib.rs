pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionEngine, CurrencyCode, RateProvider};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://v6.exchangerate-api.com";

pub enum AppCommand {
    Convert {
        amount: String,
        from: Option<CurrencyCode>,
        to: Option<CurrencyCode>,
    },
    Rates {
        base: Option<CurrencyCode>,
    },
    Session,
}

fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

fn build_provider(config: &AppConfig) -> Result<providers::ExchangeRateApiProvider> {
    let base_url = config
        .providers
        .exchangerate_api
        .as_ref()
        .map_or(DEFAULT_BASE_URL, |p| &p.base_url);
    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set providers.exchangerate_api.api_key in the config file or {}",
            crate::core::config::API_KEY_ENV
        )
    })?;
    providers::ExchangeRateApiProvider::new(base_url, &api_key)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xconv starting...");

    let config = load_config(config_path)?;
    let provider = build_provider(&config)?;

    match command {
        AppCommand::Convert { amount, from, to } => {
            let mut engine = ConversionEngine::new(
                from.unwrap_or_else(|| config.source_currency.clone()),
                to.unwrap_or_else(|| config.target_currency.clone()),
                config.comparison_currencies.clone(),
            );
            cli::convert::run(&mut engine, &provider, &amount).await
        }
        AppCommand::Rates { base } => {
            let base = base.unwrap_or_else(|| config.source_currency.clone());
            cli::rates::run(&provider, &base, &config.comparison_currencies).await
        }
        AppCommand::Session => {
            let mut session = cli::session::Session::from_config(&config);
            let provider: Arc<dyn RateProvider> = Arc::new(provider);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            session.run(provider, stdin, &mut stdout).await
        }
    }
}
