use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use analog_forecast::{AppConfig, ForecastRequest, Forecaster, TreeEnsemble, YahooChartClient};

/// Forecast the next close of a ticker from its historical analogs
#[derive(Debug, Parser)]
#[command(name = "analog-forecast", version)]
struct Args {
    /// Ticker symbol, e.g. BBRI.JK
    #[arg(default_value = "BBRI.JK")]
    ticker: String,

    /// Analog window in trading days (defaults to `default_days` from config)
    #[arg(short, long)]
    days: Option<usize>,

    /// Model file, overrides `model_path` from config
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model_path = model;
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    info!("Loading trained model from {}", config.model_path.display());
    let estimator = Arc::new(TreeEnsemble::from_path(&config.model_path)?);
    info!("✓ Model loaded ({} trees)", estimator.num_trees());

    let source = Arc::new(YahooChartClient::new(
        &config.chart_base_url,
        config.history_range.clone(),
        config.request_timeout(),
    )?);

    let forecaster =
        Forecaster::new(source, estimator).with_settings(config.forecast_settings());

    let request = ForecastRequest::new(args.ticker, args.days.unwrap_or(config.default_days));

    match forecaster.forecast(&request).await {
        Ok(forecast) => {
            println!("{}", serde_json::to_string_pretty(&forecast)?);
            Ok(())
        }
        Err(e) => {
            error!("Forecast for {} failed: {}", request.ticker, e);
            Err(anyhow::anyhow!(e.user_message()))
        }
    }
}
