//! Analog Forecast
//!
//! Short-horizon return forecasting from historical price analogs: the
//! latest window of closes is matched against earlier windows of the same
//! ticker, the returns that followed the close matches are averaged into a
//! signal, and a regression estimator turns price features plus that signal
//! into a next-day forecast.

pub mod types;
pub mod sources {
    pub mod yahoo;
}
pub mod normalizers;
pub mod analogs;
pub mod aggregators;
pub mod estimators;
pub mod forecast;
pub mod config;

pub use types::*;
pub use sources::yahoo::YahooChartClient;
pub use analogs::{scan, AnalogParams, CandidateMatch, ScanOutcome};
pub use aggregators::{historical_signal, NEUTRAL_SIGNAL};
pub use estimators::{assemble_features, TreeEnsemble};
pub use forecast::{ForecastSettings, Forecaster};
pub use crate::config::AppConfig;
