//! Forecast pipeline
//!
//! Fetches one price history, derives the analog signal and the estimator
//! features from it, and turns the estimator output into a next-price
//! forecast with a trade action.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregators::signal_from_series;
use crate::analogs::{AnalogParams, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_WINDOW_SIZE};
use crate::estimators::assemble_features;
use crate::normalizers::prepare_series;
use crate::types::*;

/// Tunables shared by every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    /// Price features the estimator was trained on
    pub model_window_size: usize,
    pub similarity_threshold: f64,
    pub top_k: Option<usize>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            model_window_size: DEFAULT_WINDOW_SIZE,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: None,
        }
    }
}

/// Forecaster with an injected price source and estimator.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
pub struct Forecaster {
    source: Arc<dyn PriceHistorySource>,
    estimator: Arc<dyn ReturnEstimator>,
    settings: ForecastSettings,
}

impl Forecaster {
    pub fn new(source: Arc<dyn PriceHistorySource>, estimator: Arc<dyn ReturnEstimator>) -> Self {
        Self {
            source,
            estimator,
            settings: ForecastSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ForecastSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Raw observations needed to serve a request for `days`
    pub fn minimum_observations(&self, days: usize) -> usize {
        self.settings.model_window_size.max(days).saturating_add(2)
    }

    /// Fetch the ticker's history and forecast the next close
    pub async fn forecast(&self, request: &ForecastRequest) -> Result<Forecast> {
        let ticker = request.ticker.trim();
        if ticker.is_empty() {
            return Err(ForecastError::InvalidRequest("ticker must not be empty".to_string()));
        }
        if request.days == 0 {
            return Err(ForecastError::InvalidRequest("days must be positive".to_string()));
        }

        info!("Forecasting {} with {}-day analog window", ticker, request.days);

        let history = self.source.daily_history(ticker).await.map_err(|e| {
            warn!("{} failed for {}: {}", self.source.name(), ticker, e);
            e
        })?;

        self.forecast_history(&history, request.days)
    }

    /// Forecast from an already fetched history
    pub fn forecast_history(&self, history: &PriceHistory, days: usize) -> Result<Forecast> {
        if history.is_empty() {
            return Err(ForecastError::NotFound(history.ticker.clone()));
        }

        let required = self.minimum_observations(days);
        if history.len() < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: history.len(),
            });
        }

        let prepared = prepare_series(&history.prices());

        let params = AnalogParams {
            window_size: days,
            threshold: self.settings.similarity_threshold,
            top_k: self.settings.top_k,
        };
        let raf_signal = signal_from_series(&prepared, &params);

        let window = self.settings.model_window_size;
        let features = assemble_features(&prepared.prices, window, raf_signal)?;

        if let Some(expected) = self.estimator.expected_features() {
            if expected != features.len() {
                return Err(ForecastError::Estimator(format!(
                    "estimator expects {} features, model window {} gives {}",
                    expected,
                    window,
                    features.len()
                )));
            }
        }

        let predicted_return = self.estimator.predict(&features)?;
        if !predicted_return.is_finite() {
            return Err(ForecastError::Estimator(format!(
                "non-finite prediction: {}",
                predicted_return
            )));
        }

        // assemble_features already checked there are `window` prices
        let current_price = prepared.prices[prepared.prices.len() - 1];
        let next_price = current_price * (1.0 + predicted_return);
        let action = Action::from_predicted_return(predicted_return);

        debug!(
            "{}: signal {:.6}, predicted return {:.6}",
            history.ticker, raf_signal, predicted_return
        );
        info!(
            "{}: {:.4} -> {:.4} ({})",
            history.ticker, current_price, next_price, action
        );

        Ok(Forecast {
            ticker: history.ticker.clone(),
            current_price,
            predicted_return,
            next_price,
            raf_signal,
            action,
        })
    }
}
