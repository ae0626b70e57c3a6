//! Estimator input assembly and bundled estimators

pub mod tree_ensemble;

pub use tree_ensemble::TreeEnsemble;

use crate::normalizers::anchored_to_first;
use crate::types::{ForecastError, Result};

/// Build the estimator input: the last `model_window` prices scaled against
/// the first of them, followed by the analog signal.
///
/// The output always has `model_window + 1` entries.
pub fn assemble_features(prices: &[f64], model_window: usize, signal: f64) -> Result<Vec<f64>> {
    if model_window == 0 {
        return Err(ForecastError::InvalidRequest(
            "model window must be positive".to_string(),
        ));
    }
    if prices.len() < model_window {
        return Err(ForecastError::InsufficientHistory {
            required: model_window,
            available: prices.len(),
        });
    }

    let target = &prices[prices.len() - model_window..];
    let mut features = anchored_to_first(target).ok_or_else(|| {
        ForecastError::InvalidResponse(format!(
            "Data preparation error: non-positive base price {}",
            target[0]
        ))
    })?;
    features.push(signal);

    Ok(features)
}
