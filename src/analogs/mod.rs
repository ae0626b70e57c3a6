//! Analog scanner
//!
//! Compares the most recent window of prices against every earlier window
//! that ends before the target region starts, and collects the return
//! realized on the day after each window whose shape correlates with the
//! target.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::normalizers::{MinMaxScaler, PreparedSeries};

pub const DEFAULT_WINDOW_SIZE: usize = 30;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.80;

/// Scan parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogParams {
    /// Window length in trading days
    pub window_size: usize,
    /// Minimum correlation (exclusive) for a history window to count
    pub threshold: f64,
    /// Keep only the k best-correlated matches. `None` keeps every match.
    pub top_k: Option<usize>,
}

impl AnalogParams {
    pub fn with_window(window_size: usize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    /// Observations the prepared series needs before any scan happens
    pub fn minimum_len(&self) -> usize {
        self.window_size.saturating_mul(2)
    }
}

impl Default for AnalogParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            top_k: None,
        }
    }
}

/// A history window accepted as an analog of the target
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateMatch {
    /// Start index into the prepared price series
    pub start: usize,
    pub correlation: f64,
    /// Return on the day after the window, when it lies outside the guarded tail
    pub forward_return: Option<f64>,
}

/// Everything one scan produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub target_scaled: Vec<f64>,
    /// Accepted matches in scan order
    pub candidates: Vec<CandidateMatch>,
    /// Usable forward returns of the accepted matches, in scan order
    pub forward_returns: Vec<f64>,
    pub windows_compared: usize,
}

impl ScanOutcome {
    pub fn is_empty(&self) -> bool {
        self.forward_returns.is_empty()
    }
}

/// Pearson correlation of two equal-length sequences.
///
/// `None` when the coefficient is undefined: mismatched or too-short input,
/// zero variance on either side, or non-finite values.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let corr = cov / (var_x * var_y).sqrt();
    if corr.is_finite() {
        Some(corr.clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Scan the prepared series for analogs of its last `window_size` prices.
///
/// Never fails. Too little data, a zero window or an unusable target all
/// produce an empty outcome.
pub fn scan(series: &PreparedSeries, params: &AnalogParams) -> ScanOutcome {
    let window = params.window_size;
    let prices = &series.prices;
    let n = prices.len();

    if window == 0 || n < params.minimum_len() {
        debug!(
            "Analog scan skipped: {} observations, window {}",
            n, window
        );
        return ScanOutcome::default();
    }

    let (history, target) = prices.split_at(n - window);

    // History windows are mapped through the target's min/max, not their own.
    // A slice living at another price level lands outside [0, 1]; correlation
    // is invariant to that affine map, so only the shape decides.
    let scaler = match MinMaxScaler::fit(target) {
        Some(s) => s,
        None => {
            warn!("Analog scan skipped: target window has no finite prices");
            return ScanOutcome::default();
        }
    };
    let target_scaled = scaler.transform(target);

    let limit = history.len() - window;
    let mut candidates = Vec::new();

    for start in 0..limit {
        let slice_scaled = scaler.transform(&history[start..start + window]);

        // undefined correlation is a non-match
        let Some(corr) = pearson_correlation(&target_scaled, &slice_scaled) else {
            continue;
        };

        if corr > params.threshold {
            candidates.push(CandidateMatch {
                start,
                correlation: corr,
                forward_return: forward_return(series, start, window),
            });
        }
    }

    if let Some(k) = params.top_k {
        keep_best(&mut candidates, k);
    }

    let mut forward_returns = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        match candidate.forward_return {
            Some(r) if r.is_finite() => forward_returns.push(r),
            Some(r) => warn!(
                "Dropping non-finite forward return {} after window at {}",
                r, candidate.start
            ),
            None => {}
        }
    }

    debug!(
        "Analog scan: {} windows compared, {} matches, {} forward returns",
        limit,
        candidates.len(),
        forward_returns.len()
    );

    ScanOutcome {
        target_scaled,
        candidates,
        forward_returns,
        windows_compared: limit,
    }
}

/// Return realized the day after the window starting at `start`.
///
/// Days inside the last `window` observations are never read.
fn forward_return(series: &PreparedSeries, start: usize, window: usize) -> Option<f64> {
    let next_day = start + window;
    if next_day < series.returns.len().saturating_sub(window) {
        series.returns.get(next_day).copied()
    } else {
        None
    }
}

/// Keep the `k` highest correlations, preserving scan order among them.
fn keep_best(candidates: &mut Vec<CandidateMatch>, k: usize) {
    if candidates.len() <= k {
        return;
    }
    let mut ranked = candidates.clone();
    ranked.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));
    ranked.truncate(k);
    ranked.sort_by_key(|c| c.start);
    *candidates = ranked;
}
