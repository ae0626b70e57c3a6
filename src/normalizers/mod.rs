// Series preparation and the two window normalizations
//
// `MinMaxScaler` is used by the analog scan. `anchored_to_first` is used for
// estimator features. They are unrelated and must not be swapped.

/// Prices and same-day returns, index aligned.
///
/// `returns[i]` is the return realized on the day of `prices[i]`. The first
/// raw observation has no return and is dropped from both series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedSeries {
    pub prices: Vec<f64>,
    pub returns: Vec<f64>,
}

impl PreparedSeries {
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Derive the return series from raw prices and drop the leading observation.
///
/// Fewer than two prices yields an empty series.
pub fn prepare_series(raw_prices: &[f64]) -> PreparedSeries {
    if raw_prices.len() < 2 {
        return PreparedSeries::default();
    }

    let returns = raw_prices
        .windows(2)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect();

    PreparedSeries {
        prices: raw_prices[1..].to_vec(),
        returns,
    }
}

/// Min-max scaler fitted on one reference window and reusable on others.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// Fit on `values`. Returns `None` when there is nothing finite to fit.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        Some(Self {
            min,
            range: max - min,
        })
    }

    /// Map values through the fitted range.
    ///
    /// A zero range falls back to unit scale, so a constant fit window maps
    /// to all zeros instead of dividing by zero.
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        let scale = if self.range > 0.0 { self.range } else { 1.0 };
        values.iter().map(|v| (v - self.min) / scale).collect()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn is_degenerate(&self) -> bool {
        self.range <= 0.0
    }
}

/// Scale a window relative to its first value: `(p - p0) / p0`.
///
/// Returns `None` for an empty window or a non-positive anchor.
pub fn anchored_to_first(window: &[f64]) -> Option<Vec<f64>> {
    let base = *window.first()?;
    if base.is_nan() || base <= 0.0 {
        return None;
    }
    Some(window.iter().map(|p| (p - base) / base).collect())
}
