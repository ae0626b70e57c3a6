// Reduction of analog forward returns to a single signal
use crate::analogs::{scan, AnalogParams};
use crate::normalizers::{prepare_series, PreparedSeries};
use tracing::{debug, warn};

/// Value reported when there is no usable analog
pub const NEUTRAL_SIGNAL: f64 = 0.0;

/// Arithmetic mean of the forward returns, every match weighted equally.
///
/// Empty input or a non-finite mean gives [`NEUTRAL_SIGNAL`].
pub fn mean_forward_return(forward_returns: &[f64]) -> f64 {
    if forward_returns.is_empty() {
        return NEUTRAL_SIGNAL;
    }

    let mean = forward_returns.iter().sum::<f64>() / forward_returns.len() as f64;
    if mean.is_finite() {
        mean
    } else {
        warn!("Non-finite analog signal, falling back to neutral");
        NEUTRAL_SIGNAL
    }
}

/// Analog signal over an already prepared series. Never fails.
pub fn signal_from_series(series: &PreparedSeries, params: &AnalogParams) -> f64 {
    let outcome = scan(series, params);
    let signal = mean_forward_return(&outcome.forward_returns);
    debug!(
        "Analog signal {:.6} from {} matches (window {})",
        signal,
        outcome.forward_returns.len(),
        params.window_size
    );
    signal
}

/// Analog signal straight from raw closes: preprocess, scan, average.
///
/// Total over every input, including empty, constant or NaN-laden series.
pub fn historical_signal(raw_prices: &[f64], params: &AnalogParams) -> f64 {
    signal_from_series(&prepare_series(raw_prices), params)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat series with three copies of a five-day shape, each followed by a
    /// known move, and the shape again as the latest window.
    fn three_analogs() -> Vec<f64> {
        let shape = [100.0, 104.0, 101.0, 106.0, 103.0];
        let flat = [100.0; 6];
        let mut raw = vec![100.0];
        raw.extend(flat);
        for r in [0.01, -0.02, 0.03] {
            raw.extend(shape);
            raw.push(103.0 * (1.0 + r));
            raw.extend(flat);
        }
        raw.extend([100.0; 5]);
        raw.extend(shape);
        raw
    }

    #[test]
    fn test_mean_of_three_matches() {
        let params = AnalogParams::with_window(5);
        let outcome = scan(&prepare_series(&three_analogs()), &params);

        let starts: Vec<usize> = outcome.candidates.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![6, 18, 30]);
        assert_eq!(outcome.forward_returns.len(), 3);
        for (got, want) in outcome.forward_returns.iter().zip([0.01, -0.02, 0.03]) {
            assert!((got - want).abs() < 1e-9, "got {} want {}", got, want);
        }

        let signal = historical_signal(&three_analogs(), &params);
        assert!((signal - 0.02 / 3.0).abs() < 1e-9, "signal={}", signal);
    }

    #[test]
    fn test_empty_is_neutral() {
        assert_eq!(mean_forward_return(&[]), NEUTRAL_SIGNAL);
    }

    #[test]
    fn test_mean_unweighted() {
        assert!((mean_forward_return(&[0.01, -0.02, 0.03]) - 0.006666666666).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_mean_is_neutral() {
        assert_eq!(mean_forward_return(&[f64::INFINITY, 0.01]), NEUTRAL_SIGNAL);
        assert_eq!(mean_forward_return(&[f64::NAN]), NEUTRAL_SIGNAL);
    }

    #[test]
    fn test_signal_is_total() {
        let params = AnalogParams::with_window(5);
        assert_eq!(historical_signal(&[], &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&[1.0], &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&[5.0; 40], &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&[f64::NAN; 40], &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&[0.0; 40], &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&three_analogs(), &AnalogParams::with_window(0)), NEUTRAL_SIGNAL);

        let mut with_gap = three_analogs();
        with_gap[20] = f64::NAN;
        assert!(historical_signal(&with_gap, &params).is_finite());
    }

    #[test]
    fn test_short_series_is_neutral() {
        // 2w + 1 raw prices leave exactly 2w after preprocessing
        let params = AnalogParams::with_window(5);
        let raw: Vec<f64> = (0..11).map(|i| 100.0 + (i % 3) as f64).collect();
        assert_eq!(historical_signal(&raw, &params), NEUTRAL_SIGNAL);
        assert_eq!(historical_signal(&raw[..9], &params), NEUTRAL_SIGNAL);
    }
}
