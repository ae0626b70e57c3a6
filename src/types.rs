use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day's closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronologically ascending daily closes for one ticker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub closes: Vec<DailyClose>,
}

impl PriceHistory {
    pub fn new(ticker: impl Into<String>, closes: Vec<DailyClose>) -> Self {
        Self {
            ticker: ticker.into(),
            closes,
        }
    }

    /// Build a history from bare prices, dating them one calendar day apart.
    /// Mostly useful for tests and replaying exported series.
    pub fn from_prices(ticker: impl Into<String>, prices: &[f64]) -> Self {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        let closes = prices
            .iter()
            .zip(start.iter_days())
            .map(|(&close, date)| DailyClose { date, close })
            .collect();
        Self::new(ticker, closes)
    }

    /// Close prices in chronological order
    pub fn prices(&self) -> Vec<f64> {
        self.closes.iter().map(|c| c.close).collect()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}

/// Trade action derived from the predicted return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "STRONG BUY")]
    StrongBuy,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "SELL")]
    Sell,
}

impl Action {
    pub const STRONG_BUY_ABOVE: f64 = 0.01;
    pub const BUY_ABOVE: f64 = 0.005;
    pub const SELL_BELOW: f64 = -0.005;

    /// Classify a predicted fractional return. All thresholds are strict.
    pub fn from_predicted_return(predicted_return: f64) -> Self {
        if predicted_return > Self::STRONG_BUY_ABOVE {
            Action::StrongBuy
        } else if predicted_return > Self::BUY_ABOVE {
            Action::Buy
        } else if predicted_return < Self::SELL_BELOW {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::StrongBuy => "STRONG BUY",
            Action::Buy => "BUY",
            Action::Hold => "HOLD",
            Action::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast request as received from the serving layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    /// Analog window in trading days
    #[serde(default = "default_days")]
    pub days: usize,
}

fn default_ticker() -> String {
    "BBRI.JK".to_string()
}

fn default_days() -> usize {
    30
}

impl ForecastRequest {
    pub fn new(ticker: impl Into<String>, days: usize) -> Self {
        Self {
            ticker: ticker.into(),
            days,
        }
    }
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            days: default_days(),
        }
    }
}

/// Forecast response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub ticker: String,
    pub current_price: f64,
    pub predicted_return: f64,
    pub next_price: f64,
    pub raf_signal: f64,
    pub action: Action,
}

/// Coarse error classes the serving layer maps onto its own status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Internal,
}

/// Error types for forecasting
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    #[error("Ticker not found or no data available: {0}")]
    NotFound(String),

    #[error("Not enough data to make predictions: need {required} observations, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Price source error: {0}")]
    Source(String),

    #[error("Rate limit exceeded for {source_name}")]
    RateLimit {
        source_name: String,
        retry_after: Option<u64>,
    },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Estimator failed: {0}")]
    Estimator(String),
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForecastError::NotFound(_) => ErrorKind::NotFound,
            ForecastError::InsufficientHistory { .. } | ForecastError::InvalidRequest(_) => {
                ErrorKind::BadRequest
            }
            ForecastError::Source(_)
            | ForecastError::RateLimit { .. }
            | ForecastError::InvalidResponse(_)
            | ForecastError::Model(_)
            | ForecastError::Estimator(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to show a caller. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound => "Ticker symbol not found or no data available.".to_string(),
            ErrorKind::BadRequest => self.to_string(),
            ErrorKind::Internal => "Internal error while computing the forecast.".to_string(),
        }
    }
}

/// Result type for forecasting operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Supplier of daily price history
#[async_trait::async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Ordered daily closes for a ticker. An unknown ticker yields an empty history.
    async fn daily_history(&self, ticker: &str) -> Result<PriceHistory>;

    /// Source name
    fn name(&self) -> &str;
}

/// Regression estimator mapping a feature vector to a predicted fractional return
pub trait ReturnEstimator: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Number of features the estimator expects, if it declares one
    fn expected_features(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_thresholds_are_strict() {
        assert_eq!(Action::from_predicted_return(0.0101), Action::StrongBuy);
        assert_eq!(Action::from_predicted_return(0.01), Action::Buy);
        assert_eq!(Action::from_predicted_return(0.0051), Action::Buy);
        assert_eq!(Action::from_predicted_return(0.005), Action::Hold);
        assert_eq!(Action::from_predicted_return(0.0), Action::Hold);
        assert_eq!(Action::from_predicted_return(-0.005), Action::Hold);
        assert_eq!(Action::from_predicted_return(-0.0051), Action::Sell);
    }

    #[test]
    fn test_action_serializes_to_labels() {
        let json = serde_json::to_string(&Action::StrongBuy).unwrap();
        assert_eq!(json, "\"STRONG BUY\"");
        let back: Action = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(back, Action::Sell);
        assert_eq!(Action::Hold.to_string(), "HOLD");
    }

    #[test]
    fn test_request_defaults() {
        let req: ForecastRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.ticker, "BBRI.JK");
        assert_eq!(req.days, 30);

        let req: ForecastRequest = serde_json::from_str(r#"{"ticker":"AAPL"}"#).unwrap();
        assert_eq!(req.days, 30);
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ForecastError::NotFound("X".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            ForecastError::InsufficientHistory { required: 32, available: 10 }.kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(ForecastError::Estimator("boom".into()).kind(), ErrorKind::Internal);
        let limited = ForecastError::RateLimit {
            source_name: "yahoo_chart".into(),
            retry_after: Some(5),
        };
        assert_eq!(limited.kind(), ErrorKind::Internal);
        assert!(!ForecastError::Estimator("secret detail".into())
            .user_message()
            .contains("secret"));
    }

    #[test]
    fn test_history_from_prices() {
        let history = PriceHistory::from_prices("TEST", &[1.0, 2.0, 3.0]);
        assert_eq!(history.len(), 3);
        assert_eq!(history.prices(), vec![1.0, 2.0, 3.0]);
        assert!(history.closes[0].date < history.closes[2].date);
    }
}
