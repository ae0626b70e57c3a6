use crate::types::*;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_RANGE: &str = "5y";

/// Wait before the single retry when a 429 carries no `retry-after`
const RATE_LIMIT_WAIT_SECS: u64 = 60;
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 120;

/// Daily closes from a Yahoo Finance style chart endpoint
pub struct YahooChartClient {
    client: Client,
    base_url: Url,
    range: String,
    timeout: Duration,
}

impl YahooChartClient {
    pub fn new(base_url: &str, range: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ForecastError::Source(format!("invalid base url {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ForecastError::Source(format!(
                "base url cannot carry a path: {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent("analog-forecast/0.1")
            .build()
            .map_err(|e| ForecastError::Source(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            range: range.into(),
            timeout,
        })
    }

    /// `{base}/v8/finance/chart/{ticker}?range=..&interval=1d`
    fn chart_url(&self, ticker: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", ticker]);
        }
        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", "1d");
        url
    }

    pub async fn get_daily_history(&self, ticker: &str) -> Result<PriceHistory> {
        let url = self.chart_url(ticker);
        debug!("Fetching daily history for {} from {}", ticker, url);

        // Initial attempt plus one retry on rate limit
        for attempt in 0..2 {
            let response =
                match tokio::time::timeout(self.timeout, self.client.get(url.clone()).send()).await {
                    Ok(Ok(resp)) => resp,
                    Ok(Err(e)) => return Err(ForecastError::Source(e.to_string())),
                    Err(_) => {
                        return Err(ForecastError::Source(format!(
                            "chart request for {} timed out after {:?}",
                            ticker, self.timeout
                        )))
                    }
                };

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok());

                if attempt == 0 {
                    let wait_secs = retry_after
                        .unwrap_or(RATE_LIMIT_WAIT_SECS)
                        .min(MAX_RATE_LIMIT_WAIT_SECS);
                    warn!(
                        "Chart API rate limited for {}, waiting {} seconds before retry",
                        ticker, wait_secs
                    );
                    tokio::time::sleep(Duration::from_secs(wait_secs)).await;
                    continue;
                }

                return Err(ForecastError::RateLimit {
                    source_name: "yahoo_chart".to_string(),
                    retry_after,
                });
            }

            return Self::read_chart(ticker, response).await;
        }

        Err(ForecastError::Source("Unexpected retry loop exit".to_string()))
    }

    async fn read_chart(ticker: &str, response: reqwest::Response) -> Result<PriceHistory> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(PriceHistory::new(ticker, Vec::new()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ForecastError::Source(format!(
                "chart API error ({}): {}",
                status, text
            )));
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .map_err(|e| ForecastError::InvalidResponse(e.to_string()))?;

        parse_chart(ticker, envelope)
    }
}

fn parse_chart(ticker: &str, envelope: ChartEnvelope) -> Result<PriceHistory> {
    if let Some(error) = envelope.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(PriceHistory::new(ticker, Vec::new()));
        }
        return Err(ForecastError::Source(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceHistory::new(ticker, Vec::new()));
    };

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();

    if closes.len() != result.timestamp.len() {
        return Err(ForecastError::InvalidResponse(format!(
            "{} timestamps but {} closes",
            result.timestamp.len(),
            closes.len()
        )));
    }

    let mut skipped = 0usize;
    let mut rows: Vec<DailyClose> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let date = DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive());
            match (date, close) {
                (Some(date), Some(c)) if c.is_finite() && c > 0.0 => {
                    Some(DailyClose { date, close: c })
                }
                _ => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();

    if skipped > 0 {
        warn!("{}: skipped {} rows without a usable date or close", ticker, skipped);
    }

    // ascending, one close per day (the latest row wins)
    rows.sort_by_key(|r| r.date);
    rows.reverse();
    rows.dedup_by_key(|r| r.date);
    rows.reverse();

    Ok(PriceHistory::new(ticker, rows))
}

#[async_trait::async_trait]
impl PriceHistorySource for YahooChartClient {
    async fn daily_history(&self, ticker: &str) -> Result<PriceHistory> {
        YahooChartClient::get_daily_history(self, ticker).await
    }

    fn name(&self) -> &str {
        "yahoo_chart"
    }
}

// Response types for the chart API
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
