//! Chart supplier against a mocked HTTP endpoint

use analog_forecast::{ForecastError, PriceHistorySource, YahooChartClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> YahooChartClient {
    YahooChartClient::new(&server.uri(), "5y", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_daily_history_parses_closes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/BBRI.JK"))
        .and(query_param("range", "5y"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "meta": { "currency": "IDR", "symbol": "BBRI.JK" },
                    "timestamp": [1699920000, 1700006400, 1700092800, 1700179200],
                    "indicators": {
                        "quote": [{ "close": [5100.0, null, 5150.0, 5125.0] }]
                    }
                }],
                "error": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = client(&server).daily_history("BBRI.JK").await.unwrap();
    assert_eq!(history.ticker, "BBRI.JK");
    assert_eq!(history.prices(), vec![5100.0, 5150.0, 5125.0]);
    assert!(history
        .closes
        .windows(2)
        .all(|pair| pair[0].date < pair[1].date));
}

#[tokio::test]
async fn test_unknown_ticker_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/NOPE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        })))
        .mount(&server)
        .await;

    let history = client(&server).daily_history("NOPE").await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_server_error_is_source_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server).daily_history("AAPL").await.unwrap_err();
    match err {
        ForecastError::Source(msg) => assert!(msg.contains("503")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).daily_history("AAPL").await.unwrap_err();
    assert!(matches!(err, ForecastError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = YahooChartClient::new(&server.uri(), "5y", Duration::from_millis(200)).unwrap();
    let err = client.daily_history("AAPL").await.unwrap_err();
    assert!(matches!(err, ForecastError::Source(_)));
}

#[tokio::test]
async fn test_rate_limit_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/BBRI.JK"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/BBRI.JK"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": [{
                    "timestamp": [1699920000, 1700006400],
                    "indicators": { "quote": [{ "close": [5100.0, 5150.0] }] }
                }],
                "error": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let history = client(&server).daily_history("BBRI.JK").await.unwrap();
    assert_eq!(history.prices(), vec![5100.0, 5150.0]);
}

#[tokio::test]
async fn test_persistent_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(&server).daily_history("AAPL").await.unwrap_err();
    match err {
        ForecastError::RateLimit { retry_after, .. } => assert_eq!(retry_after, Some(0)),
        other => panic!("unexpected: {:?}", other),
    }
}
