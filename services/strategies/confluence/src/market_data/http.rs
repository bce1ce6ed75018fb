//! HTTP candle service client
//!
//! `POST {endpoint}/api/candles` with `{asset, timeframe, count}`, answered by
//! `{success, candles: [{time, open, high, low, close}]}` or `{error}`.
//! The candle service does not report balances, so the balance and account
//! identity are the fixed values taken from configuration at construction.

use super::{AccountInfo, MarketDataError, MarketDataProvider, Result};
use crate::types::{Candle, Timeframe};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct CandleRequest<'a> {
    asset: &'a str,
    timeframe: Timeframe,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct CandleResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    candles: Vec<WireCandle>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireCandle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl From<WireCandle> for Candle {
    fn from(wire: WireCandle) -> Self {
        Candle::new(wire.time, wire.open, wire.high, wire.low, wire.close)
    }
}

pub struct HttpMarketData {
    client: Client,
    candles_url: String,
    balance: f64,
    account: AccountInfo,
}

impl HttpMarketData {
    pub fn new(
        endpoint: &str,
        request_timeout: Duration,
        account: AccountInfo,
        balance: f64,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            candles_url: format!("{}/api/candles", endpoint.trim_end_matches('/')),
            balance,
            account,
        })
    }
}

fn into_candles(response: CandleResponse) -> Result<Vec<Candle>> {
    if !response.success {
        return Err(MarketDataError::Service {
            message: response
                .error
                .unwrap_or_else(|| "request not successful".to_string()),
        });
    }

    let mut candles: Vec<Candle> = response.candles.into_iter().map(Candle::from).collect();
    candles.sort_by_key(|candle| candle.timestamp);
    Ok(candles)
}

#[async_trait]
impl MarketDataProvider for HttpMarketData {
    async fn fetch_candles(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let request = CandleRequest {
            asset: instrument,
            timeframe,
            count,
        };

        let response = self
            .client
            .post(&self.candles_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body: CandleResponse = response.json().await?;
        if !status.is_success() {
            return Err(MarketDataError::Service {
                message: format!(
                    "{}: {}",
                    status,
                    body.error.unwrap_or_else(|| "no error message".to_string())
                ),
            });
        }

        let candles = into_candles(body)?;
        debug!(instrument, %timeframe, count = candles.len(), "Fetched candles");
        Ok(candles)
    }

    async fn balance(&self) -> Result<f64> {
        Ok(self.balance)
    }

    async fn account_info(&self) -> Result<AccountInfo> {
        Ok(self.account)
    }
}
