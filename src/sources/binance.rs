use super::MarketData;
use crate::config::MarketDataConfig;
use crate::types::Candle;
use anyhow::{anyhow, Context};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Klines per request (Binance maximum).
const KLINE_PAGE_LIMIT: i64 = 1000;

/// Pause between pages to stay under the rate limit.
const PAGE_DELAY_MS: u64 = 100;

/// Length of one kline interval such as `1m` or `4h`, in milliseconds.
pub fn interval_ms(interval: &str) -> Option<i64> {
    let unit = interval.chars().last()?;
    let count: i64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    let unit_ms = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 604_800_000,
        _ => return None,
    };
    (count > 0).then_some(count * unit_ms)
}

fn field_f64(row: &[Value], index: usize) -> anyhow::Result<f64> {
    match row.get(index) {
        Some(Value::String(s)) => s
            .parse()
            .with_context(|| format!("kline field {} is not a number: {}", index, s)),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow!("kline field {} out of range", index)),
        other => Err(anyhow!("kline field {} missing or malformed: {:?}", index, other)),
    }
}

/// Parse one `[openTime, open, high, low, close, volume, ...]` row.
fn parse_kline(row: &[Value]) -> anyhow::Result<Candle> {
    let time = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("kline open time missing"))?;
    Ok(Candle {
        time,
        open: field_f64(row, 1)?,
        high: field_f64(row, 2)?,
        low: field_f64(row, 3)?,
        close: field_f64(row, 4)?,
        volume: field_f64(row, 5)?,
    })
}

/// Binance REST klines client.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    config: MarketDataConfig,
}

impl BinanceClient {
    pub fn new(config: MarketDataConfig) -> Self {
        let client = Client::builder()
            .user_agent("Augur/0.1")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// One page of klines starting at `start_time`.
    async fn fetch_page(&self, start_time: i64, end_time: i64) -> anyhow::Result<Vec<Candle>> {
        let url = format!("{}/klines", self.config.rest_url);

        let mut request = self.client.get(&url).query(&[
            ("symbol", self.config.symbol.clone()),
            ("interval", self.config.interval.clone()),
            ("limit", KLINE_PAGE_LIMIT.to_string()),
            ("startTime", start_time.to_string()),
            ("endTime", end_time.to_string()),
        ]);
        if let Some(ref key) = self.config.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!("Binance klines returned {}: {}", status, excerpt(&text));
            return Err(anyhow!("Binance API error: {}", status));
        }

        let rows: Vec<Vec<Value>> = response.json().await?;
        rows.iter().map(|row| parse_kline(row)).collect()
    }

    /// Page through `[start_time, end_time]`, oldest first.
    pub async fn fetch_range(&self, start_time: i64, end_time: i64) -> anyhow::Result<Vec<Candle>> {
        let step = interval_ms(&self.config.interval)
            .ok_or_else(|| anyhow!("unsupported kline interval: {}", self.config.interval))?;

        let mut candles: Vec<Candle> = Vec::new();
        let mut cursor = start_time;

        while cursor < end_time {
            let segment_end = (cursor + KLINE_PAGE_LIMIT * step).min(end_time);
            let page = self.fetch_page(cursor, segment_end).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = last.time + 1;
            candles.extend(page);

            let done = (cursor - start_time) as f64 / (end_time - start_time) as f64 * 100.0;
            debug!("Kline download {:.2}% ({} candles)", done.min(100.0), candles.len());

            sleep(Duration::from_millis(PAGE_DELAY_MS)).await;
        }

        Ok(candles)
    }
}

impl MarketData for BinanceClient {
    fn fetch_historical(
        &self,
        days: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<Candle>>> + Send + '_>> {
        Box::pin(async move {
            let end_time = chrono::Utc::now().timestamp_millis();
            let start_time = end_time - i64::from(days) * 86_400_000;
            info!(
                "Fetching {} {} klines for the last {} days",
                self.config.symbol, self.config.interval, days
            );
            let candles = self.fetch_range(start_time, end_time).await?;
            info!("Fetched {} candles from Binance", candles.len());
            Ok(candles)
        })
    }
}

/// First 200 characters of an error body.
fn excerpt(text: &str) -> String {
    text.chars().take(200).collect()
}
