use crate::models::{PriceObservation, PriceTable};
use crate::provider::PriceProvider;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{info, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
const CHART_PATH: [&str; 3] = ["v8", "finance", "chart"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONCURRENT_REQUESTS: usize = 4;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Downloads daily adjusted closes from the Yahoo Finance chart API.
pub struct YahooPriceProvider {
    http: Client,
    base_url: String,
}

impl YahooPriceProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Raw observations for one symbol inside the inclusive date range.
    pub async fn fetch_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>> {
        let url = self.chart_url(symbol)?;
        let period1 = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        let period2 = (end + ChronoDuration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp());
        let (Some(period1), Some(period2)) = (period1, period2) else {
            return Err(anyhow!("invalid date range {} - {}", start, end));
        };

        let response = self
            .http
            .get(url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("request for {} failed", symbol))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("chart request for {} returned {}", symbol, status));
        }

        let body: ChartResponse = response
            .json()
            .await
            .with_context(|| format!("invalid chart payload for {}", symbol))?;
        parse_chart_response(symbol, body)
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Yahoo base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Yahoo base URL {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(CHART_PATH)
            .push(symbol);
        Ok(url)
    }

    /// Downloads every symbol, a few at a time. Failed symbols are logged and
    /// left out.
    pub async fn fetch_observations(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> HashMap<String, Vec<PriceObservation>> {
        info!(
            "Downloading {} symbols from {} ({} - {})",
            symbols.len(),
            self.base_url,
            start,
            end
        );

        let mut pending = symbols.iter();
        let mut in_flight = FuturesUnordered::new();
        for _ in 0..MAX_CONCURRENT_REQUESTS {
            if let Some(symbol) = pending.next() {
                in_flight.push(self.fetch_tagged(symbol, start, end));
            }
        }

        let mut observations = HashMap::new();
        while let Some((symbol, result)) = in_flight.next().await {
            match result {
                Ok(series) if series.is_empty() => {
                    warn!("No price data returned for {}; dropping it", symbol);
                }
                Ok(series) => {
                    observations.insert(symbol, series);
                }
                Err(err) => {
                    warn!("Failed to download {}: {:#}; dropping it", symbol, err);
                }
            }
            if let Some(next_symbol) = pending.next() {
                in_flight.push(self.fetch_tagged(next_symbol, start, end));
            }
        }

        observations
    }

    async fn fetch_tagged(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> (String, Result<Vec<PriceObservation>>) {
        (
            symbol.to_string(),
            self.fetch_symbol(symbol, start, end).await,
        )
    }
}

#[async_trait]
impl PriceProvider for YahooPriceProvider {
    async fn fetch_closes(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PriceTable {
        let observations = self.fetch_observations(symbols, start, end).await;
        PriceTable::from_observations(&observations)
    }
}

fn parse_chart_response(symbol: &str, body: ChartResponse) -> Result<Vec<PriceObservation>> {
    if let Some(error) = body.chart.error {
        return Err(anyhow!(
            "Yahoo Finance error for {}: {} - {}",
            symbol,
            error.code,
            error.description
        ));
    }

    let Some(data) = body.chart.result.and_then(|results| results.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let timestamps = data.timestamp.unwrap_or_default();
    let offset_seconds = data.meta.gmtoffset.unwrap_or(0);
    // Raw closes are used only when the response carries no adjusted series;
    // null adjusted rows are skipped and later forward-filled.
    let closes = match data
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next())
    {
        Some(adjusted) => adjusted.adjclose,
        None => data
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|quote| quote.close)
            .unwrap_or_default(),
    };

    let mut observations = Vec::with_capacity(timestamps.len());
    for (idx, timestamp) in timestamps.iter().enumerate() {
        let Some(close) = closes.get(idx).copied().flatten() else {
            continue;
        };
        let Some(moment) = DateTime::<Utc>::from_timestamp(timestamp + offset_seconds, 0) else {
            continue;
        };
        observations.push(PriceObservation {
            date: moment.date_naive(),
            close,
        });
    }

    // Intraday rows for the current session can repeat a date; keep the latest.
    observations.dedup_by(|later, earlier| {
        if later.date == earlier.date {
            earlier.close = later.close;
            true
        } else {
            false
        }
    });

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn uses_only_adjusted_closes_when_present() {
        let response = body(
            r#"{"chart":{"result":[{
                "meta":{"gmtoffset":19800},
                "timestamp":[1704166200,1704252600,1704339000],
                "indicators":{
                    "quote":[{"close":[100.0,101.0,102.0]}],
                    "adjclose":[{"adjclose":[99.0,null,100.98]}]
                }
            }],"error":null}}"#,
        );

        let observations = parse_chart_response("TEST.NS", response).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(observations[0].close, 99.0);
        assert_eq!(observations[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(observations[1].close, 100.98);
    }

    #[test]
    fn null_adjusted_row_does_not_leak_a_raw_close() {
        let response = body(
            r#"{"chart":{"result":[{
                "timestamp":[1704166200,1704252600],
                "indicators":{
                    "quote":[{"close":[100.0,102.0]}],
                    "adjclose":[{"adjclose":[99.0,null]}]
                }
            }],"error":null}}"#,
        );

        let observations = parse_chart_response("TEST.NS", response).unwrap();
        let closes: Vec<f64> = observations.iter().map(|o| o.close).collect();
        assert_eq!(closes, vec![99.0]);
    }

    #[test]
    fn falls_back_to_raw_closes_without_adjusted_series() {
        let response = body(
            r#"{"chart":{"result":[{
                "timestamp":[1704166200,1704252600],
                "indicators":{"quote":[{"close":[100.0,null]}]}
            }],"error":null}}"#,
        );

        let observations = parse_chart_response("TEST.NS", response).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].close, 100.0);
    }

    #[test]
    fn surfaces_api_errors() {
        let response = body(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#,
        );
        let err = parse_chart_response("GONE", response).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn chart_url_appends_symbol_after_chart_path() {
        let provider = YahooPriceProvider::new("https://example.test/").unwrap();
        let url = provider.chart_url("NIFTYBEES.NS").unwrap();
        assert_eq!(url.as_str(), "https://example.test/v8/finance/chart/NIFTYBEES.NS");
    }
}
