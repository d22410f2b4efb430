use crate::models::{PriceObservation, PriceTable};
use crate::provider::{select_observations, PriceProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::prelude::*;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const PRICE_SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PriceSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    series: HashMap<String, Vec<PriceObservation>>,
}

/// Raw per-symbol observations saved to disk so backtests can run offline.
pub struct MarketData {
    start_date: NaiveDate,
    end_date: NaiveDate,
    series: HashMap<String, Vec<PriceObservation>>,
}

impl MarketData {
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        series: HashMap<String, Vec<PriceObservation>>,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(anyhow!(
                "Invalid market data date range: {} is after {}",
                start_date,
                end_date
            ));
        }

        let mut series = series;
        series.retain(|_, observations| !observations.is_empty());
        for observations in series.values_mut() {
            observations.sort_by_key(|observation| observation.date);
        }

        Ok(Self {
            start_date,
            end_date,
            series,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open price snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: PriceSnapshot =
            bincode::deserialize_from(reader).context("Snapshot decode failed")?;

        if snapshot.version != PRICE_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Price snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                PRICE_SNAPSHOT_VERSION
            ));
        }

        info!(
            "Loaded price snapshot generated at {} with {} symbols ({} - {})",
            snapshot.generated_at,
            snapshot.series.len(),
            snapshot.start_date,
            snapshot.end_date
        );

        Self::new(snapshot.start_date, snapshot.end_date, snapshot.series)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create price snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let snapshot = PriceSnapshot {
            version: PRICE_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            start_date: self.start_date,
            end_date: self.end_date,
            series: self.series.clone(),
        };
        bincode::serialize_into(&mut writer, &snapshot)
            .context("Failed to serialize price snapshot")?;
        writer
            .flush()
            .context("Failed to flush price snapshot to disk")?;
        Ok(())
    }

    pub fn has_data(&self) -> bool {
        !self.series.is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn series(&self) -> &HashMap<String, Vec<PriceObservation>> {
        &self.series
    }
}

/// Serves backtests from a snapshot written by `export-prices`.
pub struct SnapshotPriceProvider {
    data: MarketData,
}

impl SnapshotPriceProvider {
    pub fn new(data: MarketData) -> Self {
        Self { data }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        MarketData::load_from_file(path).map(Self::new)
    }

    pub fn market_data(&self) -> &MarketData {
        &self.data
    }
}

#[async_trait]
impl PriceProvider for SnapshotPriceProvider {
    async fn fetch_closes(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> PriceTable {
        if start < self.data.start_date || end > self.data.end_date {
            warn!(
                "Requested range {} - {} exceeds snapshot coverage {} - {}",
                start,
                end,
                self.data.start_date,
                self.data.end_date
            );
        }
        select_observations(&self.data.series, symbols, start, end)
    }
}
