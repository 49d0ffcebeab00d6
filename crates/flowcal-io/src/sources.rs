//! Long-format CSV files behind [`GenerationSource`] and [`MarketSource`].
//!
//! - generation: `time,zone,category,value` (MW, generation clock)
//! - market: `time,table,category,value` (MWh, market clock; `table` is
//!   `consumption`, `production` or `exchange`)
//!
//! Empty values become `NaN`.
//!
//! [`GenerationSource`]: flowcal_ts::GenerationSource
//! [`MarketSource`]: flowcal_ts::MarketSource

use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flowcal_core::Zone;
use flowcal_ts::{parse_timestamp, GenerationRecord, MarketRecord, MarketTable, MemorySource};
use serde::Deserialize;

#[derive(Deserialize)]
struct GenerationRow {
    time: String,
    zone: String,
    category: String,
    value: Option<f64>,
}

#[derive(Deserialize)]
struct MarketRow {
    time: String,
    table: MarketTable,
    category: String,
    value: Option<f64>,
}

pub fn read_generation_csv(path: &Path) -> Result<Vec<GenerationRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening generation file {}", path.display()))?;
    let mut records = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: GenerationRow =
            result.with_context(|| format!("parsing generation record {}", line + 1))?;
        records.push(GenerationRecord {
            time: parse_timestamp(&row.time)
                .with_context(|| format!("generation record {}", line + 1))?,
            zone: Zone::new(row.zone),
            category: row.category,
            value: row.value.unwrap_or(f64::NAN),
        });
    }
    Ok(records)
}

pub fn read_market_csv(path: &Path) -> Result<Vec<MarketRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening market file {}", path.display()))?;
    let mut records = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: MarketRow = result.with_context(|| format!("parsing market record {}", line + 1))?;
        records.push(MarketRecord {
            time: parse_timestamp(&row.time)
                .with_context(|| format!("market record {}", line + 1))?,
            table: row.table,
            category: row.category,
            value: row.value.unwrap_or(f64::NAN),
        });
    }
    Ok(records)
}

/// One in-memory source serving both query traits from the two files.
pub fn load_sources(generation: &Path, market: &Path) -> Result<MemorySource> {
    let generation = read_generation_csv(generation)?;
    let market = read_market_csv(market)?;
    tracing::info!(
        generation_rows = generation.len(),
        market_rows = market.len(),
        "loaded measurement files"
    );
    Ok(MemorySource::new(generation, market))
}
