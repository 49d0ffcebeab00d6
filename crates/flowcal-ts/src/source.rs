//! Upstream query services.
//!
//! Two independent services feed a run: a generation-by-type service
//! (per zone, per upstream production category) and a market service
//! (consumption, production and exchange tables). Both are reached through
//! the traits below; [`MemorySource`] keeps long-format records in memory and
//! backs the file-based sources as well as tests.

use crate::frame::HourlyFrame;
use crate::time::HourRange;
use chrono::NaiveDateTime;
use flowcal_core::{FlowcalResult, Zone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Generation-by-type result: per zone, one column per upstream category (MW).
pub type GenerationTable = BTreeMap<Zone, HourlyFrame<String>>;

pub trait GenerationSource: Send + Sync {
    /// Rows for `zones` within `range`, or `None` when nothing matches at all.
    fn select(&self, zones: &[Zone], range: &HourRange) -> FlowcalResult<Option<GenerationTable>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketTable {
    Consumption,
    Production,
    Exchange,
}

impl fmt::Display for MarketTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MarketTable::Consumption => "consumption",
            MarketTable::Production => "production",
            MarketTable::Exchange => "exchange",
        })
    }
}

pub trait MarketSource: Send + Sync {
    /// Hourly values (MWh) per category. `categories = None` selects every
    /// category of the table. Corridor names are returned as published.
    fn select(
        &self,
        table: MarketTable,
        categories: Option<&[String]>,
        range: &HourRange,
    ) -> FlowcalResult<Option<HourlyFrame<String>>>;
}

/// One long-format generation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub time: NaiveDateTime,
    pub zone: Zone,
    pub category: String,
    pub value: f64,
}

/// One long-format market row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    pub time: NaiveDateTime,
    pub table: MarketTable,
    pub category: String,
    pub value: f64,
}

/// In-memory implementation of both source traits.
///
/// Hours without a row are `NaN`. A repeated (time, key) row is ignored
/// after the first occurrence and logged.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    generation: Vec<GenerationRecord>,
    market: Vec<MarketRecord>,
}

impl MemorySource {
    pub fn new(generation: Vec<GenerationRecord>, market: Vec<MarketRecord>) -> Self {
        Self { generation, market }
    }

    pub fn push_generation(&mut self, record: GenerationRecord) {
        self.generation.push(record);
    }

    pub fn push_market(&mut self, record: MarketRecord) {
        self.market.push(record);
    }

    pub fn generation_len(&self) -> usize {
        self.generation.len()
    }

    pub fn market_len(&self) -> usize {
        self.market.len()
    }
}

fn place<K: Ord + Clone + Hash + fmt::Debug>(
    frame: &mut HourlyFrame<K>,
    seen: &mut HashSet<(K, usize)>,
    key: K,
    time: &NaiveDateTime,
    value: f64,
) {
    let Some(row) = frame.range().position(time) else {
        return;
    };
    if !seen.insert((key.clone(), row)) {
        tracing::warn!(key = ?key, hour = %time, "duplicate upstream row ignored");
        return;
    }
    frame.set(key, row, value);
}

impl GenerationSource for MemorySource {
    fn select(&self, zones: &[Zone], range: &HourRange) -> FlowcalResult<Option<GenerationTable>> {
        let wanted: HashSet<&Zone> = zones.iter().collect();
        let mut table = GenerationTable::new();
        let mut seen: BTreeMap<Zone, HashSet<(String, usize)>> = BTreeMap::new();
        for record in &self.generation {
            if !wanted.contains(&record.zone) || range.position(&record.time).is_none() {
                continue;
            }
            let frame = table
                .entry(record.zone.clone())
                .or_insert_with(|| HourlyFrame::new(*range));
            let seen_rows = seen.entry(record.zone.clone()).or_default();
            place(frame, seen_rows, record.category.clone(), &record.time, record.value);
        }
        Ok((!table.is_empty()).then_some(table))
    }
}

impl MarketSource for MemorySource {
    fn select(
        &self,
        table: MarketTable,
        categories: Option<&[String]>,
        range: &HourRange,
    ) -> FlowcalResult<Option<HourlyFrame<String>>> {
        let wanted: Option<HashSet<&str>> =
            categories.map(|c| c.iter().map(|s| s.as_str()).collect());
        let mut frame = HourlyFrame::new(*range);
        let mut seen = HashSet::new();
        for record in &self.market {
            if record.table != table || range.position(&record.time).is_none() {
                continue;
            }
            if let Some(wanted) = &wanted {
                if !wanted.contains(record.category.as_str()) {
                    continue;
                }
            }
            place(&mut frame, &mut seen, record.category.clone(), &record.time, record.value);
        }
        Ok((frame.width() > 0).then_some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_hour;

    fn range() -> HourRange {
        HourRange::parse("20180101:00", Some("20180101:02")).unwrap()
    }

    #[test]
    fn generation_select_fills_missing_hours_with_nan() {
        let mut src = MemorySource::default();
        src.push_generation(GenerationRecord {
            time: parse_hour("20180101:01").unwrap(),
            zone: Zone::new("SE1"),
            category: "Hydro".into(),
            value: 10.0,
        });
        let table = GenerationSource::select(&src, &[Zone::new("SE1")], &range())
            .unwrap()
            .unwrap();
        let frame = &table[&Zone::new("SE1")];
        let col = frame.column(&"Hydro".to_string()).unwrap();
        assert!(col[0].is_nan());
        assert_eq!(col[1], 10.0);
    }

    #[test]
    fn empty_selection_is_none() {
        let src = MemorySource::default();
        assert!(GenerationSource::select(&src, &[Zone::new("SE1")], &range())
            .unwrap()
            .is_none());
        assert!(MarketSource::select(&src, MarketTable::Exchange, None, &range())
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_rows_keep_first() {
        let mut src = MemorySource::default();
        for value in [5.0, 7.0] {
            src.push_market(MarketRecord {
                time: parse_hour("20180101:00").unwrap(),
                table: MarketTable::Consumption,
                category: "SE1".into(),
                value,
            });
        }
        let frame = MarketSource::select(&src, MarketTable::Consumption, None, &range())
            .unwrap()
            .unwrap();
        assert_eq!(frame.get(&"SE1".to_string(), 0), 5.0);
    }

    #[test]
    fn category_filter_applies() {
        let mut src = MemorySource::default();
        for cat in ["SE1", "SE2"] {
            src.push_market(MarketRecord {
                time: parse_hour("20180101:00").unwrap(),
                table: MarketTable::Production,
                category: cat.into(),
                value: 1.0,
            });
        }
        let only = vec!["SE2".to_string()];
        let frame = MarketSource::select(&src, MarketTable::Production, Some(only.as_slice()), &range())
            .unwrap()
            .unwrap();
        assert_eq!(frame.width(), 1);
        assert!(frame.contains(&"SE2".to_string()));
    }
}
