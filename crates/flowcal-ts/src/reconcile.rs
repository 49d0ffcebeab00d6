//! Measurement reconciliation.
//!
//! Merges the generation-by-type service and the market service into one
//! hourly [`MeasurementSnapshot`] for a run window: zone x type generation,
//! zone load and canonical-boundary exchange. The snapshot is built once per
//! run and never modified afterwards.

use crate::dst::correct_clock_change;
use crate::frame::{Gap, HourlyFrame};
use crate::source::{GenerationSource, MarketSource, MarketTable};
use crate::time::HourRange;
use flowcal_core::diagnostics::category;
use flowcal_core::{split_corridor, Boundary, Diagnostics, FlowcalError, FlowcalResult, GenType, Zone};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Modelled bidding zones.
    pub zones: Vec<Zone>,
    /// Bare country codes; corridors between two of them are not modelled.
    pub countries: Vec<String>,
    /// Longest run of missing hours that is filled.
    pub interpolation_limit: usize,
    /// Scale generation-by-type so its zone total matches market production.
    pub rescale_to_market: bool,
    pub dst_ratio_threshold: f64,
    /// Offset between the generation feed's clock and the market clock.
    pub generation_shift_hours: i64,
    /// Published corridor name -> modelled corridor name.
    pub corridor_aliases: BTreeMap<String, String>,
    /// Set for exchange feeds where a positive `A-B` value means B to A.
    pub invert_exchange_sign: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let zones = [
            "SE1", "SE2", "SE3", "SE4", "NO1", "NO2", "NO3", "NO4", "NO5", "FI", "DK2",
        ];
        let aliases = [
            ("SE-PL", "SE4-PL"),
            ("SE-DE", "SE4-DE"),
            ("NO-DK", "NO2-DK1"),
            ("NO-NL", "NO2-NL"),
            ("NO-FI", "NO4-FI"),
        ];
        Self {
            zones: zones.iter().map(Zone::new).collect(),
            countries: ["SE", "NO", "FI", "DK"].iter().map(|c| c.to_string()).collect(),
            interpolation_limit: 10,
            rescale_to_market: true,
            dst_ratio_threshold: 1.5,
            generation_shift_hours: 1,
            corridor_aliases: aliases
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            invert_exchange_sign: false,
        }
    }
}

/// Reconciled hourly measurements for one run window.
#[derive(Debug, Clone)]
pub struct MeasurementSnapshot {
    pub range: HourRange,
    /// MW per (zone, type). Every configured zone has all four types.
    pub generation: HourlyFrame<(Zone, GenType)>,
    /// MW per zone.
    pub load: HourlyFrame<Zone>,
    /// MW per canonical boundary, positive from the first zone to the second.
    pub exchange: HourlyFrame<Boundary>,
    pub diagnostics: Diagnostics,
}

impl MeasurementSnapshot {
    pub fn generation_at(&self, zone: &Zone, gen_type: GenType, row: usize) -> f64 {
        self.generation.get(&(zone.clone(), gen_type), row)
    }

    pub fn load_at(&self, zone: &Zone, row: usize) -> f64 {
        self.load.get(zone, row)
    }

    pub fn exchange_at(&self, boundary: &Boundary, row: usize) -> f64 {
        self.exchange.get(boundary, row)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.load.keys()
    }

    pub fn corridors(&self) -> impl Iterator<Item = &Boundary> {
        self.exchange.keys()
    }
}

pub struct Reconciler<'a> {
    generation: &'a dyn GenerationSource,
    market: &'a dyn MarketSource,
    config: ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        generation: &'a dyn GenerationSource,
        market: &'a dyn MarketSource,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            generation,
            market,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Build the snapshot for `range`. Fails with [`FlowcalError::NoData`]
    /// when a source has nothing at all for the window.
    pub fn reconcile(&self, range: &HourRange) -> FlowcalResult<MeasurementSnapshot> {
        if self.config.zones.is_empty() {
            return Err(FlowcalError::Config("no modelled zones configured".into()));
        }
        let mut diagnostics = Diagnostics::new();
        let zone_names: Vec<String> = self.config.zones.iter().map(|z| z.to_string()).collect();

        let mut generation = self.generation_by_type(range, &mut diagnostics)?;
        if self.config.rescale_to_market {
            let production = self
                .market
                .select(MarketTable::Production, Some(zone_names.as_slice()), range)?
                .ok_or_else(|| no_data(range, "market production"))?;
            self.rescale(&mut generation, &production, &mut diagnostics);
        }

        let consumption = self
            .market
            .select(MarketTable::Consumption, Some(zone_names.as_slice()), range)?
            .ok_or_else(|| no_data(range, "market consumption"))?;
        let load = self.load(range, &consumption, &mut diagnostics)?;

        let raw_exchange = self
            .market
            .select(MarketTable::Exchange, None, range)?
            .ok_or_else(|| no_data(range, "market exchange"))?;
        let exchange = self.exchange(range, &raw_exchange, &mut diagnostics)?;

        tracing::info!(
            range = %range,
            zones = self.config.zones.len(),
            corridors = exchange.width(),
            issues = diagnostics.issues.len(),
            "reconciled measurements"
        );

        Ok(MeasurementSnapshot {
            range: *range,
            generation,
            load,
            exchange,
            diagnostics,
        })
    }

    fn generation_by_type(
        &self,
        range: &HourRange,
        diagnostics: &mut Diagnostics,
    ) -> FlowcalResult<HourlyFrame<(Zone, GenType)>> {
        let shift = self.config.generation_shift_hours;
        let raw = self
            .generation
            .select(&self.config.zones, &range.shifted(-shift))?
            .ok_or_else(|| no_data(range, "generation by type"))?;

        let mut out = HourlyFrame::new(*range);
        for zone in &self.config.zones {
            for gen_type in GenType::ALL {
                out.insert_column((zone.clone(), gen_type), vec![0.0; range.len()])?;
            }
        }

        let mut unknown = BTreeSet::new();
        for zone in &self.config.zones {
            let Some(frame) = raw.get(zone) else {
                diagnostics.warn(
                    category::DATA_GAP,
                    "no generation rows for zone",
                    Some(zone.as_str()),
                );
                for gen_type in GenType::ALL {
                    out.insert_column((zone.clone(), gen_type), vec![f64::NAN; range.len()])?;
                }
                continue;
            };

            let mut frame = frame.clone().shift_hours(shift).reindex(*range);
            for row in correct_clock_change(&mut frame, self.config.dst_ratio_threshold) {
                diagnostics.warn(
                    category::DST_CORRECTION,
                    format!("split doubled hour into {}", frame.hour_label(row)),
                    Some(zone.as_str()),
                );
            }
            let gaps = frame.interpolate(self.config.interpolation_limit);
            report_gaps(&frame, gaps, diagnostics, |name| format!("{zone}/{name}"));

            let by_type = frame.regroup(|name| {
                let mapped = GenType::from_upstream(name);
                if mapped.is_none() {
                    unknown.insert(name.clone());
                }
                mapped
            });
            for (gen_type, values) in by_type.columns() {
                let column = out.column_mut((zone.clone(), *gen_type));
                for (acc, v) in column.iter_mut().zip(values) {
                    *acc += v;
                }
            }
        }
        for name in unknown {
            diagnostics.warn(
                category::SOURCE,
                "unknown production category ignored",
                Some(name.as_str()),
            );
        }
        Ok(out)
    }

    fn rescale(
        &self,
        generation: &mut HourlyFrame<(Zone, GenType)>,
        production: &HourlyFrame<String>,
        diagnostics: &mut Diagnostics,
    ) {
        for zone in &self.config.zones {
            let Some(target) = production.column(&zone.to_string()) else {
                diagnostics.warn(
                    category::RESCALE,
                    "no market production; generation left unscaled",
                    Some(zone.as_str()),
                );
                continue;
            };
            let mut skipped = 0usize;
            for (row, &market_total) in target.iter().enumerate() {
                let total: f64 = GenType::ALL
                    .iter()
                    .map(|t| generation.get(&(zone.clone(), *t), row))
                    .filter(|v| !v.is_nan())
                    .sum();
                let ratio = market_total / total;
                if !ratio.is_finite() {
                    skipped += 1;
                    continue;
                }
                for gen_type in GenType::ALL {
                    let key = (zone.clone(), gen_type);
                    let value = generation.get(&key, row) * ratio;
                    generation.set(key, row, value);
                }
            }
            if skipped > 0 {
                diagnostics.warn(
                    category::RESCALE,
                    format!("{skipped} hours without a usable production ratio left unscaled"),
                    Some(zone.as_str()),
                );
            }
        }
    }

    fn load(
        &self,
        range: &HourRange,
        consumption: &HourlyFrame<String>,
        diagnostics: &mut Diagnostics,
    ) -> FlowcalResult<HourlyFrame<Zone>> {
        let mut load = HourlyFrame::new(*range);
        let mut absent = Vec::new();
        for zone in &self.config.zones {
            match consumption.column(&zone.to_string()) {
                Some(values) => load.insert_column(zone.clone(), values.to_vec())?,
                None => absent.push(zone),
            }
        }
        let gaps = load.interpolate(self.config.interpolation_limit);
        report_gaps(&load, gaps, diagnostics, |zone| format!("{zone}/load"));
        for zone in absent {
            diagnostics.warn(
                category::DATA_GAP,
                "no market consumption for zone",
                Some(zone.as_str()),
            );
            load.insert_column(zone.clone(), vec![f64::NAN; range.len()])?;
        }
        Ok(load)
    }

    fn exchange(
        &self,
        range: &HourRange,
        raw: &HourlyFrame<String>,
        diagnostics: &mut Diagnostics,
    ) -> FlowcalResult<HourlyFrame<Boundary>> {
        let mut exchange = HourlyFrame::new(*range);
        for (name, values) in raw.columns() {
            let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
            let name = self
                .config
                .corridor_aliases
                .get(&compact)
                .cloned()
                .unwrap_or(compact);
            let (a, b) = match split_corridor(&name) {
                Ok(pair) => pair,
                Err(err) => {
                    diagnostics.warn(category::SOURCE, err.to_string(), Some(name.as_str()));
                    continue;
                }
            };
            if !self.is_modelled(&a, &b) {
                tracing::debug!(corridor = %name, "corridor outside the model");
                continue;
            }
            let (boundary, mut sign) = Boundary::canonical(&a, &b);
            if self.config.invert_exchange_sign {
                sign = -sign;
            }
            if exchange.contains(&boundary) {
                diagnostics.warn(
                    category::SOURCE,
                    "corridor reported twice; first column kept",
                    Some(boundary.to_string().as_str()),
                );
                continue;
            }
            exchange.insert_column(boundary, values.iter().map(|v| v * sign).collect())?;
        }
        let gaps = exchange.interpolate(self.config.interpolation_limit);
        report_gaps(&exchange, gaps, diagnostics, |boundary| boundary.to_string());
        Ok(exchange)
    }

    fn is_modelled(&self, a: &Zone, b: &Zone) -> bool {
        let zones = &self.config.zones;
        let is_country = |z: &Zone| self.config.countries.iter().any(|c| c == z.as_str());
        (zones.contains(a) || zones.contains(b)) && !(is_country(a) && is_country(b))
    }
}

/// Log filled runs and record unfilled ones as data gaps.
fn report_gaps<K: Ord + Clone>(
    frame: &HourlyFrame<K>,
    gaps: impl IntoIterator<Item = Gap<K>>,
    diagnostics: &mut Diagnostics,
    entity: impl Fn(&K) -> String,
) {
    for gap in gaps {
        let entity = entity(&gap.column);
        if gap.filled {
            tracing::debug!(entity = %entity, hours = gap.len, "interpolated gap");
        } else {
            diagnostics.warn(
                category::DATA_GAP,
                format!(
                    "{} missing hours from {} left unfilled",
                    gap.len,
                    frame.hour_label(gap.start_row)
                ),
                Some(entity.as_str()),
            );
        }
    }
}

fn no_data(range: &HourRange, source: &str) -> FlowcalError {
    FlowcalError::NoData {
        range: range.to_string(),
        message: format!("{source} returned no rows"),
    }
}
