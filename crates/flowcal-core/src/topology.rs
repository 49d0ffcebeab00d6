use crate::diagnostics::{category, Diagnostics};
use crate::graph_utils::find_islands;
use crate::{
    BusId, FarmId, FlowcalError, FlowcalResult, GenId, GenType, LineId, LinkId, TrafoId, Zone,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    #[serde(default)]
    pub name: String,
    /// Voltage base in kV.
    pub base_kv: f64,
    pub zone: Zone,
    pub country: String,
    /// Fraction of the zone load attached to this bus.
    #[serde(default)]
    pub load_share: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Commissioning year; negative means decommissioned in `-uc`, 0 means always present.
    #[serde(default)]
    pub uc: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: GenId,
    #[serde(default)]
    pub name: String,
    pub bus: BusId,
    pub gen_type: GenType,
    pub pmax: f64,
    #[serde(default)]
    pub uc: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindFarm {
    pub id: FarmId,
    #[serde(default)]
    pub name: String,
    pub bus: BusId,
    pub pmax: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub uc: i32,
}

/// AC line. R, X and B are per unit on [`crate::BASE_MVA`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub bus0: BusId,
    pub bus1: BusId,
    pub base_kv: f64,
    #[serde(default)]
    pub length_km: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default)]
    pub uc: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformer {
    pub id: TrafoId,
    pub bus0: BusId,
    pub bus1: BusId,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default)]
    pub uc: i32,
}

/// DC tie. Positive flow leaves `bus0` and arrives at `bus1`.
///
/// One end usually sits outside the modelled system, so the zones are stored
/// on the link rather than derived from the buses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    #[serde(default)]
    pub name: String,
    pub bus0: BusId,
    pub bus1: BusId,
    pub zone0: Zone,
    pub zone1: Zone,
    #[serde(default)]
    pub capacity_mw: f64,
    #[serde(default)]
    pub uc: i32,
}

/// Measured or estimated load at one bus, used to derive load shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusLoad {
    pub bus: BusId,
    pub load: f64,
}

/// Bus loads for one country. Only buses of that country pick up rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusLoadTable {
    pub country: String,
    pub rows: Vec<BusLoad>,
}

/// Outcome of [`Topology::prepare`].
#[derive(Debug, Default)]
pub struct PrepareReport {
    pub removed_by_year: usize,
    pub islanded: Vec<BusId>,
    pub dropped_generators: Vec<GenId>,
    pub dropped_branches: usize,
    pub relocated_farms: Vec<(FarmId, BusId)>,
    pub diagnostics: Diagnostics,
}

/// Element tables of the transmission model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub buses: Vec<Bus>,
    pub generators: Vec<Generator>,
    pub farms: Vec<WindFarm>,
    pub lines: Vec<Line>,
    pub transformers: Vec<Transformer>,
    pub links: Vec<Link>,
    #[serde(skip)]
    bus_index: HashMap<BusId, usize>,
}

fn in_service(uc: i32, year: i32) -> bool {
    let not_built = uc > year;
    let dismantled = uc < 0 && -uc <= year;
    !(not_built || dismantled)
}

impl Topology {
    pub fn new(
        buses: Vec<Bus>,
        generators: Vec<Generator>,
        farms: Vec<WindFarm>,
        lines: Vec<Line>,
        transformers: Vec<Transformer>,
        links: Vec<Link>,
    ) -> FlowcalResult<Self> {
        let mut topology = Self {
            buses,
            generators,
            farms,
            lines,
            transformers,
            links,
            bus_index: HashMap::new(),
        };
        topology.reindex()?;
        Ok(topology)
    }

    /// Rebuild the bus lookup after the bus table changed.
    pub fn reindex(&mut self) -> FlowcalResult<()> {
        self.bus_index.clear();
        for (pos, bus) in self.buses.iter().enumerate() {
            if self.bus_index.insert(bus.id, pos).is_some() {
                return Err(FlowcalError::Validation(format!(
                    "duplicate bus id {}",
                    bus.id.value()
                )));
            }
        }
        Ok(())
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.bus_index.get(&id).map(|&pos| &self.buses[pos])
    }

    /// Position of a bus in [`Topology::buses`].
    pub fn bus_position(&self, id: BusId) -> Option<usize> {
        self.bus_index.get(&id).copied()
    }

    pub fn zone_of(&self, id: BusId) -> Option<&Zone> {
        self.bus(id).map(|bus| &bus.zone)
    }

    /// Zones that own at least one bus, in lexicographic order.
    pub fn zones(&self) -> BTreeSet<Zone> {
        self.buses.iter().map(|bus| bus.zone.clone()).collect()
    }

    pub fn buses_in_zone<'a>(&'a self, zone: &'a Zone) -> impl Iterator<Item = &'a Bus> + 'a {
        self.buses.iter().filter(move |bus| &bus.zone == zone)
    }

    /// Generators of one type whose bus lies in `zone`.
    pub fn generators_in<'a>(
        &'a self,
        zone: &'a Zone,
        gen_type: GenType,
    ) -> impl Iterator<Item = (usize, &'a Generator)> + 'a {
        self.generators
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.gen_type == gen_type && self.zone_of(g.bus) == Some(zone))
    }

    pub fn farms_in<'a>(&'a self, zone: &'a Zone) -> impl Iterator<Item = (usize, &'a WindFarm)> + 'a {
        self.farms
            .iter()
            .enumerate()
            .filter(move |(_, f)| self.zone_of(f.bus) == Some(zone))
    }

    /// One-time preparation for a study year.
    ///
    /// Removes elements outside their service window, drops islanded buses
    /// and everything attached to them (links excepted), moves wind farms off
    /// removed buses to the nearest remaining bus and renormalizes load shares.
    pub fn prepare(&mut self, year: Option<i32>) -> FlowcalResult<PrepareReport> {
        let mut report = PrepareReport::default();

        if let Some(year) = year {
            report.removed_by_year = self.filter_year(year);
            self.reindex()?;
            tracing::info!(year, removed = report.removed_by_year, "applied service-year filter");
        }

        let analysis = find_islands(self);
        let islanded = analysis.islanded_buses();
        if !islanded.is_empty() {
            let ids: Vec<String> = islanded.iter().map(|b| b.value().to_string()).collect();
            report.diagnostics.warn(
                category::ISLANDED_BUS,
                format!("removed {} island buses: {}", islanded.len(), ids.join(", ")),
                None,
            );
            let drop: HashSet<BusId> = islanded.iter().copied().collect();
            self.buses.retain(|bus| !drop.contains(&bus.id));
            self.reindex()?;
            report.islanded = islanded;
        }

        if self.buses.is_empty() {
            return Err(FlowcalError::Topology(
                "no buses left after preparation".into(),
            ));
        }

        let index = &self.bus_index;
        let mut dropped = Vec::new();
        self.generators.retain(|g| {
            let keep = index.contains_key(&g.bus);
            if !keep {
                dropped.push(g.id);
            }
            keep
        });
        report.dropped_generators = dropped;

        let branches = self.lines.len() + self.transformers.len();
        self.lines
            .retain(|l| index.contains_key(&l.bus0) && index.contains_key(&l.bus1));
        self.transformers
            .retain(|t| index.contains_key(&t.bus0) && index.contains_key(&t.bus1));
        report.dropped_branches = branches - self.lines.len() - self.transformers.len();

        report.relocated_farms = self.relocate_farms();
        for (farm, bus) in &report.relocated_farms {
            tracing::debug!(farm = farm.value(), bus = bus.value(), "relocated wind farm");
        }

        self.normalize_load_shares();
        Ok(report)
    }

    fn filter_year(&mut self, year: i32) -> usize {
        let before = self.element_count();
        self.buses.retain(|e| in_service(e.uc, year));
        self.generators.retain(|e| in_service(e.uc, year));
        self.farms.retain(|e| in_service(e.uc, year));
        self.lines.retain(|e| in_service(e.uc, year));
        self.transformers.retain(|e| in_service(e.uc, year));
        self.links.retain(|e| in_service(e.uc, year));
        before - self.element_count()
    }

    fn element_count(&self) -> usize {
        self.buses.len()
            + self.generators.len()
            + self.farms.len()
            + self.lines.len()
            + self.transformers.len()
            + self.links.len()
    }

    fn relocate_farms(&mut self) -> Vec<(FarmId, BusId)> {
        let mut moved = Vec::new();
        for farm in self.farms.iter_mut() {
            if self.bus_index.contains_key(&farm.bus) {
                continue;
            }
            let nearest = self
                .buses
                .iter()
                .map(|bus| {
                    let dx = bus.x - farm.x;
                    let dy = bus.y - farm.y;
                    (dx * dx + dy * dy, bus.id)
                })
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            if let Some((_, bus)) = nearest {
                farm.bus = bus;
                moved.push((farm.id, bus));
            }
        }
        moved
    }

    /// Replace load shares with raw bus loads from per-country tables, then normalize.
    pub fn apply_bus_loads(&mut self, tables: &[BusLoadTable]) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        for bus in self.buses.iter_mut() {
            bus.load_share = 0.0;
        }
        for table in tables {
            for row in &table.rows {
                match self.bus_index.get(&row.bus) {
                    Some(&pos) if self.buses[pos].country == table.country => {
                        if row.load.is_finite() {
                            self.buses[pos].load_share += row.load;
                        }
                    }
                    Some(_) => {}
                    None => diagnostics.warn(
                        category::SOURCE,
                        format!("load table {} names unknown bus", table.country),
                        Some(row.bus.to_string().as_str()),
                    ),
                }
            }
        }
        self.normalize_load_shares();
        diagnostics
    }

    /// Scale load shares so every zone sums to one; zones without load get zeros.
    pub fn normalize_load_shares(&mut self) {
        let mut sums: BTreeMap<Zone, f64> = BTreeMap::new();
        for bus in &self.buses {
            let share = if bus.load_share.is_finite() {
                bus.load_share
            } else {
                0.0
            };
            *sums.entry(bus.zone.clone()).or_insert(0.0) += share;
        }
        for bus in self.buses.iter_mut() {
            let sum = sums.get(&bus.zone).copied().unwrap_or(0.0);
            bus.load_share = if sum > 0.0 && sum.is_finite() && bus.load_share.is_finite() {
                bus.load_share / sum
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn bus(id: usize, zone: &str, kv: f64, share: f64) -> Bus {
        Bus {
            id: BusId::new(id),
            name: format!("B{id}"),
            base_kv: kv,
            zone: Zone::new(zone),
            country: zone.chars().take(2).collect(),
            load_share: share,
            x: id as f64,
            y: 0.0,
            uc: 0,
        }
    }

    fn line(id: usize, a: usize, b: usize, kv: f64) -> Line {
        Line {
            id: LineId::new(id),
            bus0: BusId::new(a),
            bus1: BusId::new(b),
            base_kv: kv,
            length_km: 100.0,
            r: 0.001,
            x: 0.01,
            b: 0.0,
            uc: 0,
        }
    }

    /// SE1 {1, 2}, SE2 {3, 5}, NO1 {4}; bus 5 hangs off a transformer.
    pub(crate) fn sample_topology() -> Topology {
        let buses = vec![
            bus(1, "SE1", 380.0, 3.0),
            bus(2, "SE1", 380.0, 2.0),
            bus(3, "SE2", 380.0, 1.0),
            bus(4, "NO1", 300.0, 4.0),
            bus(5, "SE2", 220.0, 1.0),
        ];
        let generators = vec![
            Generator {
                id: GenId::new(1),
                name: "G1".into(),
                bus: BusId::new(1),
                gen_type: GenType::Hydro,
                pmax: 1000.0,
                uc: 0,
            },
            Generator {
                id: GenId::new(2),
                name: "G2".into(),
                bus: BusId::new(3),
                gen_type: GenType::Nuclear,
                pmax: 500.0,
                uc: 0,
            },
            Generator {
                id: GenId::new(3),
                name: "G3".into(),
                bus: BusId::new(4),
                gen_type: GenType::Hydro,
                pmax: 800.0,
                uc: 0,
            },
        ];
        let farms = vec![WindFarm {
            id: FarmId::new(1),
            name: "F1".into(),
            bus: BusId::new(2),
            pmax: 100.0,
            x: 2.0,
            y: 0.0,
            uc: 0,
        }];
        let lines = vec![
            line(1, 1, 2, 380.0),
            line(2, 2, 3, 380.0),
            line(3, 3, 4, 300.0),
        ];
        let transformers = vec![Transformer {
            id: TrafoId::new(1),
            bus0: BusId::new(3),
            bus1: BusId::new(5),
            r: 0.0,
            x: 0.02,
            b: 0.0,
            uc: 0,
        }];
        let links = vec![Link {
            id: LinkId::new(1),
            name: "Skagerrak".into(),
            bus0: BusId::new(4),
            bus1: BusId::new(900),
            zone0: Zone::new("NO1"),
            zone1: Zone::new("DK1"),
            capacity_mw: 700.0,
            uc: 0,
        }];
        Topology::new(buses, generators, farms, lines, transformers, links).unwrap()
    }

    #[test]
    fn duplicate_bus_ids_are_rejected() {
        let err = Topology::new(
            vec![bus(1, "SE1", 380.0, 1.0), bus(1, "SE1", 380.0, 1.0)],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate bus id 1"));
    }

    #[test]
    fn normalization_sums_to_one_per_zone() {
        let mut topo = sample_topology();
        topo.normalize_load_shares();
        for zone in topo.zones() {
            let sum: f64 = topo.buses_in_zone(&zone).map(|b| b.load_share).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{zone}: {sum}");
        }
        assert!((topo.bus(BusId::new(1)).unwrap().load_share - 0.6).abs() < 1e-12);
    }

    #[test]
    fn zero_load_zone_gets_zero_shares() {
        let mut topo = sample_topology();
        for b in topo.buses.iter_mut().filter(|b| b.zone.as_str() == "SE2") {
            b.load_share = 0.0;
        }
        topo.normalize_load_shares();
        let sum: f64 = topo
            .buses_in_zone(&Zone::new("SE2"))
            .map(|b| b.load_share)
            .sum();
        assert_eq!(sum, 0.0);
    }

    #[test]
    fn year_filter_drops_future_and_dismantled() {
        let mut topo = sample_topology();
        topo.generators[0].uc = 2020;
        topo.generators[1].uc = -2015;
        topo.generators[2].uc = -2019;
        let report = topo.prepare(Some(2018)).unwrap();
        assert_eq!(report.removed_by_year, 2);
        assert_eq!(topo.generators.len(), 1);
        assert_eq!(topo.generators[0].id, GenId::new(3));
    }

    #[test]
    fn prepare_removes_islands_and_relocates_farms() {
        let mut topo = sample_topology();
        topo.buses.push(bus(7, "SE1", 130.0, 5.0));
        topo.farms.push(WindFarm {
            id: FarmId::new(2),
            name: "F2".into(),
            bus: BusId::new(7),
            pmax: 50.0,
            x: 3.2,
            y: 0.0,
            uc: 0,
        });
        topo.generators.push(Generator {
            id: GenId::new(9),
            name: "G9".into(),
            bus: BusId::new(7),
            gen_type: GenType::Thermal,
            pmax: 10.0,
            uc: 0,
        });
        topo.reindex().unwrap();

        let report = topo.prepare(None).unwrap();
        assert_eq!(report.islanded, vec![BusId::new(7)]);
        assert_eq!(report.dropped_generators, vec![GenId::new(9)]);
        assert_eq!(report.relocated_farms, vec![(FarmId::new(2), BusId::new(3))]);
        assert!(topo.bus(BusId::new(7)).is_none());
        assert_eq!(
            report.diagnostics.count_category(category::ISLANDED_BUS),
            1
        );
        // links survive even though bus 900 is outside the model
        assert_eq!(topo.links.len(), 1);
    }

    #[test]
    fn bus_load_tables_accumulate_per_country() {
        let mut topo = sample_topology();
        let tables = vec![
            BusLoadTable {
                country: "SE".into(),
                rows: vec![
                    BusLoad { bus: BusId::new(1), load: 100.0 },
                    BusLoad { bus: BusId::new(1), load: 50.0 },
                    BusLoad { bus: BusId::new(2), load: 50.0 },
                    BusLoad { bus: BusId::new(4), load: 999.0 },
                    BusLoad { bus: BusId::new(77), load: 1.0 },
                ],
            },
        ];
        let diag = topo.apply_bus_loads(&tables);
        assert_eq!(diag.warning_count(), 1);
        assert!((topo.bus(BusId::new(1)).unwrap().load_share - 0.75).abs() < 1e-12);
        assert!((topo.bus(BusId::new(2)).unwrap().load_share - 0.25).abs() < 1e-12);
        // NO1 bus is not a Swedish bus and its zone has no load left
        assert_eq!(topo.bus(BusId::new(4)).unwrap().load_share, 0.0);
    }
}
