//! Power allocation: zone totals to element injections for one hour.

use chrono::NaiveDateTime;
use flowcal_core::diagnostics::category;
use flowcal_core::{Boundary, Diagnostics, FlowcalResult, GenType, Topology, Zone};
use flowcal_ts::MeasurementSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What to do when a measurement exceeds the installed capacity of its type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Keep the proportional dispatch above `Pmax`.
    #[default]
    Allow,
    /// Dispatch at `Pmax`; the excess is folded into the zone's negative load.
    Clip,
}

/// How a corridor flow is shared between the DC links that carry it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSplitPolicy {
    #[default]
    Even,
    /// Proportional to link capacity; falls back to even when no capacity is known.
    CapacityWeighted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub overflow: OverflowPolicy,
    pub link_split: LinkSplitPolicy,
    /// Scale generator output so total generation equals total bus load.
    pub balance: bool,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            overflow: OverflowPolicy::Allow,
            link_split: LinkSplitPolicy::Even,
            balance: true,
        }
    }
}

/// How one measured corridor is represented in the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorridorRoute {
    /// Link positions in [`Topology::links`] with the sign that maps the
    /// canonical corridor flow onto the link's bus0 -> bus1 direction.
    pub links: Vec<(usize, f64)>,
    /// At least one line or transformer joins the two zones.
    pub ac: bool,
}

impl CorridorRoute {
    pub fn is_unmapped(&self) -> bool {
        self.links.is_empty() && !self.ac
    }
}

/// Mapping from measured corridors to model elements, built once per run.
#[derive(Debug, Clone, Default)]
pub struct CorridorPlan {
    routes: BTreeMap<Boundary, CorridorRoute>,
    pub diagnostics: Diagnostics,
}

impl CorridorPlan {
    pub fn build<'a>(topology: &Topology, corridors: impl IntoIterator<Item = &'a Boundary>) -> Self {
        let mut diagnostics = Diagnostics::new();

        let mut ac_boundaries = std::collections::BTreeSet::new();
        let branch_ends = topology
            .lines
            .iter()
            .map(|l| (l.bus0, l.bus1))
            .chain(topology.transformers.iter().map(|t| (t.bus0, t.bus1)));
        for (bus0, bus1) in branch_ends {
            if let (Some(z0), Some(z1)) = (topology.zone_of(bus0), topology.zone_of(bus1)) {
                if z0 != z1 {
                    ac_boundaries.insert(Boundary::canonical(z0, z1).0);
                }
            }
        }

        for link in &topology.links {
            for (bus, zone) in [(link.bus0, &link.zone0), (link.bus1, &link.zone1)] {
                let modelled = topology.buses.iter().any(|b| &b.zone == zone);
                if modelled && topology.bus(bus).is_none() {
                    diagnostics.warn(
                        category::MISSING_LINK_BUS,
                        format!("link {} ends at unknown bus {}", link.name, bus.value()),
                        Some(link.id.to_string().as_str()),
                    );
                }
            }
        }

        let mut routes = BTreeMap::new();
        for boundary in corridors {
            let links: Vec<(usize, f64)> = topology
                .links
                .iter()
                .enumerate()
                .filter_map(|(pos, link)| {
                    let (linked, sign) = Boundary::canonical(&link.zone0, &link.zone1);
                    (&linked == boundary).then_some((pos, sign))
                })
                .collect();
            let route = CorridorRoute {
                links,
                ac: ac_boundaries.contains(boundary),
            };
            if route.is_unmapped() {
                diagnostics.warn(
                    category::UNMAPPED_CORRIDOR,
                    "measured corridor has no counterpart in the model",
                    Some(boundary.to_string().as_str()),
                );
            }
            routes.insert(boundary.clone(), route);
        }

        tracing::info!(
            corridors = routes.len(),
            ac = routes.values().filter(|r| r.ac).count(),
            dc = routes.values().filter(|r| !r.links.is_empty()).count(),
            "built corridor plan"
        );
        Self {
            routes,
            diagnostics,
        }
    }

    pub fn route(&self, boundary: &Boundary) -> Option<&CorridorRoute> {
        self.routes.get(boundary)
    }

    /// Corridors compared against the AC flow solution, in canonical order.
    pub fn ac_corridors(&self) -> Vec<Boundary> {
        self.routes
            .iter()
            .filter(|(_, r)| r.ac)
            .map(|(b, _)| b.clone())
            .collect()
    }

    pub fn link_corridors(&self) -> impl Iterator<Item = (&Boundary, &[(usize, f64)])> {
        self.routes
            .iter()
            .filter(|(_, r)| !r.links.is_empty())
            .map(|(b, r)| (b, r.links.as_slice()))
    }
}

/// One hour of reconciled measurements.
#[derive(Debug, Clone)]
pub struct HourInputs {
    pub hour: NaiveDateTime,
    pub generation: BTreeMap<(Zone, GenType), f64>,
    pub load: BTreeMap<Zone, f64>,
    pub exchange: BTreeMap<Boundary, f64>,
}

impl HourInputs {
    pub fn from_snapshot(snapshot: &MeasurementSnapshot, row: usize) -> FlowcalResult<Self> {
        let hour = snapshot.range.hours().nth(row).ok_or_else(|| {
            flowcal_core::FlowcalError::Validation(format!(
                "row {row} outside {}",
                snapshot.range
            ))
        })?;
        Ok(Self {
            hour,
            generation: snapshot
                .generation
                .keys()
                .map(|k| (k.clone(), snapshot.generation.get(k, row)))
                .collect(),
            load: snapshot
                .load
                .keys()
                .map(|z| (z.clone(), snapshot.load.get(z, row)))
                .collect(),
            exchange: snapshot
                .exchange
                .keys()
                .map(|b| (b.clone(), snapshot.exchange.get(b, row)))
                .collect(),
        })
    }

    /// Zones with measurements, in order.
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.load.keys()
    }

    pub fn generation(&self, zone: &Zone, gen_type: GenType) -> f64 {
        self.generation
            .get(&(zone.clone(), gen_type))
            .copied()
            .unwrap_or(0.0)
    }

    /// Generation or load entries without a value in zones that own buses in
    /// `topology`; an hour with any of these cannot be allocated. Zones
    /// without buses inject nowhere, so their gaps are ignored.
    pub fn missing(&self, topology: &Topology) -> Vec<String> {
        let modelled = topology.zones();
        let gen = self
            .generation
            .iter()
            .filter(|((zone, _), v)| v.is_nan() && modelled.contains(zone))
            .map(|((zone, t), _)| format!("{zone}/{t}"));
        let load = self
            .load
            .iter()
            .filter(|(zone, v)| v.is_nan() && modelled.contains(*zone))
            .map(|(zone, _)| format!("{zone}/load"));
        gen.chain(load).collect()
    }
}

/// Element injections for one hour. Vectors follow the order of the
/// matching [`Topology`] tables.
#[derive(Debug, Clone)]
pub struct Injections {
    pub hour: NaiveDateTime,
    /// MW per generator.
    pub gen_p: Vec<f64>,
    /// MW per wind farm.
    pub farm_p: Vec<f64>,
    /// Net MW withdrawn per bus (wind and link imports already subtracted).
    pub bus_load: Vec<f64>,
    /// MW per link, positive from bus0 to bus1.
    pub link_p: Vec<f64>,
    /// Generation with no capacity to land on, per zone.
    pub negative_load: BTreeMap<Zone, f64>,
    pub diagnostics: Diagnostics,
}

impl Injections {
    pub fn total_generation(&self) -> f64 {
        self.gen_p.iter().sum()
    }

    pub fn total_load(&self) -> f64 {
        self.bus_load.iter().sum()
    }
}

pub struct Allocator<'a> {
    topology: &'a Topology,
    plan: &'a CorridorPlan,
    policy: AllocationPolicy,
}

impl<'a> Allocator<'a> {
    pub fn new(topology: &'a Topology, plan: &'a CorridorPlan, policy: AllocationPolicy) -> Self {
        Self {
            topology,
            plan,
            policy,
        }
    }

    pub fn allocate(&self, inputs: &HourInputs) -> Injections {
        let topology = self.topology;
        let mut diagnostics = Diagnostics::new();
        let mut gen_p = vec![0.0; topology.generators.len()];
        let mut farm_p = vec![0.0; topology.farms.len()];
        let mut negative_load: BTreeMap<Zone, f64> = BTreeMap::new();

        for zone in inputs.zones() {
            let mut neg = 0.0;
            for gen_type in GenType::DISPATCHABLE {
                let members: Vec<(usize, f64)> = topology
                    .generators_in(zone, gen_type)
                    .map(|(pos, g)| (pos, g.pmax))
                    .collect();
                neg += self.spread(
                    zone,
                    gen_type,
                    inputs.generation(zone, gen_type),
                    &members,
                    &mut gen_p,
                    &mut diagnostics,
                );
            }
            let farms: Vec<(usize, f64)> = topology
                .farms_in(zone)
                .map(|(pos, f)| (pos, f.pmax))
                .collect();
            neg += self.spread(
                zone,
                GenType::Wind,
                inputs.generation(zone, GenType::Wind),
                &farms,
                &mut farm_p,
                &mut diagnostics,
            );
            negative_load.insert(zone.clone(), neg);
        }

        let mut bus_load = vec![0.0; topology.buses.len()];
        for (pos, bus) in topology.buses.iter().enumerate() {
            if let Some(zone_load) = inputs.load.get(&bus.zone) {
                let neg = negative_load.get(&bus.zone).copied().unwrap_or(0.0);
                bus_load[pos] = bus.load_share * (zone_load - neg);
            }
        }
        for (farm, p) in topology.farms.iter().zip(&farm_p) {
            if let Some(pos) = topology.bus_position(farm.bus) {
                bus_load[pos] -= p;
            }
        }

        let link_p = self.link_flows(inputs);
        for (link, p) in topology.links.iter().zip(&link_p) {
            if let Some(pos) = topology.bus_position(link.bus0) {
                bus_load[pos] += p;
            }
            if let Some(pos) = topology.bus_position(link.bus1) {
                bus_load[pos] -= p;
            }
        }

        if self.policy.balance {
            let total_load: f64 = bus_load.iter().sum();
            let total_gen: f64 = gen_p.iter().sum();
            let ratio = total_load / total_gen;
            if total_gen != 0.0 && ratio.is_finite() {
                for p in gen_p.iter_mut() {
                    *p *= ratio;
                }
            } else {
                diagnostics.warn(
                    category::BALANCE,
                    format!("generation {total_gen:.1} MW cannot be scaled to load {total_load:.1} MW"),
                    None,
                );
            }
        }

        Injections {
            hour: inputs.hour,
            gen_p,
            farm_p,
            bus_load,
            link_p,
            negative_load,
            diagnostics,
        }
    }

    /// Dispatch `measured` over `members` in proportion to their capacity and
    /// return the part that has to become negative load.
    fn spread(
        &self,
        zone: &Zone,
        gen_type: GenType,
        measured: f64,
        members: &[(usize, f64)],
        output: &mut [f64],
        diagnostics: &mut Diagnostics,
    ) -> f64 {
        let available: f64 = members.iter().map(|(_, pmax)| pmax).sum();
        if available == 0.0 {
            return measured;
        }
        let mut share = measured / available;
        let mut excess = 0.0;
        if share > 1.0 {
            diagnostics.warn(
                category::CAPACITY_OVERFLOW,
                format!(
                    "not enough {} capacity ({available:.0} vs {measured:.0} MW)",
                    gen_type.as_str().to_lowercase()
                ),
                Some(zone.as_str()),
            );
            if self.policy.overflow == OverflowPolicy::Clip {
                excess = measured - available;
                share = 1.0;
            }
        }
        for &(pos, pmax) in members {
            output[pos] = pmax * share;
        }
        excess
    }

    fn link_flows(&self, inputs: &HourInputs) -> Vec<f64> {
        let links = &self.topology.links;
        let mut link_p = vec![0.0; links.len()];
        for (boundary, members) in self.plan.link_corridors() {
            let flow = match inputs.exchange.get(boundary) {
                Some(v) if !v.is_nan() => *v,
                _ => 0.0,
            };
            let capacity: f64 = members.iter().map(|(pos, _)| links[*pos].capacity_mw).sum();
            let weighted =
                self.policy.link_split == LinkSplitPolicy::CapacityWeighted && capacity > 0.0;
            for &(pos, sign) in members {
                let part = if weighted {
                    links[pos].capacity_mw / capacity
                } else {
                    1.0 / members.len() as f64
                };
                link_p[pos] = sign * flow * part;
            }
        }
        link_p
    }
}
