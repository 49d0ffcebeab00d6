//! Measured versus modelled inter-zone flows.

use crate::allocation::Injections;
use crate::case::SolverCase;
use crate::solver::SolvedCase;
use flowcal_core::{Boundary, Topology, Zone};
use flowcal_ts::HourlyFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hourly flow per canonical boundary, MW, positive from the first zone to
/// the second.
pub type FlowMatrix = HourlyFrame<Boundary>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonOptions {
    /// Add DC link flows to the modelled AC exchange of the same boundary.
    pub include_links: bool,
}

/// Net AC flow across every boundary that has at least one branch.
pub fn inter_zone_flows(case: &SolverCase, solved: &SolvedCase) -> BTreeMap<Boundary, f64> {
    let mut flows = BTreeMap::new();
    for (branch, flow) in case.branches.iter().zip(&solved.branch_flow_mw) {
        let z0 = &case.buses[branch.from].zone;
        let z1 = &case.buses[branch.to].zone;
        if z0 == z1 {
            continue;
        }
        let (boundary, sign) = Boundary::canonical(z0, z1);
        *flows.entry(boundary).or_insert(0.0) += sign * flow;
    }
    flows
}

/// Modelled flow for each of `corridors`; a corridor without branches in the
/// case is 0.
pub fn modelled_flows(
    case: &SolverCase,
    solved: &SolvedCase,
    corridors: &[Boundary],
) -> BTreeMap<Boundary, f64> {
    let all = inter_zone_flows(case, solved);
    corridors
        .iter()
        .map(|b| (b.clone(), all.get(b).copied().unwrap_or(0.0)))
        .collect()
}

/// DC link flows summed per boundary, canonical sign.
pub fn link_exchange(topology: &Topology, injections: &Injections) -> BTreeMap<Boundary, f64> {
    let mut flows = BTreeMap::new();
    for (link, p) in topology.links.iter().zip(&injections.link_p) {
        let (boundary, sign) = Boundary::canonical(&link.zone0, &link.zone1);
        *flows.entry(boundary).or_insert(0.0) += sign * p;
    }
    flows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowComparison {
    pub boundary: Boundary,
    pub measured: f64,
    pub modelled: f64,
}

impl FlowComparison {
    pub fn difference(&self) -> f64 {
        self.measured - self.modelled
    }
}

/// Side by side values of both matrices at one row, in boundary order.
pub fn compare_hour(measured: &FlowMatrix, modelled: &FlowMatrix, row: usize) -> Vec<FlowComparison> {
    modelled
        .keys()
        .map(|boundary| FlowComparison {
            boundary: boundary.clone(),
            measured: measured.get(boundary, row),
            modelled: modelled.get(boundary, row),
        })
        .collect()
}

/// Power balance of one zone in a solved hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneBalance {
    pub zone: Zone,
    pub load_mw: f64,
    pub generation_mw: f64,
    /// AC flow leaving the zone.
    pub net_export_mw: f64,
    /// `generation - load - net_export`; nonzero where the slack picked up
    /// a mismatch.
    pub residual_mw: f64,
}

pub fn zone_balance(case: &SolverCase, solved: &SolvedCase) -> Vec<ZoneBalance> {
    let mut load: BTreeMap<Zone, f64> = BTreeMap::new();
    let mut generation: BTreeMap<Zone, f64> = BTreeMap::new();
    for bus in &case.buses {
        *load.entry(bus.zone.clone()).or_insert(0.0) += bus.load_mw;
        generation.entry(bus.zone.clone()).or_insert(0.0);
    }
    let zone_of: BTreeMap<_, _> = case.buses.iter().map(|b| (b.id, &b.zone)).collect();
    for gen in &case.generators {
        if let Some(zone) = zone_of.get(&gen.bus) {
            *generation.entry((*zone).clone()).or_insert(0.0) += gen.p_mw;
        }
    }

    let mut export: BTreeMap<Zone, f64> = BTreeMap::new();
    for (boundary, flow) in inter_zone_flows(case, solved) {
        *export.entry(boundary.first().clone()).or_insert(0.0) += flow;
        *export.entry(boundary.second().clone()).or_insert(0.0) -= flow;
    }

    load.into_iter()
        .map(|(zone, load_mw)| {
            let generation_mw = generation.get(&zone).copied().unwrap_or(0.0);
            let net_export_mw = export.get(&zone).copied().unwrap_or(0.0);
            ZoneBalance {
                residual_mw: generation_mw - load_mw - net_export_mw,
                zone,
                load_mw,
                generation_mw,
                net_export_mw,
            }
        })
        .collect()
}
