//! Solver case assembly.
//!
//! A [`SolverCase`] is the matpower-style view of one hour: bus rows with
//! their kind and net load, generator rows and one branch row per line and
//! transformer. It owns its data so the solve can run on any thread.

use crate::allocation::Injections;
use chrono::NaiveDateTime;
use flowcal_core::{
    BusId, FlowcalError, FlowcalResult, GenId, LineId, Topology, TrafoId, Zone, BASE_MVA,
};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BusKind {
    Pq,
    Pv,
    Slack,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseBus {
    pub id: BusId,
    pub kind: BusKind,
    /// Net withdrawal in MW.
    pub load_mw: f64,
    pub zone: Zone,
    pub base_kv: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseGen {
    pub id: GenId,
    pub bus: BusId,
    pub p_mw: f64,
    pub pmax_mw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BranchOrigin {
    Line(LineId),
    Transformer(TrafoId),
}

/// Branch row; `from`/`to` index [`SolverCase::buses`].
#[derive(Debug, Clone, Serialize)]
pub struct CaseBranch {
    pub bus0: BusId,
    pub bus1: BusId,
    pub from: usize,
    pub to: usize,
    pub r: f64,
    pub x: f64,
    pub b: f64,
    pub origin: BranchOrigin,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolverCase {
    pub hour: NaiveDateTime,
    pub base_mva: f64,
    pub buses: Vec<CaseBus>,
    pub generators: Vec<CaseGen>,
    pub branches: Vec<CaseBranch>,
}

impl SolverCase {
    pub fn slack(&self) -> Option<usize> {
        self.buses.iter().position(|b| b.kind == BusKind::Slack)
    }

    /// Net injection per bus in MW (generation minus load).
    pub fn net_injections(&self) -> Vec<f64> {
        let index: HashMap<BusId, usize> = self
            .buses
            .iter()
            .enumerate()
            .map(|(pos, b)| (b.id, pos))
            .collect();
        let mut p: Vec<f64> = self.buses.iter().map(|b| -b.load_mw).collect();
        for gen in &self.generators {
            if let Some(&pos) = index.get(&gen.bus) {
                p[pos] += gen.p_mw;
            }
        }
        p
    }
}

/// Assemble the case for one hour.
///
/// A bus is PV when a generator with positive `Pmax` sits on it, PQ
/// otherwise. The first PV bus in bus order becomes the slack, or the first
/// bus when there is no PV bus.
pub fn build_case(topology: &Topology, injections: &Injections) -> FlowcalResult<SolverCase> {
    if topology.buses.is_empty() {
        return Err(FlowcalError::Topology("cannot build a case without buses".into()));
    }
    if injections.bus_load.len() != topology.buses.len()
        || injections.gen_p.len() != topology.generators.len()
    {
        return Err(FlowcalError::Validation(
            "injections do not match the topology".into(),
        ));
    }

    let mut pv = vec![false; topology.buses.len()];
    for gen in &topology.generators {
        if gen.pmax > 0.0 {
            if let Some(pos) = topology.bus_position(gen.bus) {
                pv[pos] = true;
            }
        }
    }
    let slack = pv.iter().position(|&is_pv| is_pv).unwrap_or(0);

    let buses = topology
        .buses
        .iter()
        .enumerate()
        .map(|(pos, bus)| CaseBus {
            id: bus.id,
            kind: if pos == slack {
                BusKind::Slack
            } else if pv[pos] {
                BusKind::Pv
            } else {
                BusKind::Pq
            },
            load_mw: injections.bus_load[pos],
            zone: bus.zone.clone(),
            base_kv: bus.base_kv,
        })
        .collect();

    let generators = topology
        .generators
        .iter()
        .zip(&injections.gen_p)
        .map(|(gen, p)| CaseGen {
            id: gen.id,
            bus: gen.bus,
            p_mw: *p,
            pmax_mw: gen.pmax,
        })
        .collect();

    let position = |id: BusId| {
        topology
            .bus_position(id)
            .ok_or_else(|| FlowcalError::Topology(format!("branch references missing {id}")))
    };
    let mut branches = Vec::with_capacity(topology.lines.len() + topology.transformers.len());
    for line in &topology.lines {
        branches.push(CaseBranch {
            bus0: line.bus0,
            bus1: line.bus1,
            from: position(line.bus0)?,
            to: position(line.bus1)?,
            r: line.r,
            x: line.x,
            b: line.b,
            origin: BranchOrigin::Line(line.id),
        });
    }
    for trafo in &topology.transformers {
        branches.push(CaseBranch {
            bus0: trafo.bus0,
            bus1: trafo.bus1,
            from: position(trafo.bus0)?,
            to: position(trafo.bus1)?,
            r: trafo.r,
            x: trafo.x,
            b: trafo.b,
            origin: BranchOrigin::Transformer(trafo.id),
        });
    }

    Ok(SolverCase {
        hour: injections.hour,
        base_mva: BASE_MVA,
        buses,
        generators,
        branches,
    })
}
