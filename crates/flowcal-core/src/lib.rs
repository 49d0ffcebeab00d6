//! # flowcal-core: transmission topology store
//!
//! In-memory tables for a multi-zone transmission model: buses, generators,
//! wind farms, AC lines, transformers and DC links. A [`Topology`] is loaded
//! once, prepared once for a study year (see [`Topology::prepare`]) and then
//! shared read-only by every hour of a run.
//!
//! ## Keys
//!
//! - Elements use newtype ids ([`BusId`], [`GenId`], [`FarmId`], [`LineId`],
//!   [`TrafoId`], [`LinkId`]) so a bus id cannot be passed where a link id is
//!   expected.
//! - Market areas use [`Zone`]; generation categories use the closed
//!   [`GenType`] enum. Tables keyed by `(Zone, GenType)` are validated against
//!   the configured zone set when they are built.
//!
//! ## Modules
//!
//! - [`boundary`] - canonical inter-zone boundary keys
//! - [`topology`] - element tables, one-time preparation and lookups
//! - [`params`] - per-km impedance model that derives branch R/X/B
//! - [`graph_utils`] - connectivity and island detection (petgraph)
//! - [`diagnostics`] - non-fatal issues collected during a run
//! - [`solver`] - dense linear system backend used by the DC flow solve

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod boundary;
pub mod diagnostics;
pub mod error;
pub mod graph_utils;
pub mod params;
pub mod solver;
pub mod topology;

pub use boundary::{split_corridor, Boundary};
pub use diagnostics::{DiagnosticIssue, Diagnostics};
pub use error::{FlowcalError, FlowcalResult};
pub use graph_utils::{find_islands, topology_stats, IslandAnalysis, IslandSummary, TopologyStats};
pub use params::{BranchParameters, CalibrationTarget, Compensation, VoltageClass};
pub use solver::{FaerSolver, LinearSystemBackend};
pub use topology::{
    Bus, BusLoad, BusLoadTable, Generator, Line, Link, PrepareReport, Topology, Transformer,
    WindFarm,
};

/// System base power used for per-unit conversion.
pub const BASE_MVA: f64 = 100.0;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FarmId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrafoId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);

macro_rules! impl_id {
    ($name:ident, $label:literal) => {
        impl $name {
            pub fn new(value: usize) -> Self {
                Self(value)
            }

            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

impl_id!(BusId, "Bus");
impl_id!(GenId, "Gen");
impl_id!(FarmId, "Farm");
impl_id!(LineId, "Line");
impl_id!(TrafoId, "Trafo");
impl_id!(LinkId, "Link");

/// A bidding zone (SE1, NO3, DK2, ...) or a bare country code (SE, PL).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Zone {
    fn from(value: &str) -> Self {
        Zone::new(value)
    }
}

impl AsRef<str> for Zone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Primary generation type. Wind is carried by wind farms, the rest by generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GenType {
    Nuclear,
    Hydro,
    Thermal,
    Wind,
}

impl GenType {
    pub const ALL: [GenType; 4] = [
        GenType::Nuclear,
        GenType::Hydro,
        GenType::Thermal,
        GenType::Wind,
    ];

    /// Types allocated over generators (everything but wind).
    pub const DISPATCHABLE: [GenType; 3] = [GenType::Nuclear, GenType::Hydro, GenType::Thermal];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenType::Nuclear => "Nuclear",
            GenType::Hydro => "Hydro",
            GenType::Thermal => "Thermal",
            GenType::Wind => "Wind",
        }
    }

    /// Map an upstream production category onto its primary type.
    ///
    /// Solar is folded into wind since both are modelled as negative load.
    pub fn from_upstream(category: &str) -> Option<GenType> {
        match category.trim() {
            "Biomass" | "Gas" | "Hard coal" | "Oil" | "Other" | "Other renew" | "Peat"
            | "Thermal" | "Waste" => Some(GenType::Thermal),
            "Hydro" | "Hydro res" | "Hydro ror" => Some(GenType::Hydro),
            "Nuclear" => Some(GenType::Nuclear),
            "Solar" | "Wind" | "Wind offsh" | "Wind onsh" => Some(GenType::Wind),
            _ => None,
        }
    }
}

impl fmt::Display for GenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenType {
    type Err = FlowcalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nuclear" => Ok(GenType::Nuclear),
            "hydro" => Ok(GenType::Hydro),
            "thermal" => Ok(GenType::Thermal),
            "wind" => Ok(GenType::Wind),
            other => Err(FlowcalError::Parse(format!(
                "unknown generation type '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_trims_and_orders_lexicographically() {
        let a = Zone::new(" NO1 ");
        let b = Zone::new("SE3");
        assert_eq!(a.as_str(), "NO1");
        assert!(a < b);
    }

    #[test]
    fn upstream_categories_map_to_primary_types() {
        assert_eq!(GenType::from_upstream("Hard coal"), Some(GenType::Thermal));
        assert_eq!(GenType::from_upstream("Hydro ror"), Some(GenType::Hydro));
        assert_eq!(GenType::from_upstream("Solar"), Some(GenType::Wind));
        assert_eq!(GenType::from_upstream("Wind offsh"), Some(GenType::Wind));
        assert_eq!(GenType::from_upstream("Nuclear"), Some(GenType::Nuclear));
        assert_eq!(GenType::from_upstream("Geothermal"), None);
    }

    #[test]
    fn gen_type_parses_case_insensitive() {
        assert_eq!("hydro".parse::<GenType>().unwrap(), GenType::Hydro);
        assert_eq!("WIND".parse::<GenType>().unwrap(), GenType::Wind);
        assert!("coal".parse::<GenType>().is_err());
    }

    #[test]
    fn ids_display_with_label() {
        assert_eq!(BusId::new(7).to_string(), "Bus 7");
        assert_eq!(LinkId::new(2).value(), 2);
    }
}
