//! # flowcal-io: file adapters
//!
//! - [`topology`]: the transmission model as a directory of CSV tables
//!   (`bus.csv`, `gen.csv`, `farms.csv`, `line.csv`, `trafo.csv`, `link.csv`)
//!   and per-country bus load tables.
//! - [`sources`]: long-format CSV files behind the generation and market
//!   query traits.

pub mod sources;
pub mod topology;

pub use sources::{load_sources, read_generation_csv, read_market_csv};
pub use topology::{load_bus_loads, load_topology, write_topology};
