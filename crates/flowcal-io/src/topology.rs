use std::{fs, path::Path};

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use flowcal_core::{BusLoad, BusLoadTable, Topology};
use serde::{de::DeserializeOwned, Serialize};

pub const BUS_TABLE: &str = "bus.csv";
pub const GEN_TABLE: &str = "gen.csv";
pub const FARM_TABLE: &str = "farms.csv";
pub const LINE_TABLE: &str = "line.csv";
pub const TRAFO_TABLE: &str = "trafo.csv";
pub const LINK_TABLE: &str = "link.csv";

/// Read a topology directory. `bus.csv` is required; every other table may
/// be absent and is then empty.
pub fn load_topology(dir: &Path) -> Result<Topology> {
    let buses = read_table(&dir.join(BUS_TABLE))?;
    let generators = read_optional(&dir.join(GEN_TABLE))?;
    let farms = read_optional(&dir.join(FARM_TABLE))?;
    let lines = read_optional(&dir.join(LINE_TABLE))?;
    let transformers = read_optional(&dir.join(TRAFO_TABLE))?;
    let links = read_optional(&dir.join(LINK_TABLE))?;
    let topology = Topology::new(buses, generators, farms, lines, transformers, links)
        .with_context(|| format!("building topology from {}", dir.display()))?;
    tracing::info!(
        dir = %dir.display(),
        buses = topology.buses.len(),
        generators = topology.generators.len(),
        farms = topology.farms.len(),
        lines = topology.lines.len(),
        transformers = topology.transformers.len(),
        links = topology.links.len(),
        "loaded topology"
    );
    Ok(topology)
}

pub fn write_topology(topology: &Topology, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    write_table(&dir.join(BUS_TABLE), &topology.buses)?;
    write_table(&dir.join(GEN_TABLE), &topology.generators)?;
    write_table(&dir.join(FARM_TABLE), &topology.farms)?;
    write_table(&dir.join(LINE_TABLE), &topology.lines)?;
    write_table(&dir.join(TRAFO_TABLE), &topology.transformers)?;
    write_table(&dir.join(LINK_TABLE), &topology.links)?;
    Ok(())
}

/// Bus load table (`bus,load`) for one country.
pub fn load_bus_loads(path: &Path, country: &str) -> Result<BusLoadTable> {
    let rows: Vec<BusLoad> = read_table(path)?;
    Ok(BusLoadTable {
        country: country.trim().to_string(),
        rows,
    })
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let row: T = result.with_context(|| format!("parsing {} record {}", path.display(), line + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if path.exists() {
        read_table(path)
    } else {
        tracing::debug!(table = %path.display(), "table absent; treated as empty");
        Ok(Vec::new())
    }
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    wtr.flush()?;
    Ok(())
}
