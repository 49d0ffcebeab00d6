//! Small fixtures shared by unit and integration tests.

use crate::allocation::HourInputs;
use chrono::{NaiveDate, NaiveDateTime};
use flowcal_core::{
    Boundary, Bus, BusId, Diagnostics, FarmId, GenId, GenType, Generator, Line, LineId, Link,
    LinkId, Topology, TrafoId, Transformer, WindFarm, Zone,
};
use flowcal_ts::{HourRange, HourlyFrame, MeasurementSnapshot};

pub fn fixture_hour() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2018, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture hour")
}

fn bus(id: usize, zone: &str, base_kv: f64, load_share: f64) -> Bus {
    Bus {
        id: BusId::new(id),
        name: format!("B{id}"),
        base_kv,
        zone: Zone::new(zone),
        country: zone[..2].to_string(),
        load_share,
        x: id as f64,
        y: 0.0,
        uc: 0,
    }
}

fn gen(id: usize, bus: usize, gen_type: GenType, pmax: f64) -> Generator {
    Generator {
        id: GenId::new(id),
        name: format!("G{id}"),
        bus: BusId::new(bus),
        gen_type,
        pmax,
        uc: 0,
    }
}

fn line(id: usize, bus0: usize, bus1: usize, base_kv: f64, length_km: f64) -> Line {
    Line {
        id: LineId::new(id),
        bus0: BusId::new(bus0),
        bus1: BusId::new(bus1),
        base_kv,
        length_km,
        r: 0.001,
        x: 0.01,
        b: 0.0,
        uc: 0,
    }
}

fn link(id: usize, far_bus: usize, capacity_mw: f64) -> Link {
    Link {
        id: LinkId::new(id),
        name: format!("Konti-Skan {id}"),
        bus0: BusId::new(3),
        bus1: BusId::new(far_bus),
        zone0: Zone::new("SE2"),
        zone1: Zone::new("DK1"),
        capacity_mw,
        uc: 0,
    }
}

/// Five buses in SE1, SE2 and NO1.
///
/// SE1 (buses 1, 2) is tied to SE2 (bus 3) by line 2-3 and to NO1 (bus 4) by
/// line 1-4; bus 5 is a 220 kV SE2 bus behind a transformer. Two DC links run
/// from bus 3 to DK1, whose buses are not modelled.
pub fn three_zone_topology() -> Topology {
    Topology::new(
        vec![
            bus(1, "SE1", 380.0, 0.6),
            bus(2, "SE1", 380.0, 0.4),
            bus(3, "SE2", 380.0, 1.0),
            bus(4, "NO1", 300.0, 1.0),
            bus(5, "SE2", 220.0, 0.0),
        ],
        vec![
            gen(1, 1, GenType::Hydro, 1000.0),
            gen(2, 2, GenType::Hydro, 500.0),
            gen(3, 3, GenType::Nuclear, 1200.0),
            gen(4, 4, GenType::Hydro, 800.0),
        ],
        vec![WindFarm {
            id: FarmId::new(1),
            name: "Markbygden".into(),
            bus: BusId::new(2),
            pmax: 200.0,
            x: 2.0,
            y: 0.0,
            uc: 0,
        }],
        vec![
            line(1, 1, 2, 380.0, 100.0),
            line(2, 2, 3, 380.0, 150.0),
            line(3, 1, 4, 300.0, 120.0),
        ],
        vec![Transformer {
            id: TrafoId::new(1),
            bus0: BusId::new(3),
            bus1: BusId::new(5),
            r: 0.0002,
            x: 0.01,
            b: 0.0,
            uc: 0,
        }],
        vec![link(1, 99, 400.0), link(2, 98, 200.0)],
    )
    .expect("fixture topology has unique bus ids")
}

/// One hour of measurements; exchange keys are corridor names in any order
/// and are stored canonically.
pub fn hour_inputs(
    generation: &[(&str, GenType, f64)],
    load: &[(&str, f64)],
    exchange: &[(&str, f64)],
) -> HourInputs {
    HourInputs {
        hour: fixture_hour(),
        generation: generation
            .iter()
            .map(|(zone, t, v)| ((Zone::new(zone), *t), *v))
            .collect(),
        load: load.iter().map(|(zone, v)| (Zone::new(zone), *v)).collect(),
        exchange: exchange
            .iter()
            .map(|(name, v)| {
                let (boundary, sign) = Boundary::parse(name).expect("fixture corridor name");
                (boundary, sign * v)
            })
            .collect(),
    }
}

/// Snapshot over `range`. Every zone with a load column gets all four
/// generation types; types not listed are zero.
pub fn snapshot(
    range: HourRange,
    generation: &[(&str, GenType, Vec<f64>)],
    load: &[(&str, Vec<f64>)],
    exchange: &[(&str, Vec<f64>)],
) -> MeasurementSnapshot {
    let hours = range.len();
    let mut gen_frame = HourlyFrame::new(range);
    for (zone, _) in load {
        for t in GenType::ALL {
            gen_frame
                .insert_column((Zone::new(zone), t), vec![0.0; hours])
                .expect("fixture column length");
        }
    }
    for (zone, t, values) in generation {
        gen_frame
            .insert_column((Zone::new(zone), *t), values.clone())
            .expect("fixture column length");
    }
    let mut load_frame = HourlyFrame::new(range);
    for (zone, values) in load {
        load_frame
            .insert_column(Zone::new(zone), values.clone())
            .expect("fixture column length");
    }
    let mut exchange_frame = HourlyFrame::new(range);
    for (name, values) in exchange {
        let (boundary, sign) = Boundary::parse(name).expect("fixture corridor name");
        exchange_frame
            .insert_column(boundary, values.iter().map(|v| sign * v).collect())
            .expect("fixture column length");
    }
    MeasurementSnapshot {
        range,
        generation: gen_frame,
        load: load_frame,
        exchange: exchange_frame,
        diagnostics: Diagnostics::new(),
    }
}
