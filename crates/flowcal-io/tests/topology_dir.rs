use std::fs;

use flowcal_core::{BusId, GenType, Zone};
use flowcal_io::{load_bus_loads, load_topology, write_topology};
use tempfile::tempdir;

fn write_fixture(dir: &std::path::Path) {
    fs::write(
        dir.join("bus.csv"),
        "id,name,base_kv,zone,country,load_share,x,y,uc\n\
         1,Luleå,380,SE1,SE,0.6,0,0,0\n\
         2,Porjus,380,SE1,SE,0.4,1,0,0\n\
         3,Ringhals,380,SE3,SE,1.0,5,0,0\n\
         4,Isolated,220,SE3,SE,0.0,9,9,0\n\
         5,Future,380,SE3,SE,0.0,6,0,2030\n",
    )
    .unwrap();
    fs::write(
        dir.join("gen.csv"),
        "id,name,bus,gen_type,pmax,uc\n\
         1,Harsprånget,1,Hydro,900,0\n\
         2,Ringhals 3,3,Nuclear,1000,0\n\
         3,Old,3,Thermal,300,-2015\n\
         4,Stranded,4,Thermal,50,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("farms.csv"),
        "id,name,bus,pmax,x,y,uc\n1,Offshore,4,200,8.5,9,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("line.csv"),
        "id,bus0,bus1,base_kv,length_km,uc\n\
         1,1,2,380,50,0\n\
         2,2,3,380,400,0\n\
         3,3,5,380,20,2030\n",
    )
    .unwrap();
}

#[test]
fn prepared_directory_drops_islands_and_retired_units() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let mut topology = load_topology(dir.path()).unwrap();
    assert_eq!(topology.buses.len(), 5);

    let report = topology.prepare(Some(2018)).unwrap();
    // bus 5 and line 3 are not built yet, the thermal unit is retired
    assert_eq!(report.removed_by_year, 3);
    assert_eq!(report.islanded, vec![BusId::new(4)]);
    assert_eq!(topology.buses.len(), 3);
    assert!(topology
        .generators
        .iter()
        .all(|g| g.gen_type != GenType::Thermal));
    // offshore farm moved to the nearest remaining bus
    assert_eq!(topology.farms[0].bus, BusId::new(3));

    let se1: f64 = topology
        .buses_in_zone(&Zone::new("SE1"))
        .map(|b| b.load_share)
        .sum();
    assert!((se1 - 1.0).abs() < 1e-9);
}

#[test]
fn written_directory_loads_back() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let topology = load_topology(dir.path()).unwrap();

    let out = tempdir().unwrap();
    write_topology(&topology, out.path()).unwrap();
    let again = load_topology(out.path()).unwrap();
    assert_eq!(again.buses.len(), topology.buses.len());
    assert_eq!(again.lines[1].length_km, 400.0);
    assert_eq!(again.generators[2].uc, -2015);
}

#[test]
fn bus_loads_replace_static_shares() {
    let dir = tempdir().unwrap();
    write_fixture(dir.path());
    let mut topology = load_topology(dir.path()).unwrap();
    let path = dir.path().join("se_loads.csv");
    fs::write(&path, "bus,load\n1,30\n2,10\n99,5\n").unwrap();
    let table = load_bus_loads(&path, "SE").unwrap();

    let diagnostics = topology.apply_bus_loads(&[table]);
    assert_eq!(diagnostics.warning_count(), 1);
    let share = |id| topology.bus(BusId::new(id)).unwrap().load_share;
    assert!((share(1) - 0.75).abs() < 1e-9);
    assert!((share(2) - 0.25).abs() < 1e-9);
    assert_eq!(share(3), 0.0);
}
