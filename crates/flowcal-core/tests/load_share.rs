use flowcal_core::{Bus, BusId, Topology, Zone};
use proptest::prelude::*;

fn topology_from(shares: &[(u8, f64)]) -> Topology {
    let zones = ["SE1", "SE2", "NO1", "FI"];
    let buses = shares
        .iter()
        .enumerate()
        .map(|(i, &(zone, share))| Bus {
            id: BusId::new(i + 1),
            name: String::new(),
            base_kv: 380.0,
            zone: Zone::new(zones[zone as usize % zones.len()]),
            country: "XX".into(),
            load_share: share,
            x: 0.0,
            y: 0.0,
            uc: 0,
        })
        .collect();
    Topology::new(buses, vec![], vec![], vec![], vec![], vec![]).unwrap()
}

proptest! {
    #[test]
    fn shares_sum_to_one_or_zero(
        shares in prop::collection::vec((0u8..4, prop_oneof![Just(0.0), 0.0f64..500.0]), 1..40)
    ) {
        let mut topo = topology_from(&shares);
        topo.normalize_load_shares();
        for zone in topo.zones() {
            let raw: f64 = shares
                .iter()
                .enumerate()
                .filter(|(i, _)| topo.buses[*i].zone == zone)
                .map(|(_, (_, s))| *s)
                .sum();
            let sum: f64 = topo.buses_in_zone(&zone).map(|b| b.load_share).sum();
            if raw > 0.0 {
                prop_assert!((sum - 1.0).abs() < 1e-9);
            } else {
                prop_assert_eq!(sum, 0.0);
            }
        }
    }
}

#[test]
fn nan_share_counts_as_zero() {
    let mut topo = topology_from(&[(0, f64::NAN), (0, 2.0)]);
    topo.normalize_load_shares();
    assert_eq!(topo.buses[0].load_share, 0.0);
    assert!((topo.buses[1].load_share - 1.0).abs() < 1e-12);
}
