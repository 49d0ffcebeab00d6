use flowcal_core::diagnostics::category;
use flowcal_core::{Boundary, FlowcalError, GenType, Zone};
use flowcal_ts::{
    parse_hour, GenerationRecord, HourRange, MarketRecord, MarketTable, MemorySource,
    ReconcileConfig, Reconciler,
};

fn config(zones: &[&str]) -> ReconcileConfig {
    ReconcileConfig {
        zones: zones.iter().map(Zone::new).collect(),
        ..ReconcileConfig::default()
    }
}

fn gen(src: &mut MemorySource, hour: &str, zone: &str, category: &str, value: f64) {
    src.push_generation(GenerationRecord {
        time: parse_hour(hour).unwrap(),
        zone: Zone::new(zone),
        category: category.into(),
        value,
    });
}

fn market(src: &mut MemorySource, hour: &str, table: MarketTable, category: &str, value: f64) {
    src.push_market(MarketRecord {
        time: parse_hour(hour).unwrap(),
        table,
        category: category.into(),
        value,
    });
}

/// One zone, two hours, consistent production and a single corridor.
fn base_source() -> MemorySource {
    let mut src = MemorySource::default();
    for (gen_hour, hour) in [("20180101:00", "20180101:01"), ("20180101:01", "20180101:02")] {
        gen(&mut src, gen_hour, "SE1", "Hydro", 80.0);
        gen(&mut src, gen_hour, "SE1", "Nuclear", 20.0);
        market(&mut src, hour, MarketTable::Production, "SE1", 100.0);
        market(&mut src, hour, MarketTable::Consumption, "SE1", 90.0);
        market(&mut src, hour, MarketTable::Exchange, "SE1-SE2", 10.0);
    }
    src
}

fn window() -> HourRange {
    HourRange::parse("20180101:01", Some("20180101:02")).unwrap()
}

#[test]
fn generation_clock_is_shifted_forward_one_hour() {
    let src = base_source();
    let snapshot = Reconciler::new(&src, &src, config(&["SE1"]))
        .reconcile(&window())
        .unwrap();
    let se1 = Zone::new("SE1");
    assert_eq!(snapshot.generation_at(&se1, GenType::Hydro, 0), 80.0);
    assert_eq!(snapshot.generation_at(&se1, GenType::Nuclear, 1), 20.0);
    assert_eq!(snapshot.generation_at(&se1, GenType::Wind, 0), 0.0);
    assert_eq!(snapshot.load_at(&se1, 0), 90.0);
}

#[test]
fn generation_is_rescaled_to_market_production() {
    let mut src = MemorySource::default();
    gen(&mut src, "20180101:00", "SE1", "Hydro", 80.0);
    gen(&mut src, "20180101:00", "SE1", "Nuclear", 20.0);
    market(&mut src, "20180101:01", MarketTable::Production, "SE1", 200.0);
    market(&mut src, "20180101:01", MarketTable::Consumption, "SE1", 150.0);
    market(&mut src, "20180101:01", MarketTable::Exchange, "SE1-SE2", 0.0);

    let range = HourRange::parse("20180101:01", None).unwrap();
    let snapshot = Reconciler::new(&src, &src, config(&["SE1"]))
        .reconcile(&range)
        .unwrap();
    let se1 = Zone::new("SE1");
    assert_eq!(snapshot.generation_at(&se1, GenType::Hydro, 0), 160.0);
    assert_eq!(snapshot.generation_at(&se1, GenType::Nuclear, 0), 40.0);
}

#[test]
fn rescale_can_be_disabled() {
    let mut src = MemorySource::default();
    gen(&mut src, "20180101:00", "SE1", "Hydro", 80.0);
    market(&mut src, "20180101:01", MarketTable::Production, "SE1", 200.0);
    market(&mut src, "20180101:01", MarketTable::Consumption, "SE1", 150.0);
    market(&mut src, "20180101:01", MarketTable::Exchange, "SE1-SE2", 0.0);
    let cfg = ReconcileConfig {
        rescale_to_market: false,
        ..config(&["SE1"])
    };
    let range = HourRange::parse("20180101:01", None).unwrap();
    let snapshot = Reconciler::new(&src, &src, cfg).reconcile(&range).unwrap();
    assert_eq!(snapshot.generation_at(&Zone::new("SE1"), GenType::Hydro, 0), 80.0);
}

#[test]
fn upstream_categories_collapse_into_primary_types() {
    let mut src = base_source();
    gen(&mut src, "20180101:00", "SE1", "Gas", 5.0);
    gen(&mut src, "20180101:00", "SE1", "Oil", 5.0);
    gen(&mut src, "20180101:00", "SE1", "Wind onsh", 10.0);
    gen(&mut src, "20180101:00", "SE1", "Tidal", 99.0);
    let cfg = ReconcileConfig {
        rescale_to_market: false,
        ..config(&["SE1"])
    };
    let range = HourRange::parse("20180101:01", None).unwrap();
    let snapshot = Reconciler::new(&src, &src, cfg).reconcile(&range).unwrap();
    let se1 = Zone::new("SE1");
    assert_eq!(snapshot.generation_at(&se1, GenType::Thermal, 0), 10.0);
    assert_eq!(snapshot.generation_at(&se1, GenType::Wind, 0), 10.0);
    assert_eq!(snapshot.diagnostics.count_category(category::SOURCE), 1);
}

#[test]
fn short_generation_gap_is_interpolated() {
    let mut src = MemorySource::default();
    for (hour, value) in [("20180101:00", 100.0), ("20180101:03", 130.0)] {
        gen(&mut src, hour, "SE1", "Hydro", value);
    }
    for hour in ["20180101:01", "20180101:02", "20180101:03", "20180101:04"] {
        market(&mut src, hour, MarketTable::Consumption, "SE1", 50.0);
        market(&mut src, hour, MarketTable::Exchange, "SE1-SE2", 0.0);
    }
    let cfg = ReconcileConfig {
        rescale_to_market: false,
        ..config(&["SE1"])
    };
    let range = HourRange::parse("20180101:01", Some("20180101:04")).unwrap();
    let snapshot = Reconciler::new(&src, &src, cfg).reconcile(&range).unwrap();
    let hydro: Vec<f64> = (0..4)
        .map(|row| snapshot.generation_at(&Zone::new("SE1"), GenType::Hydro, row))
        .collect();
    assert_eq!(hydro, vec![100.0, 110.0, 120.0, 130.0]);
}

#[test]
fn exchange_is_canonicalised_and_filtered() {
    let mut src = base_source();
    let hour = "20180101:01";
    // alias, reported in reverse order relative to the canonical boundary
    market(&mut src, hour, MarketTable::Exchange, "NO - DK", 300.0);
    // both sides bare countries
    market(&mut src, hour, MarketTable::Exchange, "SE-NO", 50.0);
    // neither side modelled
    market(&mut src, hour, MarketTable::Exchange, "DE-PL", 70.0);
    market(&mut src, hour, MarketTable::Exchange, "SE2-SE1", 999.0);

    let snapshot = Reconciler::new(&src, &src, config(&["SE1", "NO2"]))
        .reconcile(&window())
        .unwrap();
    let (dk_no, _) = Boundary::parse("DK1-NO2").unwrap();
    let (se, _) = Boundary::parse("SE1-SE2").unwrap();
    assert_eq!(snapshot.exchange_at(&dk_no, 0), -300.0);
    // trailing hour carried forward
    assert_eq!(snapshot.exchange_at(&dk_no, 1), -300.0);
    assert_eq!(snapshot.exchange_at(&se, 0), 10.0);
    let corridors: Vec<String> = snapshot.corridors().map(|b| b.to_string()).collect();
    assert_eq!(corridors, vec!["DK1-NO2", "SE1-SE2"]);
    assert_eq!(snapshot.diagnostics.count_category(category::SOURCE), 1);
}

#[test]
fn missing_zone_is_nan_and_reported() {
    let src = base_source();
    let snapshot = Reconciler::new(&src, &src, config(&["SE1", "FI"]))
        .reconcile(&window())
        .unwrap();
    let fi = Zone::new("FI");
    assert!(snapshot.generation_at(&fi, GenType::Hydro, 0).is_nan());
    assert!(snapshot.load_at(&fi, 0).is_nan());
    assert!(snapshot.diagnostics.count_category(category::DATA_GAP) >= 2);
}

#[test]
fn empty_window_is_no_data() {
    let src = base_source();
    let range = HourRange::parse("20190101:00", Some("20190101:03")).unwrap();
    let err = Reconciler::new(&src, &src, config(&["SE1"]))
        .reconcile(&range)
        .unwrap_err();
    assert!(matches!(err, FlowcalError::NoData { .. }));
    assert!(err.to_string().contains("20190101:00"));
}

/// SE1 over five hours with flat generation, consumption and exchange.
fn five_hour_source(consumption: [f64; 5], exchange: [f64; 5]) -> MemorySource {
    let mut src = MemorySource::default();
    let hours = ["20180101:00", "20180101:01", "20180101:02", "20180101:03", "20180101:04"];
    for (row, hour) in hours.iter().enumerate() {
        gen(&mut src, hour, "SE1", "Hydro", 100.0);
        if !consumption[row].is_nan() {
            market(&mut src, hour, MarketTable::Consumption, "SE1", consumption[row]);
        }
        if !exchange[row].is_nan() {
            market(&mut src, hour, MarketTable::Exchange, "SE1-SE2", exchange[row]);
        }
    }
    src
}

fn five_hours() -> HourRange {
    HourRange::parse("20180101:00", Some("20180101:04")).unwrap()
}

fn unshifted(zones: &[&str]) -> ReconcileConfig {
    ReconcileConfig {
        rescale_to_market: false,
        generation_shift_hours: 0,
        ..config(zones)
    }
}

#[test]
fn short_market_gaps_are_interpolated() {
    let nan = f64::NAN;
    let src = five_hour_source(
        [50.0, nan, 70.0, 80.0, 90.0],
        [10.0, 20.0, nan, nan, 50.0],
    );
    let snapshot = Reconciler::new(&src, &src, unshifted(&["SE1"]))
        .reconcile(&five_hours())
        .unwrap();
    let se1 = Zone::new("SE1");
    let (se, _) = Boundary::parse("SE1-SE2").unwrap();
    let load: Vec<f64> = (0..5).map(|row| snapshot.load_at(&se1, row)).collect();
    let exchange: Vec<f64> = (0..5).map(|row| snapshot.exchange_at(&se, row)).collect();
    let close = |got: &[f64], want: &[f64]| {
        got.iter().zip(want).all(|(g, w)| (g - w).abs() < 1e-9)
    };
    assert!(close(&load, &[50.0, 60.0, 70.0, 80.0, 90.0]), "{load:?}");
    assert!(close(&exchange, &[10.0, 20.0, 30.0, 40.0, 50.0]), "{exchange:?}");
    assert_eq!(snapshot.diagnostics.count_category(category::DATA_GAP), 0);
}

#[test]
fn market_gaps_past_the_limit_stay_missing() {
    let nan = f64::NAN;
    let src = five_hour_source(
        [50.0, nan, nan, nan, 90.0],
        [10.0, 20.0, 30.0, 40.0, 50.0],
    );
    let cfg = ReconcileConfig {
        interpolation_limit: 2,
        ..unshifted(&["SE1"])
    };
    let snapshot = Reconciler::new(&src, &src, cfg)
        .reconcile(&five_hours())
        .unwrap();
    let se1 = Zone::new("SE1");
    assert!((1..4).all(|row| snapshot.load_at(&se1, row).is_nan()));
    assert_eq!(snapshot.load_at(&se1, 4), 90.0);
    assert_eq!(snapshot.diagnostics.count_category(category::DATA_GAP), 1);
    let issue = &snapshot.diagnostics.issues[0];
    assert_eq!(issue.entity.as_deref(), Some("SE1/load"));
    assert!(issue.message.starts_with("3 missing hours"));
}

#[test]
fn inverted_exchange_feeds_are_flipped_on_import() {
    let src = base_source();
    let cfg = ReconcileConfig {
        invert_exchange_sign: true,
        ..config(&["SE1"])
    };
    let snapshot = Reconciler::new(&src, &src, cfg).reconcile(&window()).unwrap();
    let (se, _) = Boundary::parse("SE1-SE2").unwrap();
    // published as SE1-SE2 +10, read as 10 MW from SE2 into SE1
    assert_eq!(snapshot.exchange_at(&se, 0), -10.0);
    assert_eq!(snapshot.exchange_at(&se, 1), -10.0);
}
