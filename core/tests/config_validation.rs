//! Scheme validation and loading.

use perks_core::{
    config::{PopulationConfig, RedemptionPolicy},
    run, SchemeConfig, SimEngine, SimError,
};
use std::path::PathBuf;

fn scheme_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../data/schemes")
        .join(format!("{name}.json"))
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn zero_population_is_rejected_before_sampling() {
    let config = SchemeConfig::flat().with_customers(0);
    match run(&config, Some(1)) {
        Err(SimError::Config(err)) => assert!(err.has_field("population.customers")),
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn every_invalid_field_is_reported() {
    let mut config = SchemeConfig::direct_points();
    config.profit_margin = 1.5;
    config.points_to_value_ratio = -0.001;
    config.purchases.mean_purchases = 0.0;
    config.purchases.order_value_floor = 0.0;
    config.redemption = RedemptionPolicy::FractionalClaim {
        claim_fraction: 2.0,
    };
    if let Some(engagement) = &mut config.engagement {
        engagement.upvotes.zero_fraction = -0.1;
    }

    let err = config.validate().unwrap_err();
    for field in [
        "profit_margin",
        "points_to_value_ratio",
        "purchases.mean_purchases",
        "purchases.order_value_floor",
        "redemption.claim_fraction",
        "engagement.upvotes.zero_fraction",
    ] {
        assert!(err.has_field(field), "missing issue for {field}: {err}");
    }
    assert_eq!(err.issues.len(), 6);
}

#[test]
fn non_finite_rates_are_rejected() {
    let mut config = SchemeConfig::flat();
    config.profit_margin = f64::NAN;
    let err = config.validate().unwrap_err();
    assert!(err.has_field("profit_margin"));
}

#[test]
fn funnel_converting_nobody_is_rejected() {
    let mut config = SchemeConfig::full_funnel();
    if let PopulationConfig::Funnel(funnel) = &mut config.population {
        funnel.user_to_customer_rate = 0.0;
    }
    let err = SimEngine::new(config, Some(1)).err().expect("engine must not build");
    assert!(matches!(err, SimError::Config(ref e) if e.has_field("population")));
}

#[test]
fn invalid_wheel_and_tranche_are_rejected() {
    let mut config = SchemeConfig::full_funnel();
    config.redemption = RedemptionPolicy::LumpSumTranche { tranche_points: 0 };
    if let Some(wheel) = &mut config.bonus_wheel {
        wheel.points_per_spin = 0;
    }
    let err = config.validate().unwrap_err();
    assert!(err.has_field("redemption.tranche_points"));
    assert!(err.has_field("bonus_wheel.points_per_spin"));
}

#[test]
fn json_presets_load_and_match_builtins() {
    for name in SchemeConfig::PRESET_NAMES {
        let loaded = SchemeConfig::load(scheme_path(name)).expect("load preset");
        let builtin = SchemeConfig::preset(name).unwrap();

        loaded.validate().unwrap();
        assert_eq!(loaded.name, builtin.name);
        assert_eq!(loaded.customers(), builtin.customers());
        assert_eq!(loaded.milestones, builtin.milestones);
        assert_eq!(loaded.redemption, builtin.redemption);
        assert_eq!(loaded.bonus_wheel, builtin.bonus_wheel);
        assert_eq!(loaded.engagement.is_some(), builtin.engagement.is_some());
        assert!(approx(loaded.profit_margin, builtin.profit_margin));
        assert!(approx(loaded.points_to_value_ratio, builtin.points_to_value_ratio));
        assert!(approx(loaded.points_per_currency_unit, builtin.points_per_currency_unit));
        assert!(approx(loaded.purchases.mean_purchases, builtin.purchases.mean_purchases));
    }
}

#[test]
fn missing_scheme_file_is_an_io_error() {
    let err = SchemeConfig::load(scheme_path("does_not_exist")).unwrap_err();
    assert!(matches!(err, SimError::Io { ref path, .. } if path.ends_with("does_not_exist.json")));
    assert!(err.to_string().contains("Cannot read"));
}

#[test]
fn malformed_scheme_file_is_a_serialization_error() {
    let path = std::env::temp_dir().join(format!("perks-malformed-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "name": "broken", "population": "#).unwrap();

    let err = SchemeConfig::load(&path).unwrap_err();
    let _ = std::fs::remove_file(&path);
    assert!(matches!(err, SimError::Serialization { .. }), "{err}");
    assert!(err.to_string().contains("Cannot parse"));
}
