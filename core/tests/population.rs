//! Table shape and table/summary consistency.

use perks_core::{run, CustomerRecord, SchemeConfig, SimulationResult};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn column(result: &SimulationResult, f: fn(&CustomerRecord) -> f64) -> f64 {
    result.records.iter().map(f).sum()
}

fn assert_close(label: &str, column_sum: f64, total: f64) {
    assert!(
        (column_sum - total).abs() < 0.01,
        "{label}: column sum {column_sum:.4} != summary total {total:.4}"
    );
}

#[test]
fn table_has_one_row_per_customer_in_id_order() {
    init_logging();
    for name in SchemeConfig::PRESET_NAMES {
        let config = SchemeConfig::preset(name).unwrap().with_customers(137);
        let result = run(&config, Some(1)).unwrap();

        assert_eq!(result.records.len(), 137, "{name}");
        assert_eq!(result.summary.customers, 137, "{name}");
        for (i, r) in result.records.iter().enumerate() {
            assert_eq!(r.customer_id, i as u64 + 1, "{name}: ids must be 1-indexed and ordered");
        }
    }
}

#[test]
fn single_customer_population_runs() {
    let config = SchemeConfig::full_funnel().with_customers(1);
    let result = run(&config, Some(3)).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.funnel.as_ref().map(|f| f.customers), Some(1));
}

#[test]
fn resized_funnel_still_pays_the_partner_cut() {
    let config = SchemeConfig::full_funnel().with_customers(2_000);
    let result = run(&config, Some(40)).unwrap();
    assert_eq!(result.records.len(), 2_000);

    // p = 4000 / 39000 ≈ 0.10, so roughly 200 partner customers.
    let partner = result.summary.partner_customers;
    assert!((120..=290).contains(&partner), "{partner} partner customers");
    for r in &result.records {
        let expected = if r.partner_attributed { r.revenue * 0.25 } else { 0.0 };
        assert_eq!(r.channel_cut, expected);
    }
    assert!(result.summary.total_channel_cut > 0.0);
}

#[test]
fn summary_totals_match_column_sums() {
    init_logging();
    let config = SchemeConfig::default_test();
    let result = run(&config, Some(0xFEED_BEEF)).unwrap();
    let s = &result.summary;

    assert_close("spend", column(&result, |r| r.total_spend), s.total_spend);
    assert_close("revenue", column(&result, |r| r.revenue), s.total_revenue);
    assert_close("profit", column(&result, |r| r.individual_profit), s.total_profit);
    assert_close("points", column(&result, |r| r.total_points), s.total_points);
    assert_close("claimed", column(&result, |r| r.claimed_points), s.total_claimed_points);
    assert_close(
        "claimed value",
        column(&result, |r| r.claimed_points_value),
        s.total_claimed_value,
    );
    assert_close("wheel", column(&result, |r| r.bonus_wheel_value), s.total_bonus_wheel_value);
    assert_close("channel cut", column(&result, |r| r.channel_cut), s.total_channel_cut);
    assert_close("referrals", column(&result, |r| r.referrals as f64), s.total_referrals as f64);
    assert_close("purchases", column(&result, |r| r.purchases as f64), s.total_purchases as f64);
}

#[test]
fn rounded_table_sums_to_rounded_summary() {
    init_logging();
    let rounded = run(&SchemeConfig::full_funnel(), Some(0xC0FFEE)).unwrap().rounded();
    let s = &rounded.summary;

    assert_close("spend", column(&rounded, |r| r.total_spend), s.total_spend);
    assert_close("revenue", column(&rounded, |r| r.revenue), s.total_revenue);
    assert_close("profit", column(&rounded, |r| r.individual_profit), s.total_profit);
    assert_close("points", column(&rounded, |r| r.total_points), s.total_points);
    assert_close(
        "claimed value",
        column(&rounded, |r| r.claimed_points_value),
        s.total_claimed_value,
    );
    assert_close("wheel", column(&rounded, |r| r.bonus_wheel_value), s.total_bonus_wheel_value);
    assert_close("channel cut", column(&rounded, |r| r.channel_cut), s.total_channel_cut);

    for r in &rounded.records {
        assert_eq!(r.revenue, (r.revenue * 100.0).round() / 100.0);
    }
}

#[test]
fn funnel_sizes_population_and_attributes_partner_customers() {
    init_logging();
    let config = SchemeConfig::default_test();
    assert_eq!(config.customers(), 225);

    let result = run(&config, Some(17)).unwrap();
    let funnel = result.funnel.as_ref().expect("funnel report");
    assert_eq!(funnel.direct_users, 350);
    assert_eq!(funnel.partner_users, 400);
    assert_eq!(funnel.customers, 225);
    assert_eq!(result.records.len(), 225);

    // p = 400 / 750 ≈ 0.53, so roughly 120 partner customers.
    let partner = result.summary.partner_customers;
    assert!((85..=155).contains(&partner), "{partner} partner customers");
}

#[test]
fn fixed_population_has_no_partner_cut() {
    let config = SchemeConfig::direct_points().with_customers(300);
    let result = run(&config, Some(5)).unwrap();

    assert!(result.records.iter().all(|r| !r.partner_attributed && r.channel_cut == 0.0));
    assert_eq!(result.summary.partner_customers, 0);
    assert!(result.summary.partner_cost_per_acquisition.is_undefined());
}
