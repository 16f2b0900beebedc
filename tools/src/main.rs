//! sim-runner: headless runner for a loyalty scheme simulation.
//!
//! Usage:
//!   sim-runner --preset direct_points --seed 12345
//!   sim-runner --scheme data/schemes/full_funnel.json --customers 5000 --json run.json

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use perks_core::{engine::SimulationResult, SchemeConfig, SimEngine};
use serde::Serialize;
use std::env;
use std::fs;

/// What `--json` writes: the rounded result plus run metadata.
#[derive(Serialize)]
struct RunReport<'a> {
    run_id: String,
    started_at: DateTime<Utc>,
    version: &'static str,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let preset = flag_value(&args, "--preset").unwrap_or("flat");
    let scheme_path = flag_value(&args, "--scheme");
    let seed = parse_opt_arg::<u64>(&args, "--seed")?;
    let customers = parse_opt_arg::<u64>(&args, "--customers")?;
    let json_out = flag_value(&args, "--json");

    let mut config = match scheme_path {
        Some(path) => SchemeConfig::load(path)?,
        None => SchemeConfig::preset(preset).ok_or_else(|| {
            anyhow!(
                "unknown preset '{preset}', expected one of: {}",
                SchemeConfig::PRESET_NAMES.join(", ")
            )
        })?,
    };
    if let Some(n) = customers {
        config = config.with_customers(n);
    }

    let engine = SimEngine::new(config, seed)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let started_at = Utc::now();

    println!("Loyalty scheme simulator - sim-runner");
    println!("  run_id:    {run_id}");
    println!("  started:   {}", started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  scheme:    {}", engine.config().name);
    println!("  source:    {}", scheme_path.unwrap_or("built-in preset"));
    println!("  customers: {}", engine.config().customers());
    match seed {
        Some(seed) => println!("  seed:      {seed}"),
        None => println!("  seed:      {} (fresh)", engine.seed()),
    }
    println!();

    let result = engine.run()?.rounded();
    log::info!("run {run_id} finished with seed {}", engine.seed());

    print_summary(&result);

    if let Some(path) = json_out {
        let report = RunReport {
            run_id,
            started_at,
            version: env!("CARGO_PKG_VERSION"),
            result: &result,
        };
        fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!();
        println!("  wrote {path}");
    }

    Ok(())
}

fn print_summary(result: &SimulationResult) {
    let s = &result.summary;

    println!("=== RUN SUMMARY ===");
    println!("  seed:            {}", result.seed);
    if let Some(funnel) = &result.funnel {
        println!(
            "  app users:       {} ({} {}, {} {})",
            funnel.total_users,
            funnel.direct_users,
            funnel.direct_channel,
            funnel.partner_users,
            funnel.partner_channel
        );
    }
    println!("  customers:       {}", s.customers);
    println!("  purchases:       {}", s.total_purchases);
    println!("  spend:           £{:.2}", s.total_spend);
    println!("  revenue:         £{:.2}", s.total_revenue);
    println!("  profit:          £{:.2}", s.total_profit);
    println!("  referrals:       {}", s.total_referrals);
    println!("  cost/acq:        {}", s.cost_per_acquisition);
    println!("  partner cost/acq: {}", s.partner_cost_per_acquisition);
    println!("  giveaway % rev:  {}", s.giveaway_pct_of_revenue);

    println!();
    println!("=== POINTS ===");
    println!("  issued:          {:.2} (worth £{:.2})", s.total_points, s.total_points_value);
    println!("  claimed:         {:.2} (worth £{:.2})", s.total_claimed_points, s.total_claimed_value);
    if s.total_bonus_wheel_spins > 0 {
        println!(
            "  wheel spins:     {} (cost £{:.2})",
            s.total_bonus_wheel_spins, s.total_bonus_wheel_value
        );
    }
    for share in &s.points_by_source {
        println!(
            "  {:<16} {:>14.2} pts | £{:>12.2} | {}%",
            share.source.label(),
            share.points,
            share.value,
            share.share_pct
        );
    }

    println!();
    println!("=== LOSS-MAKING CUSTOMERS ===");
    match &s.loss_segment.individual_profit {
        None => println!("  (none)"),
        Some(stats) => {
            println!("  count:           {}", s.loss_segment.customers);
            println!("  profit median:   £{:.2}", stats.median);
            println!("  profit min:      £{:.2}", stats.min);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_opt_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        None => Ok(None),
        Some(raw) => match raw.parse() {
            Ok(value) => Ok(Some(value)),
            Err(_) => bail!("invalid value for {flag}: '{raw}'"),
        },
    }
}
