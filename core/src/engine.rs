//! The simulation engine — one run of a loyalty scheme over a population.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Validate the scheme          (fails before any sampling)
//!   2. Sample the population        (sampler, all draws up front)
//!   3. Per customer: points rules, then economics
//!   4. Reduce the table into the summary
//!
//! RULES:
//!   - A run owns no state beyond its seed; the config is never mutated.
//!   - All randomness flows through the RngBank.
//!   - Customer transforms are independent of each other.

use crate::{
    config::{FunnelReport, SchemeConfig},
    economics::{compute_customer_record, reduce, CustomerRecord, SimulationSummary},
    error::SimResult,
    points::compute_points,
    rng::{fresh_seed, RngBank},
    sampler::sample_population,
};
use serde::{Deserialize, Serialize};

/// Everything a presentation layer needs from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scheme: String,
    /// The seed actually used; replaying it reproduces the run.
    pub seed: u64,
    pub funnel: Option<FunnelReport>,
    pub points_to_value_ratio: f64,
    /// One row per customer, in id order.
    pub records: Vec<CustomerRecord>,
    pub summary: SimulationSummary,
}

impl SimulationResult {
    /// Copy rounded to 2 dp for display. The summary is reduced from the
    /// rounded rows so table and totals agree.
    pub fn rounded(&self) -> Self {
        let records: Vec<CustomerRecord> =
            self.records.iter().map(CustomerRecord::rounded).collect();
        let summary = reduce(&records, self.points_to_value_ratio).rounded();
        Self {
            scheme: self.scheme.clone(),
            seed: self.seed,
            funnel: self.funnel.clone(),
            points_to_value_ratio: self.points_to_value_ratio,
            records,
            summary,
        }
    }

    pub fn loss_making(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.records.iter().filter(|r| r.is_loss_making())
    }
}

pub struct SimEngine {
    config: SchemeConfig,
    seed: u64,
    rng_bank: RngBank,
}

impl SimEngine {
    /// Validate `config` and fix the seed. Without a seed, a fresh one is
    /// drawn and logged so the run can be replayed.
    pub fn new(config: SchemeConfig, seed: Option<u64>) -> SimResult<Self> {
        config.validate()?;
        let seed = match seed {
            Some(seed) => seed,
            None => {
                let seed = fresh_seed();
                log::info!("scheme={} engine: no seed given, using {seed}", config.name);
                seed
            }
        };
        Ok(Self {
            config,
            seed,
            rng_bank: RngBank::new(seed),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SchemeConfig {
        &self.config
    }

    pub fn run(&self) -> SimResult<SimulationResult> {
        let config = &self.config;
        let customers = config.customers() as usize;
        let funnel = config.funnel().map(|f| f.report());

        if let Some(report) = &funnel {
            if report.partner_users == 0 {
                log::warn!(
                    "scheme={} engine: partner channel '{}' converts no users",
                    config.name,
                    report.partner_channel
                );
            }
        }

        let draws = sample_population(config, customers, &self.rng_bank)?;

        let records = draws
            .behaviors()
            .map(|behavior| -> SimResult<CustomerRecord> {
                let breakdown = compute_points(&behavior, config)?;
                Ok(compute_customer_record(&behavior, &breakdown, config))
            })
            .collect::<SimResult<Vec<_>>>()?;

        let summary = reduce(&records, config.points_to_value_ratio);

        log::info!(
            "scheme={} seed={} engine: {} customers, revenue {:.2}, profit {:.2}, {} loss-making",
            config.name,
            self.seed,
            summary.customers,
            summary.total_revenue,
            summary.total_profit,
            summary.loss_segment.customers
        );

        Ok(SimulationResult {
            scheme: config.name.clone(),
            seed: self.seed,
            funnel,
            points_to_value_ratio: config.points_to_value_ratio,
            records,
            summary,
        })
    }
}

/// Validate, sample, score and reduce in one call.
pub fn run(config: &SchemeConfig, seed: Option<u64>) -> SimResult<SimulationResult> {
    SimEngine::new(config.clone(), seed)?.run()
}
