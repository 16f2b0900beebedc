//! Distribution sampler — every random draw of a run, made up front.
//!
//! RULE: The sampler is the only place that touches an RNG.
//! Each behaviour family draws from its own SamplerSlot stream, for the
//! whole population in one batch. Ragged per-event draws (order values,
//! upvotes) live in flat arrays; an OffsetTable maps each customer to
//! their slice.
//!
//! Every value leaving the sampler is non-negative. The rules engine
//! treats anything else as a sampler defect.

use crate::{
    config::{EventConfig, PurchaseConfig, PurchaseModel, ReferralConfig, SchemeConfig},
    error::{SimError, SimResult},
    rng::{RngBank, SamplerRng, SamplerSlot},
    types::{CustomerId, Money},
};
use rand_distr::{Distribution, Gamma, InverseGaussian, LogNormal, Normal, Poisson};
use std::ops::Range;

/// Running offsets into a flat draw array, one slice per customer.
///
/// `offsets[i]..offsets[i + 1]` is customer `i`'s slice, so the table
/// always holds `customers + 1` entries starting at 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    offsets: Vec<usize>,
}

impl OffsetTable {
    pub fn from_counts(counts: &[u32]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut running = 0usize;
        offsets.push(running);
        for &count in counts {
            running += count as usize;
            offsets.push(running);
        }
        Self { offsets }
    }

    /// Number of customers covered.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total draws across all customers.
    pub fn total(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn range(&self, index: usize) -> Range<usize> {
        self.offsets[index]..self.offsets[index + 1]
    }
}

/// One customer's raw behaviour, borrowed from the population draws.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomerBehavior<'a> {
    pub customer_id: CustomerId,
    pub purchase_count: u32,
    pub order_values: &'a [Money],
    pub referrals: u32,
    pub request_count: u32,
    /// Upvotes received, one entry per request.
    pub upvotes: &'a [u32],
    pub partner_attributed: bool,
}

impl CustomerBehavior<'_> {
    pub fn spend(&self) -> Money {
        self.order_values.iter().sum()
    }

    pub fn total_upvotes(&self) -> u64 {
        self.upvotes.iter().map(|&u| u as u64).sum()
    }
}

/// All population-level draws for one run.
#[derive(Debug, Clone)]
pub struct PopulationDraws {
    pub purchase_counts: Vec<u32>,
    pub order_values: Vec<Money>,
    pub order_offsets: OffsetTable,
    pub referrals: Vec<u32>,
    pub request_counts: Vec<u32>,
    pub upvotes: Vec<u32>,
    pub upvote_offsets: OffsetTable,
    pub partner_attributed: Vec<bool>,
}

impl PopulationDraws {
    pub fn len(&self) -> usize {
        self.purchase_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.purchase_counts.is_empty()
    }

    /// Behaviour of the customer at `index` (0-based); ids are 1-based.
    pub fn behavior(&self, index: usize) -> CustomerBehavior<'_> {
        CustomerBehavior {
            customer_id: index as CustomerId + 1,
            purchase_count: self.purchase_counts[index],
            order_values: &self.order_values[self.order_offsets.range(index)],
            referrals: self.referrals[index],
            request_count: self.request_counts[index],
            upvotes: &self.upvotes[self.upvote_offsets.range(index)],
            partner_attributed: self.partner_attributed[index],
        }
    }

    pub fn behaviors(&self) -> impl Iterator<Item = CustomerBehavior<'_>> {
        (0..self.len()).map(move |i| self.behavior(i))
    }
}

/// Draw every behaviour for `customers` customers.
pub fn sample_population(
    config: &SchemeConfig,
    customers: usize,
    rng_bank: &RngBank,
) -> SimResult<PopulationDraws> {
    let mut rng = rng_bank.for_slot(SamplerSlot::PurchaseCount);
    let purchase_counts = draw_purchase_counts(&config.purchases, customers, &mut rng)?;
    let order_offsets = OffsetTable::from_counts(&purchase_counts);

    let mut rng = rng_bank.for_slot(SamplerSlot::OrderValue);
    let order_values = draw_order_values(&config.purchases, order_offsets.total(), &mut rng)?;

    let mut rng = rng_bank.for_slot(SamplerSlot::Referral);
    let referrals = draw_referrals(&config.referrals, customers, &mut rng)?;

    let (request_counts, upvotes) = match &config.engagement {
        Some(engagement) => {
            let mut rng = rng_bank.for_slot(SamplerSlot::RequestCount);
            let mut mask = rng_bank.for_slot(SamplerSlot::RequestMask);
            let requests =
                draw_masked_counts(&engagement.requests, customers, 0, &mut rng, &mut mask)?;

            let total_requests = requests.iter().map(|&r| r as usize).sum();
            let mut rng = rng_bank.for_slot(SamplerSlot::Upvote);
            let mut mask = rng_bank.for_slot(SamplerSlot::UpvoteMask);
            let upvotes =
                draw_masked_counts(&engagement.upvotes, total_requests, 1, &mut rng, &mut mask)?;
            (requests, upvotes)
        }
        None => (vec![0; customers], Vec::new()),
    };
    let upvote_offsets = OffsetTable::from_counts(&request_counts);

    let partner_attributed = match config.funnel() {
        Some(funnel) => {
            let p = funnel.report().partner_attribution_probability;
            let mut rng = rng_bank.for_slot(SamplerSlot::ChannelAttribution);
            (0..customers).map(|_| rng.chance(p)).collect()
        }
        None => vec![false; customers],
    };

    log::debug!(
        "sampler: {customers} customers, {} orders, {} requests",
        order_offsets.total(),
        upvote_offsets.total()
    );

    Ok(PopulationDraws {
        purchase_counts,
        order_values,
        order_offsets,
        referrals,
        request_counts,
        upvotes,
        upvote_offsets,
        partner_attributed,
    })
}

/// Purchase counts per customer.
///
/// The negative binomial is a gamma–Poisson mixture sized so its mean
/// matches `mean_purchases` at any success probability.
pub fn draw_purchase_counts(
    purchases: &PurchaseConfig,
    customers: usize,
    rng: &mut SamplerRng,
) -> SimResult<Vec<u32>> {
    let mean = purchases.mean_purchases;
    match purchases.model {
        PurchaseModel::Poisson => {
            let poisson = Poisson::new(mean).map_err(|e| distribution_error("purchase count", e))?;
            Ok((0..customers)
                .map(|_| {
                    let draw: f64 = poisson.sample(rng);
                    draw as u32
                })
                .collect())
        }
        PurchaseModel::NegativeBinomial {
            success_probability: p,
        } => {
            let size = mean * p / (1.0 - p);
            let gamma = Gamma::new(size, (1.0 - p) / p)
                .map_err(|e| distribution_error("purchase rate", e))?;
            let mut counts = Vec::with_capacity(customers);
            for _ in 0..customers {
                let lambda: f64 = gamma.sample(rng);
                counts.push(poisson_count(lambda, rng)?);
            }
            Ok(counts)
        }
    }
}

fn poisson_count(lambda: f64, rng: &mut SamplerRng) -> SimResult<u32> {
    // Gamma draws can underflow to zero for small shapes.
    if lambda <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(lambda).map_err(|e| distribution_error("purchase count", e))?;
    let draw: f64 = poisson.sample(rng);
    Ok(draw as u32)
}

/// One order value per purchase, never below the configured floor.
pub fn draw_order_values(
    purchases: &PurchaseConfig,
    orders: usize,
    rng: &mut SamplerRng,
) -> SimResult<Vec<Money>> {
    let normal = Normal::new(purchases.order_value_mean, purchases.order_value_std_dev)
        .map_err(|e| distribution_error("order value", e))?;
    Ok((0..orders)
        .map(|_| normal.sample(rng).max(purchases.order_value_floor))
        .collect())
}

/// Referral counts, already clipped to `[0, max_referrals]`.
///
/// Most customers land on zero after the offset; a minority refer several.
pub fn draw_referrals(
    referrals: &ReferralConfig,
    customers: usize,
    rng: &mut SamplerRng,
) -> SimResult<Vec<u32>> {
    let shape = &referrals.distribution;
    let inverse_gaussian = InverseGaussian::new(shape.mean, shape.shape)
        .map_err(|e| distribution_error("referral", e))?;
    let cap = referrals.max_referrals as i64;
    Ok((0..customers)
        .map(|_| {
            let draw: f64 = inverse_gaussian.sample(rng);
            let shifted = (draw.round_ties_even() as i64).saturating_sub(shape.offset);
            shifted.clamp(0, cap) as u32
        })
        .collect())
}

/// Log-normal counts truncated to integers, reduced by `shift` (floored
/// at zero), then zeroed with probability `zero_fraction` per draw.
pub fn draw_masked_counts(
    event: &EventConfig,
    draws: usize,
    shift: u32,
    rng: &mut SamplerRng,
    mask: &mut SamplerRng,
) -> SimResult<Vec<u32>> {
    let log_normal = LogNormal::new(event.location, event.scale)
        .map_err(|e| distribution_error("engagement", e))?;
    let mut counts: Vec<u32> = (0..draws)
        .map(|_| {
            let draw: f64 = log_normal.sample(rng);
            (draw.floor() as u32).saturating_sub(shift)
        })
        .collect();
    for count in counts.iter_mut() {
        if mask.chance(event.zero_fraction) {
            *count = 0;
        }
    }
    Ok(counts)
}

fn distribution_error(name: &'static str, err: impl std::fmt::Display) -> SimError {
    SimError::Distribution {
        name,
        detail: err.to_string(),
    }
}
