//! Economics aggregator — per-customer P&L and the population summary.
//!
//! Per customer:
//!   revenue            = spend × profit margin
//!   claimed value      = claimed points × points-to-value ratio
//!   channel cut        = revenue × partner share, partner customers only
//!   individual profit  = revenue − claimed value − channel cut − wheel value
//!
//! RULE: A ratio with a zero denominator is `Ratio::Undefined`.
//! Nothing here returns NaN or infinity.

use crate::{
    config::SchemeConfig,
    points::PointsBreakdown,
    sampler::CustomerBehavior,
    stats::{describe, DescriptiveStats},
    types::{round2, CustomerId, Money, Points},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quotient that may have no value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Ratio {
    Defined(f64),
    /// The denominator was zero.
    Undefined,
}

impl Ratio {
    pub fn of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            Self::Undefined
        } else {
            Self::Defined(numerator / denominator)
        }
    }

    /// `numerator / denominator` as a percentage.
    pub fn percent(numerator: f64, denominator: f64) -> Self {
        Self::of(numerator, denominator).map(|v| v * 100.0)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Defined(v) => Self::Defined(f(v)),
            Self::Undefined => Self::Undefined,
        }
    }

    pub fn rounded(self) -> Self {
        self.map(round2)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{v:.2}"),
            Self::Undefined => write!(f, "undefined"),
        }
    }
}

// ── Per-customer record ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: CustomerId,
    pub purchases: u32,
    pub partner_attributed: bool,
    pub total_spend: Money,
    pub purchase_points: Points,
    pub milestone_points: Points,
    pub referrals: u32,
    pub referral_points: Points,
    pub requests: u32,
    pub request_points: Points,
    pub upvotes: u64,
    pub upvote_points: Points,
    pub bonus_wheel_spins: u64,
    pub bonus_wheel_value: Money,
    pub total_points: Points,
    pub claimed_points: Points,
    pub claimed_points_value: Money,
    pub revenue: Money,
    pub channel_cut: Money,
    pub individual_profit: Money,
}

impl CustomerRecord {
    /// Copy with currency and point fields rounded to 2 dp.
    pub fn rounded(&self) -> Self {
        Self {
            total_spend: round2(self.total_spend),
            purchase_points: round2(self.purchase_points),
            milestone_points: round2(self.milestone_points),
            referral_points: round2(self.referral_points),
            request_points: round2(self.request_points),
            upvote_points: round2(self.upvote_points),
            bonus_wheel_value: round2(self.bonus_wheel_value),
            total_points: round2(self.total_points),
            claimed_points: round2(self.claimed_points),
            claimed_points_value: round2(self.claimed_points_value),
            revenue: round2(self.revenue),
            channel_cut: round2(self.channel_cut),
            individual_profit: round2(self.individual_profit),
            ..self.clone()
        }
    }

    pub fn is_loss_making(&self) -> bool {
        self.individual_profit < 0.0
    }
}

pub fn compute_customer_record(
    behavior: &CustomerBehavior<'_>,
    breakdown: &PointsBreakdown,
    config: &SchemeConfig,
) -> CustomerRecord {
    let total_spend = behavior.spend();
    let revenue = total_spend * config.profit_margin;
    let claimed_points_value = breakdown.claimed_points * config.points_to_value_ratio;
    let channel_cut = if behavior.partner_attributed {
        revenue * config.partner_revenue_share()
    } else {
        0.0
    };
    let individual_profit =
        revenue - claimed_points_value - channel_cut - breakdown.bonus_wheel_value;

    CustomerRecord {
        customer_id: behavior.customer_id,
        purchases: behavior.purchase_count,
        partner_attributed: behavior.partner_attributed,
        total_spend,
        purchase_points: breakdown.purchase_points,
        milestone_points: breakdown.milestone_points,
        referrals: breakdown.referrals_credited,
        referral_points: breakdown.referral_points,
        requests: behavior.request_count,
        request_points: breakdown.request_points,
        upvotes: breakdown.upvotes,
        upvote_points: breakdown.upvote_points,
        bonus_wheel_spins: breakdown.bonus_wheel_spins,
        bonus_wheel_value: breakdown.bonus_wheel_value,
        total_points: breakdown.total_points,
        claimed_points: breakdown.claimed_points,
        claimed_points_value,
        revenue,
        channel_cut,
        individual_profit,
    }
}

// ── Summary ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsSource {
    Purchases,
    Milestones,
    Referrals,
    Requests,
    Upvotes,
}

impl PointsSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Purchases => "Purchases",
            Self::Milestones => "Milestones",
            Self::Referrals => "Referrals",
            Self::Requests => "Requests",
            Self::Upvotes => "Upvotes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsSourceShare {
    pub source: PointsSource,
    pub points: Points,
    pub value: Money,
    /// Percentage of all points issued.
    pub share_pct: Ratio,
}

/// Customers the scheme loses money on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSegment {
    pub customers: usize,
    pub individual_profit: Option<DescriptiveStats>,
    pub total_spend: Option<DescriptiveStats>,
    pub total_points: Option<DescriptiveStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub average_purchases: Ratio,
    pub average_order_value: Ratio,
    pub zero_referral_pct: Ratio,
    pub zero_request_pct: Ratio,
    pub zero_upvote_pct: Ratio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub customers: usize,
    pub total_purchases: u64,
    pub total_spend: Money,
    pub total_revenue: Money,
    pub total_profit: Money,
    pub total_points: Points,
    pub total_points_value: Money,
    pub total_claimed_points: Points,
    pub total_claimed_value: Money,
    pub total_bonus_wheel_spins: u64,
    pub total_bonus_wheel_value: Money,
    pub total_referrals: u64,
    pub total_channel_cut: Money,
    pub partner_customers: u64,
    /// (claimed value + wheel value) per credited referral.
    pub cost_per_acquisition: Ratio,
    /// Channel cut per partner-attributed customer.
    pub partner_cost_per_acquisition: Ratio,
    /// Claimed value as a percentage of revenue.
    pub giveaway_pct_of_revenue: Ratio,
    /// Sorted by points, largest first.
    pub points_by_source: Vec<PointsSourceShare>,
    pub individual_profit: Option<DescriptiveStats>,
    pub loss_segment: LossSegment,
    pub behavior: BehaviorProfile,
}

impl SimulationSummary {
    /// Copy with currency and point totals rounded to 2 dp.
    pub fn rounded(&self) -> Self {
        let round_stats = |s: &Option<DescriptiveStats>| s.as_ref().map(DescriptiveStats::rounded);
        Self {
            customers: self.customers,
            total_purchases: self.total_purchases,
            total_spend: round2(self.total_spend),
            total_revenue: round2(self.total_revenue),
            total_profit: round2(self.total_profit),
            total_points: round2(self.total_points),
            total_points_value: round2(self.total_points_value),
            total_claimed_points: round2(self.total_claimed_points),
            total_claimed_value: round2(self.total_claimed_value),
            total_bonus_wheel_spins: self.total_bonus_wheel_spins,
            total_bonus_wheel_value: round2(self.total_bonus_wheel_value),
            total_referrals: self.total_referrals,
            total_channel_cut: round2(self.total_channel_cut),
            partner_customers: self.partner_customers,
            cost_per_acquisition: self.cost_per_acquisition.rounded(),
            partner_cost_per_acquisition: self.partner_cost_per_acquisition.rounded(),
            giveaway_pct_of_revenue: self.giveaway_pct_of_revenue.rounded(),
            points_by_source: self
                .points_by_source
                .iter()
                .map(|s| PointsSourceShare {
                    source: s.source,
                    points: round2(s.points),
                    value: round2(s.value),
                    share_pct: s.share_pct.rounded(),
                })
                .collect(),
            individual_profit: round_stats(&self.individual_profit),
            loss_segment: LossSegment {
                customers: self.loss_segment.customers,
                individual_profit: round_stats(&self.loss_segment.individual_profit),
                total_spend: round_stats(&self.loss_segment.total_spend),
                total_points: round_stats(&self.loss_segment.total_points),
            },
            behavior: BehaviorProfile {
                average_purchases: self.behavior.average_purchases.rounded(),
                average_order_value: self.behavior.average_order_value.rounded(),
                zero_referral_pct: self.behavior.zero_referral_pct.rounded(),
                zero_request_pct: self.behavior.zero_request_pct.rounded(),
                zero_upvote_pct: self.behavior.zero_upvote_pct.rounded(),
            },
        }
    }
}

/// Reduce the per-customer table into population totals.
pub fn reduce(records: &[CustomerRecord], points_to_value_ratio: f64) -> SimulationSummary {
    let sum = |f: fn(&CustomerRecord) -> f64| -> f64 { records.iter().map(f).sum() };
    let count = |f: fn(&CustomerRecord) -> bool| -> u64 { records.iter().filter(|r| f(r)).count() as u64 };

    let customers = records.len();
    let total_purchases: u64 = records.iter().map(|r| r.purchases as u64).sum();
    let total_spend = sum(|r| r.total_spend);
    let total_revenue = sum(|r| r.revenue);
    let total_profit = sum(|r| r.individual_profit);
    let total_points = sum(|r| r.total_points);
    let total_claimed_points = sum(|r| r.claimed_points);
    let total_claimed_value = sum(|r| r.claimed_points_value);
    let total_bonus_wheel_spins: u64 = records.iter().map(|r| r.bonus_wheel_spins).sum();
    let total_bonus_wheel_value = sum(|r| r.bonus_wheel_value);
    let total_referrals: u64 = records.iter().map(|r| r.referrals as u64).sum();
    let total_channel_cut = sum(|r| r.channel_cut);
    let partner_customers = count(|r| r.partner_attributed);

    // ── Derived ratios ─────────────────────────────────────────────

    let cost_per_acquisition = Ratio::of(
        total_claimed_value + total_bonus_wheel_value,
        total_referrals as f64,
    );
    let partner_cost_per_acquisition = Ratio::of(total_channel_cut, partner_customers as f64);
    let giveaway_pct_of_revenue = Ratio::percent(total_claimed_value, total_revenue);

    // ── Points by source ───────────────────────────────────────────

    let mut points_by_source: Vec<PointsSourceShare> = [
        (PointsSource::Purchases, sum(|r| r.purchase_points)),
        (PointsSource::Milestones, sum(|r| r.milestone_points)),
        (PointsSource::Referrals, sum(|r| r.referral_points)),
        (PointsSource::Requests, sum(|r| r.request_points)),
        (PointsSource::Upvotes, sum(|r| r.upvote_points)),
    ]
    .into_iter()
    .map(|(source, points)| PointsSourceShare {
        source,
        points,
        value: points * points_to_value_ratio,
        share_pct: Ratio::percent(points, total_points),
    })
    .collect();
    points_by_source.sort_by(|a, b| b.points.total_cmp(&a.points));

    // ── Profit distribution ────────────────────────────────────────

    let profits: Vec<f64> = records.iter().map(|r| r.individual_profit).collect();
    let losers: Vec<&CustomerRecord> = records.iter().filter(|r| r.is_loss_making()).collect();
    let loser_column = |f: fn(&CustomerRecord) -> f64| -> Option<DescriptiveStats> {
        describe(&losers.iter().map(|r| f(r)).collect::<Vec<_>>())
    };
    let loss_segment = LossSegment {
        customers: losers.len(),
        individual_profit: loser_column(|r| r.individual_profit),
        total_spend: loser_column(|r| r.total_spend),
        total_points: loser_column(|r| r.total_points),
    };

    let n = customers as f64;
    let behavior = BehaviorProfile {
        average_purchases: Ratio::of(total_purchases as f64, n),
        average_order_value: Ratio::of(total_spend, total_purchases as f64),
        zero_referral_pct: Ratio::percent(count(|r| r.referrals == 0) as f64, n),
        zero_request_pct: Ratio::percent(count(|r| r.requests == 0) as f64, n),
        zero_upvote_pct: Ratio::percent(count(|r| r.upvotes == 0) as f64, n),
    };

    SimulationSummary {
        customers,
        total_purchases,
        total_spend,
        total_revenue,
        total_profit,
        total_points,
        total_points_value: total_points * points_to_value_ratio,
        total_claimed_points,
        total_claimed_value,
        total_bonus_wheel_spins,
        total_bonus_wheel_value,
        total_referrals,
        total_channel_cut,
        partner_customers,
        cost_per_acquisition,
        partner_cost_per_acquisition,
        giveaway_pct_of_revenue,
        points_by_source,
        individual_profit: describe(&profits),
        loss_segment,
        behavior,
    }
}
