//! Scheme configuration.
//!
//! RULE: A SchemeConfig is read-only for the whole run. Every component
//! receives it explicitly; nothing reads configuration from ambient state.
//!
//! All rates are fractions in [0, 1]. The three historical scheme shapes
//! are presets over the same facets:
//!   - `flat`:          milestones + referrals only, points are pounds.
//!   - `direct_points`: points per pound, requests/upvotes, claim fraction.
//!   - `full_funnel`:   acquisition funnel, bonus wheel, tranche redemption.

use crate::{
    error::{ConfigError, ConfigIssue, SimError, SimResult},
    types::{Money, Points},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_TRANCHE_POINTS: u64 = 10_000;
pub const DEFAULT_PARTNER_REVENUE_SHARE: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeConfig {
    pub name: String,
    pub population: PopulationConfig,
    pub profit_margin: f64,
    pub points_to_value_ratio: f64,
    pub purchases: PurchaseConfig,
    pub points_per_currency_unit: f64,
    pub milestones: Vec<Milestone>,
    pub referrals: ReferralConfig,
    #[serde(default)]
    pub engagement: Option<EngagementConfig>,
    pub redemption: RedemptionPolicy,
    #[serde(default)]
    pub bonus_wheel: Option<BonusWheelConfig>,
}

// ── Population & acquisition funnel ────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationConfig {
    Fixed { customers: u64 },
    Funnel(AcquisitionFunnel),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub reach: u64,
    pub conversion_rate: f64,
}

impl ChannelConfig {
    /// App users this channel converts from its reach.
    pub fn app_users(&self) -> u64 {
        (self.reach as f64 * self.conversion_rate).round_ties_even() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionFunnel {
    /// The scheme owner's own audience.
    pub direct: ChannelConfig,
    /// The revenue-sharing partner's audience.
    pub partner: ChannelConfig,
    pub user_to_customer_rate: f64,
    #[serde(default = "default_partner_revenue_share")]
    pub partner_revenue_share: f64,
    /// Simulate this many customers instead of the funnel-sized count.
    /// Channel sizes, attribution and the revenue share still apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customers_override: Option<u64>,
}

fn default_partner_revenue_share() -> f64 {
    DEFAULT_PARTNER_REVENUE_SHARE
}

/// How the funnel sized the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub direct_channel: String,
    pub partner_channel: String,
    pub direct_users: u64,
    pub partner_users: u64,
    pub total_users: u64,
    pub customers: u64,
    /// Probability that a customer is attributed to the partner channel.
    pub partner_attribution_probability: f64,
}

impl AcquisitionFunnel {
    pub fn report(&self) -> FunnelReport {
        let direct_users = self.direct.app_users();
        let partner_users = self.partner.app_users();
        let total_users = direct_users + partner_users;
        let customers = self.customers_override.unwrap_or_else(|| {
            (total_users as f64 * self.user_to_customer_rate).round_ties_even() as u64
        });
        let partner_attribution_probability = if total_users > 0 {
            partner_users as f64 / total_users as f64
        } else {
            0.0
        };
        FunnelReport {
            direct_channel: self.direct.name.clone(),
            partner_channel: self.partner.name.clone(),
            direct_users,
            partner_users,
            total_users,
            customers,
            partner_attribution_probability,
        }
    }
}

// ── Behaviour distributions ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseModel {
    Poisson,
    /// Over-dispersed counts; the mean still equals `mean_purchases`.
    NegativeBinomial { success_probability: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseConfig {
    pub model: PurchaseModel,
    pub mean_purchases: f64,
    pub order_value_mean: Money,
    pub order_value_std_dev: Money,
    /// Every order is worth at least this much.
    pub order_value_floor: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Purchase count that unlocks the award (inclusive).
    pub orders: u32,
    pub award: u64,
}

/// Inverse-Gaussian draw, rounded, shifted down by `offset`, then clipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralDistribution {
    pub mean: f64,
    pub shape: f64,
    pub offset: i64,
}

impl Default for ReferralDistribution {
    fn default() -> Self {
        Self {
            mean: 3.0,
            shape: 2.0,
            offset: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralConfig {
    pub points_per_referral: u64,
    pub max_referrals: u32,
    /// Referrer and referee both receive the award.
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default)]
    pub distribution: ReferralDistribution,
}

/// A log-normal count with a point mass at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    pub points_each: u64,
    pub location: f64,
    pub scale: f64,
    /// Fraction of draws forced to zero by an independent coin flip.
    pub zero_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementConfig {
    pub requests: EventConfig,
    /// Drawn once per request.
    pub upvotes: EventConfig,
}

// ── Redemption & bonus wheel ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RedemptionPolicy {
    FractionalClaim { claim_fraction: f64 },
    LumpSumTranche { tranche_points: u64 },
}

impl RedemptionPolicy {
    /// Points that become a monetary liability this period.
    pub fn claimed_points(&self, total_points: Points) -> Points {
        match self {
            Self::FractionalClaim { claim_fraction } => total_points * claim_fraction,
            Self::LumpSumTranche { tranche_points } => {
                let tranche = *tranche_points as f64;
                (total_points / tranche).floor() * tranche
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusWheelConfig {
    pub points_per_spin: u64,
    pub average_cost_per_spin: Money,
}

impl BonusWheelConfig {
    pub fn spins(&self, total_points: Points) -> u64 {
        (total_points / self.points_per_spin as f64).floor() as u64
    }
}

// ── SchemeConfig ───────────────────────────────────────────────────

impl SchemeConfig {
    /// Load a scheme from a JSON file.
    /// Validation happens when the engine is built, not here.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| SimError::Serialization {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "flat" => Some(Self::flat()),
            "direct_points" => Some(Self::direct_points()),
            "full_funnel" => Some(Self::full_funnel()),
            _ => None,
        }
    }

    pub const PRESET_NAMES: [&'static str; 3] = ["flat", "direct_points", "full_funnel"];

    /// Number of customers to simulate.
    pub fn customers(&self) -> u64 {
        match &self.population {
            PopulationConfig::Fixed { customers } => *customers,
            PopulationConfig::Funnel(funnel) => funnel.report().customers,
        }
    }

    pub fn funnel(&self) -> Option<&AcquisitionFunnel> {
        match &self.population {
            PopulationConfig::Funnel(funnel) => Some(funnel),
            PopulationConfig::Fixed { .. } => None,
        }
    }

    /// Revenue share owed on partner-attributed customers (0 without a funnel).
    pub fn partner_revenue_share(&self) -> f64 {
        self.funnel().map_or(0.0, |f| f.partner_revenue_share)
    }

    /// Resize the population, keeping every other facet. A funnel keeps
    /// its channels, partner attribution and revenue share.
    pub fn with_customers(mut self, customers: u64) -> Self {
        match &mut self.population {
            PopulationConfig::Fixed { customers: n } => *n = customers,
            PopulationConfig::Funnel(funnel) => funnel.customers_override = Some(customers),
        }
        self
    }

    /// Check every field and report all problems together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Validator::default();

        match &self.population {
            PopulationConfig::Fixed { customers } => {
                if *customers == 0 {
                    v.issue("population.customers", "must be a positive integer");
                }
            }
            PopulationConfig::Funnel(funnel) => {
                v.fraction("population.direct.conversion_rate", funnel.direct.conversion_rate);
                v.fraction("population.partner.conversion_rate", funnel.partner.conversion_rate);
                v.fraction("population.user_to_customer_rate", funnel.user_to_customer_rate);
                v.fraction("population.partner_revenue_share", funnel.partner_revenue_share);
                match funnel.customers_override {
                    Some(0) => v.issue("population.customers_override", "must be a positive integer"),
                    Some(_) => {}
                    None => {
                        if v.is_clean_for("population.") && funnel.report().customers == 0 {
                            v.issue("population", "funnel converts zero customers");
                        }
                    }
                }
            }
        }

        v.fraction("profit_margin", self.profit_margin);
        v.non_negative("points_to_value_ratio", self.points_to_value_ratio);

        let p = &self.purchases;
        v.positive("purchases.mean_purchases", p.mean_purchases);
        if let PurchaseModel::NegativeBinomial { success_probability } = p.model {
            if !(success_probability > 0.0 && success_probability < 1.0) {
                v.issue(
                    "purchases.model.success_probability",
                    format!("must lie strictly between 0 and 1, got {success_probability}"),
                );
            }
        }
        v.finite("purchases.order_value_mean", p.order_value_mean);
        v.non_negative("purchases.order_value_std_dev", p.order_value_std_dev);
        v.positive("purchases.order_value_floor", p.order_value_floor);

        v.non_negative("points_per_currency_unit", self.points_per_currency_unit);

        let r = &self.referrals.distribution;
        v.positive("referrals.distribution.mean", r.mean);
        v.positive("referrals.distribution.shape", r.shape);

        if let Some(engagement) = &self.engagement {
            v.event("engagement.requests", &engagement.requests);
            v.event("engagement.upvotes", &engagement.upvotes);
        }

        match self.redemption {
            RedemptionPolicy::FractionalClaim { claim_fraction } => {
                v.fraction("redemption.claim_fraction", claim_fraction);
            }
            RedemptionPolicy::LumpSumTranche { tranche_points } => {
                if tranche_points == 0 {
                    v.issue("redemption.tranche_points", "must be positive");
                }
            }
        }

        if let Some(wheel) = &self.bonus_wheel {
            if wheel.points_per_spin == 0 {
                v.issue("bonus_wheel.points_per_spin", "must be positive");
            }
            v.non_negative("bonus_wheel.average_cost_per_spin", wheel.average_cost_per_spin);
        }

        v.finish()
    }

    // ── Presets ─────────────────────────────────────────────────────

    /// Milestones and referrals only; one point is one pound.
    pub fn flat() -> Self {
        Self {
            name: "flat".into(),
            population: PopulationConfig::Fixed { customers: 1000 },
            profit_margin: 0.02,
            points_to_value_ratio: 1.0,
            purchases: PurchaseConfig {
                model: PurchaseModel::Poisson,
                mean_purchases: 3.0,
                order_value_mean: 20.0,
                order_value_std_dev: 10.0,
                order_value_floor: 1.0,
            },
            points_per_currency_unit: 0.0,
            milestones: vec![
                Milestone { orders: 5, award: 1 },
                Milestone { orders: 10, award: 2 },
                Milestone { orders: 25, award: 5 },
            ],
            referrals: ReferralConfig {
                points_per_referral: 1,
                max_referrals: 5,
                double_sided: false,
                distribution: ReferralDistribution::default(),
            },
            engagement: None,
            redemption: RedemptionPolicy::FractionalClaim { claim_fraction: 0.9 },
            bonus_wheel: None,
        }
    }

    /// Points per pound spent, plus request and upvote rewards.
    pub fn direct_points() -> Self {
        Self {
            name: "direct_points".into(),
            population: PopulationConfig::Fixed { customers: 1000 },
            profit_margin: 0.02,
            points_to_value_ratio: 0.001,
            purchases: PurchaseConfig {
                model: PurchaseModel::Poisson,
                mean_purchases: 3.0,
                order_value_mean: 30.0,
                order_value_std_dev: 5.0,
                order_value_floor: 1.0,
            },
            points_per_currency_unit: 2.0,
            milestones: vec![
                Milestone { orders: 5, award: 1000 },
                Milestone { orders: 10, award: 2000 },
                Milestone { orders: 25, award: 5000 },
            ],
            referrals: ReferralConfig {
                points_per_referral: 1000,
                max_referrals: 5,
                double_sided: false,
                distribution: ReferralDistribution::default(),
            },
            engagement: Some(default_engagement()),
            redemption: RedemptionPolicy::FractionalClaim { claim_fraction: 0.5 },
            bonus_wheel: None,
        }
    }

    /// Two-channel acquisition funnel, bonus wheel, tranche redemption.
    pub fn full_funnel() -> Self {
        Self {
            name: "full_funnel".into(),
            population: PopulationConfig::Funnel(AcquisitionFunnel {
                direct: ChannelConfig {
                    name: "direct".into(),
                    reach: 1_000_000,
                    conversion_rate: 0.035,
                },
                partner: ChannelConfig {
                    name: "partner".into(),
                    reach: 1_000_000,
                    conversion_rate: 0.004,
                },
                user_to_customer_rate: 0.30,
                partner_revenue_share: DEFAULT_PARTNER_REVENUE_SHARE,
                customers_override: None,
            }),
            profit_margin: 0.02,
            points_to_value_ratio: 0.001,
            purchases: PurchaseConfig {
                model: PurchaseModel::NegativeBinomial {
                    success_probability: 0.5,
                },
                mean_purchases: 12.0,
                order_value_mean: 25.0,
                order_value_std_dev: 15.0,
                order_value_floor: 5.0,
            },
            points_per_currency_unit: 2.0,
            milestones: vec![
                Milestone { orders: 5, award: 500 },
                Milestone { orders: 10, award: 1000 },
                Milestone { orders: 25, award: 2500 },
            ],
            referrals: ReferralConfig {
                points_per_referral: 1500,
                max_referrals: 5,
                double_sided: false,
                distribution: ReferralDistribution::default(),
            },
            engagement: Some(default_engagement()),
            redemption: RedemptionPolicy::LumpSumTranche {
                tranche_points: DEFAULT_TRANCHE_POINTS,
            },
            bonus_wheel: Some(BonusWheelConfig {
                points_per_spin: 2500,
                average_cost_per_spin: 0.50,
            }),
        }
    }

    /// Full-funnel facets over a small audience, for unit tests.
    pub fn default_test() -> Self {
        let mut config = Self::full_funnel();
        config.name = "test".into();
        if let PopulationConfig::Funnel(funnel) = &mut config.population {
            funnel.direct.reach = 10_000;
            funnel.partner.reach = 10_000;
            funnel.partner.conversion_rate = 0.04;
        }
        config
    }
}

fn default_engagement() -> EngagementConfig {
    EngagementConfig {
        requests: EventConfig {
            points_each: 1,
            location: 2.0,
            scale: 1.2,
            zero_fraction: 0.5,
        },
        upvotes: EventConfig {
            points_each: 10,
            location: 1.0,
            scale: 0.4,
            zero_fraction: 0.5,
        },
    }
}

/// Collects every invalid field instead of stopping at the first.
#[derive(Default)]
struct Validator {
    issues: Vec<ConfigIssue>,
}

impl Validator {
    fn issue(&mut self, field: &str, reason: impl Into<String>) {
        self.issues.push(ConfigIssue {
            field: field.to_string(),
            reason: reason.into(),
        });
    }

    fn finite(&mut self, field: &str, value: f64) -> bool {
        if value.is_finite() {
            true
        } else {
            self.issue(field, format!("must be a finite number, got {value}"));
            false
        }
    }

    fn fraction(&mut self, field: &str, value: f64) {
        if self.finite(field, value) && !(0.0..=1.0).contains(&value) {
            self.issue(field, format!("must lie in [0, 1], got {value}"));
        }
    }

    fn non_negative(&mut self, field: &str, value: f64) {
        if self.finite(field, value) && value < 0.0 {
            self.issue(field, format!("must not be negative, got {value}"));
        }
    }

    fn positive(&mut self, field: &str, value: f64) {
        if self.finite(field, value) && value <= 0.0 {
            self.issue(field, format!("must be positive, got {value}"));
        }
    }

    fn event(&mut self, prefix: &str, event: &EventConfig) {
        self.finite(&format!("{prefix}.location"), event.location);
        self.non_negative(&format!("{prefix}.scale"), event.scale);
        self.fraction(&format!("{prefix}.zero_fraction"), event.zero_fraction);
    }

    fn is_clean_for(&self, prefix: &str) -> bool {
        !self.issues.iter().any(|i| i.field.starts_with(prefix))
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError {
                issues: self.issues,
            })
        }
    }
}
