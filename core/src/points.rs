//! Points rules engine — behaviour in, points breakdown out.
//!
//! Pure: no RNG, no state. Rules run in a fixed order:
//!   1. purchase points    (spend × points per pound)
//!   2. milestone points   (every threshold reached, inclusive, stacking)
//!   3. referral points    (capped count × award, doubled if double-sided)
//!   4. request points
//!   5. upvote points
//!   6. total              (1–5)
//!   7. bonus wheel        (spins from total; costs money, not points)
//!   8. claimed points     (redemption policy applied to total)

use crate::{
    config::{Milestone, ReferralConfig, SchemeConfig},
    error::{SimError, SimResult},
    sampler::CustomerBehavior,
    types::{Money, Points},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub purchase_points: Points,
    pub milestone_points: Points,
    /// Referrals that earned points, after the per-customer cap.
    pub referrals_credited: u32,
    pub referral_points: Points,
    pub request_points: Points,
    pub upvotes: u64,
    pub upvote_points: Points,
    pub total_points: Points,
    pub bonus_wheel_spins: u64,
    pub bonus_wheel_value: Money,
    pub claimed_points: Points,
}

pub fn compute_points(
    behavior: &CustomerBehavior<'_>,
    config: &SchemeConfig,
) -> SimResult<PointsBreakdown> {
    check_preconditions(behavior)?;

    let purchase_points = behavior.spend() * config.points_per_currency_unit;
    let milestone_points = milestone_points(behavior.purchase_count, &config.milestones);
    let (referrals_credited, referral_points) =
        referral_points(behavior.referrals, &config.referrals);

    let (points_per_request, points_per_upvote) = config
        .engagement
        .as_ref()
        .map_or((0, 0), |e| (e.requests.points_each, e.upvotes.points_each));
    let request_points = behavior.request_count as f64 * points_per_request as f64;
    let upvotes = behavior.total_upvotes();
    let upvote_points = upvotes as f64 * points_per_upvote as f64;

    let total_points =
        purchase_points + milestone_points + referral_points + request_points + upvote_points;

    let (bonus_wheel_spins, bonus_wheel_value) = match &config.bonus_wheel {
        Some(wheel) => {
            let spins = wheel.spins(total_points);
            (spins, spins as f64 * wheel.average_cost_per_spin)
        }
        None => (0, 0.0),
    };

    let claimed_points = config.redemption.claimed_points(total_points);

    Ok(PointsBreakdown {
        purchase_points,
        milestone_points,
        referrals_credited,
        referral_points,
        request_points,
        upvotes,
        upvote_points,
        total_points,
        bonus_wheel_spins,
        bonus_wheel_value,
        claimed_points,
    })
}

/// Sum of every milestone award whose threshold is reached.
pub fn milestone_points(purchase_count: u32, milestones: &[Milestone]) -> Points {
    milestones
        .iter()
        .filter(|m| purchase_count >= m.orders)
        .map(|m| m.award as f64)
        .sum()
}

/// Credited referral count and the points it earns.
pub fn referral_points(referrals: u32, config: &ReferralConfig) -> (u32, Points) {
    let credited = referrals.min(config.max_referrals);
    let mut points = credited as f64 * config.points_per_referral as f64;
    if config.double_sided {
        points *= 2.0;
    }
    (credited, points)
}

fn check_preconditions(behavior: &CustomerBehavior<'_>) -> SimResult<()> {
    let violation = |detail: String| SimError::PreconditionViolation {
        customer_id: behavior.customer_id,
        detail,
    };

    if behavior.order_values.len() != behavior.purchase_count as usize {
        return Err(violation(format!(
            "{} order values for {} purchases",
            behavior.order_values.len(),
            behavior.purchase_count
        )));
    }
    if let Some(bad) = behavior
        .order_values
        .iter()
        .find(|v| !v.is_finite() || **v < 0.0)
    {
        return Err(violation(format!("order value {bad} is negative or not finite")));
    }
    if behavior.upvotes.len() != behavior.request_count as usize {
        return Err(violation(format!(
            "{} upvote draws for {} requests",
            behavior.upvotes.len(),
            behavior.request_count
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BonusWheelConfig, RedemptionPolicy};

    fn behavior<'a>(orders: &'a [f64], upvotes: &'a [u32], referrals: u32) -> CustomerBehavior<'a> {
        CustomerBehavior {
            customer_id: 1,
            purchase_count: orders.len() as u32,
            order_values: orders,
            referrals,
            request_count: upvotes.len() as u32,
            upvotes,
            partner_attributed: false,
        }
    }

    #[test]
    fn milestone_boundary_is_inclusive() {
        let milestones = SchemeConfig::flat().milestones;
        assert_eq!(milestone_points(4, &milestones), 0.0);
        assert_eq!(milestone_points(5, &milestones), 1.0);
        assert_eq!(milestone_points(10, &milestones), 3.0);
        assert_eq!(milestone_points(25, &milestones), 8.0);
        assert_eq!(milestone_points(400, &milestones), 8.0);
    }

    #[test]
    fn milestones_never_decrease_with_more_purchases() {
        let milestones = SchemeConfig::direct_points().milestones;
        let mut previous = 0.0;
        for count in 0..60 {
            let points = milestone_points(count, &milestones);
            assert!(points >= previous, "dropped at {count} purchases");
            previous = points;
        }
    }

    #[test]
    fn zero_threshold_always_awards() {
        let milestones = [Milestone { orders: 0, award: 7 }];
        assert_eq!(milestone_points(0, &milestones), 7.0);
    }

    #[test]
    fn referrals_are_capped_and_linear() {
        let mut config = SchemeConfig::direct_points().referrals;
        assert_eq!(referral_points(0, &config), (0, 0.0));
        assert_eq!(referral_points(3, &config), (3, 3000.0));
        assert_eq!(referral_points(9, &config), (5, 5000.0));

        config.double_sided = true;
        assert_eq!(referral_points(3, &config), (3, 6000.0));
    }

    #[test]
    fn direct_points_breakdown_adds_up() {
        let config = SchemeConfig::direct_points();
        let orders = [30.0, 20.0, 10.0, 40.0, 25.0];
        let upvotes = [0, 3, 1];
        let b = compute_points(&behavior(&orders, &upvotes, 2), &config).unwrap();

        assert_eq!(b.purchase_points, 250.0);
        assert_eq!(b.milestone_points, 1000.0);
        assert_eq!(b.referral_points, 2000.0);
        assert_eq!(b.request_points, 3.0);
        assert_eq!(b.upvotes, 4);
        assert_eq!(b.upvote_points, 40.0);
        assert_eq!(b.total_points, 3293.0);
        assert_eq!(b.claimed_points, 1646.5);
        assert_eq!(b.bonus_wheel_spins, 0);
        assert_eq!(b.bonus_wheel_value, 0.0);
    }

    #[test]
    fn flat_scheme_gives_no_purchase_points() {
        let config = SchemeConfig::flat();
        let orders = [100.0; 6];
        let b = compute_points(&behavior(&orders, &[], 1), &config).unwrap();
        assert_eq!(b.purchase_points, 0.0);
        assert_eq!(b.total_points, b.milestone_points + b.referral_points);
        assert_eq!(b.total_points, 2.0);
    }

    #[test]
    fn wheel_and_tranche_use_total_points() {
        let mut config = SchemeConfig::direct_points();
        config.bonus_wheel = Some(BonusWheelConfig {
            points_per_spin: 2500,
            average_cost_per_spin: 0.5,
        });
        config.redemption = RedemptionPolicy::LumpSumTranche {
            tranche_points: 10_000,
        };
        // 5 referrals × 1000 + 5 orders (milestone 1000) + 2 × 5 × 3000 spend
        let orders = [3000.0; 5];
        let b = compute_points(&behavior(&orders, &[], 5), &config).unwrap();
        assert_eq!(b.total_points, 36_000.0);
        assert_eq!(b.bonus_wheel_spins, 14);
        assert_eq!(b.bonus_wheel_value, 7.0);
        assert_eq!(b.claimed_points, 30_000.0);
    }

    #[test]
    fn negative_order_value_is_a_precondition_violation() {
        let config = SchemeConfig::direct_points();
        let orders = [10.0, -1.0];
        let err = compute_points(&behavior(&orders, &[], 0), &config).unwrap_err();
        assert!(matches!(
            err,
            SimError::PreconditionViolation { customer_id: 1, .. }
        ));
    }

    #[test]
    fn mismatched_slices_are_rejected() {
        let config = SchemeConfig::direct_points();
        let orders = [10.0];
        let mut b = behavior(&orders, &[], 0);
        b.purchase_count = 2;
        assert!(matches!(
            compute_points(&b, &config),
            Err(SimError::PreconditionViolation { .. })
        ));

        let upvotes = [1];
        let mut b = behavior(&orders, &upvotes, 0);
        b.request_count = 0;
        assert!(matches!(
            compute_points(&b, &config),
            Err(SimError::PreconditionViolation { .. })
        ));
    }
}
