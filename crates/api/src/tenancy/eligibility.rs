//! Eligibility Evaluator
//!
//! Decides whether a resolved tenant may currently be served, based on its
//! lifecycle status and billing state.
//!
//! Pure function over a tenant snapshot. The caller passes the clock so the
//! trial check always uses evaluation time, never the time the snapshot was
//! cached.

use campfire_shared::Tenant;
use serde::Serialize;
use time::OffsetDateTime;

/// Outcome of evaluating a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Allow,
    Reject(RejectReason),
}

/// Why an existing tenant was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Lifecycle status is inactive or suspended
    Inactive,
    /// Trial expired and no active subscription
    PaymentRequired,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Inactive => write!(f, "inactive"),
            RejectReason::PaymentRequired => write!(f, "payment_required"),
        }
    }
}

/// Evaluate a tenant at `now`.
///
/// Lifecycle status is checked first, so a suspended tenant is rejected as
/// inactive whatever its billing state. An active subscription always wins
/// over an expired trial.
pub fn evaluate(tenant: &Tenant, now: OffsetDateTime) -> Eligibility {
    if !tenant.status.is_active() {
        return Eligibility::Reject(RejectReason::Inactive);
    }

    if tenant.plan.is_free() {
        return Eligibility::Allow;
    }

    if tenant.subscription_status.is_active() {
        return Eligibility::Allow;
    }

    match tenant.trial_ends_at {
        Some(trial_end) if now < trial_end => Eligibility::Allow,
        _ => Eligibility::Reject(RejectReason::PaymentRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campfire_shared::{Plan, SubscriptionStatus, TenantStatus};
    use time::Duration;

    fn paid() -> Tenant {
        Tenant::new("Camp Beta", "beta", Plan::Professional)
    }

    #[test]
    fn test_inactive_and_suspended_are_rejected() {
        let now = OffsetDateTime::now_utc();
        for status in [TenantStatus::Inactive, TenantStatus::Suspended] {
            let tenant = paid()
                .with_status(status)
                .with_subscription(SubscriptionStatus::Active);
            assert_eq!(
                evaluate(&tenant, now),
                Eligibility::Reject(RejectReason::Inactive)
            );

            let free = Tenant::new("Camp Free", "free", Plan::Free).with_status(status);
            assert_eq!(evaluate(&free, now), Eligibility::Reject(RejectReason::Inactive));
        }
    }

    #[test]
    fn test_free_plan_is_allowed_without_billing() {
        let tenant = Tenant::new("Camp Free", "free", Plan::Free);
        assert_eq!(evaluate(&tenant, OffsetDateTime::now_utc()), Eligibility::Allow);
    }

    #[test]
    fn test_active_subscription_is_allowed() {
        let tenant = paid().with_subscription(SubscriptionStatus::Active);
        assert_eq!(evaluate(&tenant, OffsetDateTime::now_utc()), Eligibility::Allow);
    }

    #[test]
    fn test_active_subscription_overrides_expired_trial() {
        let now = OffsetDateTime::now_utc();
        let tenant = paid()
            .with_subscription(SubscriptionStatus::Active)
            .with_trial_end(Some(now - Duration::days(30)));
        assert_eq!(evaluate(&tenant, now), Eligibility::Allow);
    }

    #[test]
    fn test_within_trial_is_allowed() {
        let now = OffsetDateTime::now_utc();
        let tenant = paid().with_trial_end(Some(now + Duration::days(3)));
        assert_eq!(evaluate(&tenant, now), Eligibility::Allow);
    }

    #[test]
    fn test_expired_trial_requires_payment() {
        let now = OffsetDateTime::now_utc();
        let tenant = paid().with_trial_end(Some(now - Duration::days(10)));
        assert_eq!(
            evaluate(&tenant, now),
            Eligibility::Reject(RejectReason::PaymentRequired)
        );
    }

    #[test]
    fn test_trial_end_is_exclusive() {
        let now = OffsetDateTime::now_utc();
        let tenant = paid().with_trial_end(Some(now));
        assert_eq!(
            evaluate(&tenant, now),
            Eligibility::Reject(RejectReason::PaymentRequired)
        );
    }

    #[test]
    fn test_no_trial_and_no_subscription_requires_payment() {
        let tenant = paid();
        assert_eq!(
            evaluate(&tenant, OffsetDateTime::now_utc()),
            Eligibility::Reject(RejectReason::PaymentRequired)
        );
    }

    #[test]
    fn test_non_active_subscription_states_have_no_grace() {
        let now = OffsetDateTime::now_utc();
        for status in [
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Unpaid,
            SubscriptionStatus::Incomplete,
            SubscriptionStatus::Trialing,
        ] {
            let tenant = paid()
                .with_subscription(status)
                .with_trial_end(Some(now - Duration::hours(1)));
            assert_eq!(
                evaluate(&tenant, now),
                Eligibility::Reject(RejectReason::PaymentRequired),
                "{} should not admit an expired trial",
                status
            );
        }
    }

    #[test]
    fn test_custom_plan_is_billed() {
        let tenant = Tenant::new("Camp Custom", "custom", Plan::Custom);
        assert_eq!(
            evaluate(&tenant, OffsetDateTime::now_utc()),
            Eligibility::Reject(RejectReason::PaymentRequired)
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let now = OffsetDateTime::now_utc();
        let tenant = paid().with_trial_end(Some(now + Duration::minutes(5)));
        assert_eq!(evaluate(&tenant, now), evaluate(&tenant, now));

        // The same snapshot re-evaluated later sees the trial expire
        assert_eq!(
            evaluate(&tenant, now + Duration::minutes(10)),
            Eligibility::Reject(RejectReason::PaymentRequired)
        );
    }
}
