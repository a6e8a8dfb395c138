//! Cancellation, payout and dispute policy engine.
//!
//! The engine holds no job state. Callers hand over a job's status (and, for
//! customer cancellations, its request time) and get a decision back; applying
//! fees, penalties and payouts is left to the order system.
//! A stream of requests can also be evaluated asynchronously.

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Money;
use crate::clock::{Clock, SystemClock};
use crate::model::{
    Decision, DisputeReason, DisputeValidation, DriverCancelReason, DriverCancellation, JobId,
    JobStatus, PolicyRequest, UserCancellation,
};

mod error;
pub use error::PolicyError;

pub mod rules;
pub use rules::CancellationRule;

pub const INVALID_DISPUTE_REASON: &str = "Invalid dispute reason";
pub const EVIDENCE_REQUIRED: &str = "Evidence required for this dispute type";
pub const DISPUTE_ACCEPTED: &str = "Dispute submitted for review";

/// Stateless policy engine.
///
/// The only dependency is the clock used to measure how long ago a job was
/// requested.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine<C = SystemClock> {
    clock: C,
}

impl PolicyEngine<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

/// Public API
impl<C: Clock> PolicyEngine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Evaluate every request of the stream, skipping the ones that fail.
    pub async fn run(
        &self,
        mut stream: impl Stream<Item = (JobId, PolicyRequest)> + Unpin,
    ) -> Vec<(JobId, Decision)> {
        let mut decisions = Vec::new();
        while let Some((job, request)) = stream.next().await {
            // a bad request should not stop the batch, it is already logged
            if let Ok(decision) = self.evaluate(job, &request) {
                decisions.push((job, decision));
            }
        }
        decisions
    }

    /// Evaluate a single request.
    pub fn evaluate(&self, job: JobId, request: &PolicyRequest) -> Result<Decision, PolicyError> {
        let result = match request {
            PolicyRequest::UserCancel {
                status,
                requested_at,
            } => Ok(Decision::UserCancel(
                self.can_user_cancel(*status, *requested_at),
            )),
            PolicyRequest::DriverCancel { status, reason } => Ok(Decision::DriverCancel(
                self.can_driver_cancel(*status, reason),
            )),
            PolicyRequest::Payout {
                status,
                amount,
                completion,
            } => self
                .calculate_partial_payout(*amount, *status, *completion)
                .map(Decision::Payout),
            PolicyRequest::Dispute { code, evidence } => Ok(Decision::Dispute(
                self.validate_dispute(code, Some(evidence.as_slice())),
            )),
        };
        Self::log_result(job, request, &result);
        result
    }

    /// Decide whether the customer may cancel and what it costs them.
    pub fn can_user_cancel(
        &self,
        status: JobStatus,
        requested_at: DateTime<Utc>,
    ) -> UserCancellation {
        let rule = rules::cancellation_rule(status);

        if rules::blocks_user_cancellation(status) {
            return UserCancellation {
                allowed: false,
                fee: Money::ZERO,
                reason: rule.reason,
            };
        }

        let minutes_elapsed =
            (self.clock.now() - requested_at).num_milliseconds() as f64 / 60_000.0;

        if rule.time_limit_minutes > 0 && minutes_elapsed <= f64::from(rule.time_limit_minutes) {
            return UserCancellation {
                allowed: true,
                fee: Money::ZERO,
                reason: rules::FREE_CANCELLATION,
            };
        }

        UserCancellation {
            allowed: true,
            fee: rule.fee,
            reason: rule.reason,
        }
    }

    /// Decide whether a driver may back out and what penalty they incur.
    ///
    /// `reason` must be one of the allow-listed [`DriverCancelReason`] names.
    pub fn can_driver_cancel(&self, status: JobStatus, reason: &str) -> DriverCancellation {
        let refused = DriverCancellation {
            allowed: false,
            penalty: Money::ZERO,
        };

        if DriverCancelReason::parse(reason).is_none() {
            return refused;
        }
        if status == JobStatus::Completed {
            return refused;
        }

        DriverCancellation {
            allowed: true,
            penalty: rules::driver_penalty(status),
        }
    }

    /// Amount owed to the driver for a job that stopped at `status`.
    ///
    /// `completion` is the progress within `InProgress`, expected in `[0, 1]`.
    /// Finite values outside that range are clamped; NaN is rejected.
    pub fn calculate_partial_payout(
        &self,
        original_amount: Money,
        status: JobStatus,
        completion: f64,
    ) -> Result<Money, PolicyError> {
        if completion.is_nan() {
            return Err(PolicyError::InvalidCompletionPercentage(completion));
        }

        let clamped = completion.clamp(0.0, 1.0);
        if clamped != completion {
            warn!(
                completion,
                clamped, "completion percentage out of range, clamping"
            );
        }

        let basis_points = rules::payout_basis_points(status, clamped);
        Ok(original_amount.share_rounded(basis_points))
    }

    /// The dispute catalog, in declaration order.
    pub fn dispute_reasons(&self) -> &'static [DisputeReason] {
        &rules::DISPUTE_REASONS
    }

    pub fn validate_dispute(&self, code: &str, evidence: Option<&[String]>) -> DisputeValidation {
        let Some(reason) = rules::find_dispute_reason(code) else {
            return DisputeValidation {
                valid: false,
                message: INVALID_DISPUTE_REASON,
            };
        };

        if reason.requires_evidence && evidence.is_none_or(|e| e.is_empty()) {
            return DisputeValidation {
                valid: false,
                message: EVIDENCE_REQUIRED,
            };
        }

        DisputeValidation {
            valid: true,
            message: DISPUTE_ACCEPTED,
        }
    }
}

/// Private API
impl<C: Clock> PolicyEngine<C> {
    /// Small helper to log `evaluate` results
    fn log_result(job: JobId, request: &PolicyRequest, result: &Result<Decision, PolicyError>) {
        let kind = request.kind();
        let status = request.status().map(JobStatus::as_str);
        match result {
            Ok(decision) => match decision.amount() {
                Some(amount) => info!(
                    job = %job,
                    status,
                    allowed = decision.allowed(),
                    amount = %amount,
                    "{kind} evaluated"
                ),
                None => info!(
                    job = %job,
                    status,
                    allowed = decision.allowed(),
                    "{kind} evaluated"
                ),
            },
            Err(e) => warn!(
                job = %job,
                status,
                reason = %e,
                "{kind} skipped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{Duration, TimeZone};

    // test utils

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn engine() -> PolicyEngine<FixedClock> {
        PolicyEngine::with_clock(FixedClock(now()))
    }

    fn minutes_ago(minutes: i64) -> DateTime<Utc> {
        now() - Duration::minutes(minutes)
    }

    fn evidence(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // Customer cancellation

    #[test]
    fn pending_within_grace_window_is_free() {
        let decision = engine().can_user_cancel(JobStatus::Pending, minutes_ago(3));
        assert!(decision.allowed);
        assert_eq!(decision.fee, Money::ZERO);
        assert_eq!(decision.reason, rules::FREE_CANCELLATION);
    }

    #[test]
    fn grace_window_boundary_is_inclusive() {
        let decision = engine().can_user_cancel(JobStatus::Pending, minutes_ago(5));
        assert_eq!(decision.reason, rules::FREE_CANCELLATION);

        let late = now() - Duration::minutes(5) - Duration::milliseconds(1);
        let decision = engine().can_user_cancel(JobStatus::Pending, late);
        assert_eq!(decision.reason, rules::cancellation_rule(JobStatus::Pending).reason);
    }

    #[test]
    fn pending_after_grace_window_is_still_free() {
        let decision = engine().can_user_cancel(JobStatus::Pending, minutes_ago(30));
        assert!(decision.allowed);
        assert_eq!(decision.fee, Money::ZERO);
        assert_eq!(decision.reason, "Job not yet accepted by a driver");
    }

    #[test]
    fn request_time_in_the_future_counts_as_within_window() {
        let decision = engine().can_user_cancel(JobStatus::Pending, now() + Duration::minutes(2));
        assert_eq!(decision.reason, rules::FREE_CANCELLATION);
    }

    #[test]
    fn fees_apply_once_driver_is_assigned() {
        let expected = [
            (JobStatus::Accepted, 50),
            (JobStatus::EnRoute, 100),
            (JobStatus::Arrived, 150),
            (JobStatus::InProgress, 200),
        ];
        for (status, fee) in expected {
            // no grace window outside pending, even one minute in
            let decision = engine().can_user_cancel(status, minutes_ago(1));
            assert!(decision.allowed, "{status}");
            assert_eq!(decision.fee, Money::from_units(fee), "{status}");
            assert_eq!(decision.reason, rules::cancellation_rule(status).reason);
        }
    }

    #[test]
    fn completed_and_disputed_cannot_be_cancelled() {
        for status in [JobStatus::Completed, JobStatus::Disputed] {
            let decision = engine().can_user_cancel(status, minutes_ago(1));
            assert!(!decision.allowed, "{status}");
            assert_eq!(decision.fee, Money::ZERO);
            assert_eq!(decision.reason, rules::cancellation_rule(status).reason);
        }
    }

    #[test]
    fn cancelled_job_is_allowed_at_no_cost() {
        let decision = engine().can_user_cancel(JobStatus::Cancelled, minutes_ago(60));
        assert!(decision.allowed);
        assert_eq!(decision.fee, Money::ZERO);
        assert_eq!(decision.reason, "No fee for a job that is already cancelled");
    }

    #[test]
    fn user_cancel_is_repeatable_for_fixed_now() {
        let engine = engine();
        let requested_at = minutes_ago(4);
        assert_eq!(
            engine.can_user_cancel(JobStatus::Pending, requested_at),
            engine.can_user_cancel(JobStatus::Pending, requested_at)
        );
    }

    #[test]
    fn elapsed_time_follows_the_clock() {
        let requested_at = now();
        let early = PolicyEngine::with_clock(FixedClock(now() + Duration::minutes(4)));
        let late = PolicyEngine::with_clock(FixedClock(now() + Duration::minutes(6)));
        assert_eq!(
            early.can_user_cancel(JobStatus::Pending, requested_at).reason,
            rules::FREE_CANCELLATION
        );
        assert_ne!(
            late.can_user_cancel(JobStatus::Pending, requested_at).reason,
            rules::FREE_CANCELLATION
        );
    }

    // Driver cancellation

    #[test]
    fn driver_unknown_reason_is_refused_for_every_status() {
        for status in JobStatus::ALL {
            let decision = engine().can_driver_cancel(status, "invalid_reason");
            assert!(!decision.allowed, "{status}");
            assert_eq!(decision.penalty, Money::ZERO);
        }
    }

    #[test]
    fn driver_cannot_cancel_completed_job() {
        let decision = engine().can_driver_cancel(JobStatus::Completed, "emergency");
        assert!(!decision.allowed);
        assert_eq!(decision.penalty, Money::ZERO);
    }

    #[test]
    fn driver_penalties_by_status() {
        let expected = [
            (JobStatus::Pending, 0),
            (JobStatus::Accepted, 25),
            (JobStatus::EnRoute, 50),
            (JobStatus::Arrived, 100),
            (JobStatus::InProgress, 200),
            (JobStatus::Cancelled, 0),
            (JobStatus::Disputed, 0),
        ];
        for (status, penalty) in expected {
            let decision = engine().can_driver_cancel(status, "safety_concern");
            assert!(decision.allowed, "{status}");
            assert_eq!(decision.penalty, Money::from_units(penalty), "{status}");
        }
    }

    #[test]
    fn every_allow_listed_reason_is_accepted() {
        for reason in DriverCancelReason::ALL {
            let decision = engine().can_driver_cancel(JobStatus::Arrived, reason.as_str());
            assert!(decision.allowed, "{}", reason.as_str());
            assert_eq!(decision.penalty, Money::from_units(100));
        }
    }

    // Partial payout

    #[test]
    fn in_progress_payout_spans_seventy_to_full() {
        let amount = Money::from_units(1000);
        let engine = engine();
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, 0.0),
            Ok(Money::from_units(700))
        );
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, 0.5),
            Ok(Money::from_units(850))
        );
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, 1.0),
            Ok(Money::from_units(1000))
        );
    }

    #[test]
    fn payout_by_status_ignores_completion_outside_in_progress() {
        let amount = Money::from_units(1000);
        let expected = [
            (JobStatus::Pending, 0),
            (JobStatus::Accepted, 100),
            (JobStatus::EnRoute, 300),
            (JobStatus::Arrived, 500),
            (JobStatus::Completed, 1000),
            (JobStatus::Cancelled, 0),
            (JobStatus::Disputed, 500),
        ];
        for (status, payout) in expected {
            for completion in [0.0, 0.5, 1.0] {
                assert_eq!(
                    engine().calculate_partial_payout(amount, status, completion),
                    Ok(Money::from_units(payout)),
                    "{status} at {completion}"
                );
            }
        }
    }

    #[test]
    fn payout_rounds_to_whole_units() {
        // 1234.56 * 0.30 = 370.368
        let amount = Money::from_cents(123_456);
        assert_eq!(
            engine().calculate_partial_payout(amount, JobStatus::EnRoute, 0.0),
            Ok(Money::from_units(370))
        );
        // 45 * 0.10 = 4.5 -> 5
        assert_eq!(
            engine().calculate_partial_payout(Money::from_units(45), JobStatus::Accepted, 0.0),
            Ok(Money::from_units(5))
        );
    }

    #[test]
    fn in_progress_payout_rounds_exact_halves_up() {
        let engine = engine();
        // 20 * 0.925 = 18.5
        assert_eq!(
            engine.calculate_partial_payout(Money::from_units(20), JobStatus::InProgress, 0.75),
            Ok(Money::from_units(19))
        );
        // 100 * 0.775 = 77.5
        assert_eq!(
            engine.calculate_partial_payout(Money::from_units(100), JobStatus::InProgress, 0.25),
            Ok(Money::from_units(78))
        );
    }

    #[test]
    fn payout_on_largest_amount_does_not_overflow() {
        let amount = Money::from_units(Money::MAX_UNITS);
        assert_eq!(
            engine().calculate_partial_payout(amount, JobStatus::Completed, 0.0),
            Ok(amount)
        );
        assert_eq!(
            engine().calculate_partial_payout(amount, JobStatus::Arrived, 0.0),
            Ok(Money::from_units(Money::MAX_UNITS / 2))
        );
    }

    #[test]
    fn out_of_range_completion_is_clamped() {
        let amount = Money::from_units(1000);
        let engine = engine();
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, 1.5),
            Ok(Money::from_units(1000))
        );
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, -0.2),
            Ok(Money::from_units(700))
        );
        assert_eq!(
            engine.calculate_partial_payout(amount, JobStatus::InProgress, f64::INFINITY),
            Ok(Money::from_units(1000))
        );
    }

    #[test]
    fn nan_completion_is_rejected() {
        let result = engine().calculate_partial_payout(
            Money::from_units(1000),
            JobStatus::InProgress,
            f64::NAN,
        );
        assert!(matches!(
            result,
            Err(PolicyError::InvalidCompletionPercentage(_))
        ));
    }

    // Disputes

    #[test]
    fn dispute_catalog_is_stable() {
        let engine = engine();
        let first: Vec<_> = engine.dispute_reasons().iter().map(|r| r.code).collect();
        let second: Vec<_> = engine.dispute_reasons().iter().map(|r| r.code).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], "SERVICE_NOT_PROVIDED");
        assert!(first.contains(&"VEHICLE_DAMAGE"));
    }

    #[test]
    fn vehicle_damage_requires_evidence() {
        let engine = engine();

        let missing = engine.validate_dispute("VEHICLE_DAMAGE", None);
        assert!(!missing.valid);
        assert_eq!(missing.message, EVIDENCE_REQUIRED);

        let empty = engine.validate_dispute("VEHICLE_DAMAGE", Some(&[][..]));
        assert!(!empty.valid);
        assert_eq!(empty.message, EVIDENCE_REQUIRED);

        let photos = evidence(&["photo.jpg"]);
        let ok = engine.validate_dispute("VEHICLE_DAMAGE", Some(photos.as_slice()));
        assert!(ok.valid);
    }

    #[test]
    fn unknown_dispute_code_is_invalid() {
        let files = evidence(&["a.png"]);
        let decision = engine().validate_dispute("NOT_A_CODE", Some(files.as_slice()));
        assert!(!decision.valid);
        assert_eq!(decision.message, INVALID_DISPUTE_REASON);
    }

    #[test]
    fn dispute_without_evidence_requirement_is_valid() {
        let decision = engine().validate_dispute("LATE_ARRIVAL", None);
        assert!(decision.valid);
        assert_eq!(decision.message, DISPUTE_ACCEPTED);
    }

    #[test]
    fn every_catalog_entry_validates_with_evidence() {
        let files = evidence(&["receipt.pdf"]);
        for reason in engine().dispute_reasons() {
            assert!(engine().validate_dispute(reason.code, Some(files.as_slice())).valid);
            assert_eq!(
                engine().validate_dispute(reason.code, None).valid,
                !reason.requires_evidence
            );
        }
    }

    // Requests

    #[test]
    fn evaluate_dispatches_each_request_kind() {
        let engine = engine();

        let decision = engine
            .evaluate(
                1,
                &PolicyRequest::UserCancel {
                    status: JobStatus::Arrived,
                    requested_at: minutes_ago(20),
                },
            )
            .unwrap();
        assert_eq!(decision.amount(), Some(Money::from_units(150)));

        let decision = engine
            .evaluate(
                2,
                &PolicyRequest::DriverCancel {
                    status: JobStatus::EnRoute,
                    reason: "user_no_show".to_string(),
                },
            )
            .unwrap();
        assert_eq!(
            decision,
            Decision::DriverCancel(DriverCancellation {
                allowed: true,
                penalty: Money::from_units(50),
            })
        );

        let decision = engine
            .evaluate(
                3,
                &PolicyRequest::Payout {
                    status: JobStatus::Arrived,
                    amount: Money::from_units(800),
                    completion: 0.0,
                },
            )
            .unwrap();
        assert_eq!(decision, Decision::Payout(Money::from_units(400)));

        let decision = engine
            .evaluate(
                4,
                &PolicyRequest::Dispute {
                    code: "OVERCHARGED".to_string(),
                    evidence: vec![],
                },
            )
            .unwrap();
        assert!(!decision.allowed());
        assert_eq!(decision.message(), EVIDENCE_REQUIRED);
    }

    #[test]
    fn evaluate_propagates_payout_errors() {
        let result = engine().evaluate(
            9,
            &PolicyRequest::Payout {
                status: JobStatus::InProgress,
                amount: Money::from_units(100),
                completion: f64::NAN,
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn run_skips_failed_requests() {
        let requests = vec![
            (
                1,
                PolicyRequest::DriverCancel {
                    status: JobStatus::Accepted,
                    reason: "emergency".to_string(),
                },
            ),
            (
                2,
                PolicyRequest::Payout {
                    status: JobStatus::InProgress,
                    amount: Money::from_units(100),
                    completion: f64::NAN,
                },
            ),
            (
                3,
                PolicyRequest::Dispute {
                    code: "LATE_ARRIVAL".to_string(),
                    evidence: vec![],
                },
            ),
        ];

        let decisions = engine().run(tokio_stream::iter(requests)).await;
        let jobs: Vec<_> = decisions.iter().map(|(job, _)| *job).collect();
        assert_eq!(jobs, vec![1, 3]);
    }
}
