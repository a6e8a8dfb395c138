//! Static policy tables.
//!
//! Every table is an exhaustive match over [`JobStatus`], so adding a status
//! without a rule does not compile.

use crate::Money;
use crate::model::{DisputeReason, JobStatus};

/// Reason given while the grace window is open.
pub const FREE_CANCELLATION: &str = "free cancellation period";

/// User cancellation rule for one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationRule {
    /// Grace window after the request; `0` means none.
    pub time_limit_minutes: u32,
    pub fee: Money,
    pub reason: &'static str,
}

pub fn cancellation_rule(status: JobStatus) -> CancellationRule {
    let (time_limit_minutes, fee, reason) = match status {
        JobStatus::Pending => (5, 0, "Job not yet accepted by a driver"),
        JobStatus::Accepted => (0, 50, "Driver has already accepted the job"),
        JobStatus::EnRoute => (0, 100, "Driver is already on the way"),
        JobStatus::Arrived => (0, 150, "Driver has arrived at the pickup location"),
        JobStatus::InProgress => (0, 200, "Service is already in progress"),
        JobStatus::Completed => (0, 0, "Cannot cancel a completed job"),
        JobStatus::Cancelled => (0, 0, "No fee for a job that is already cancelled"),
        JobStatus::Disputed => (0, 0, "Cannot cancel a job under dispute"),
    };
    CancellationRule {
        time_limit_minutes,
        fee: Money::from_units(fee),
        reason,
    }
}

/// Customer cancellation is refused outright in these states.
pub fn blocks_user_cancellation(status: JobStatus) -> bool {
    matches!(status, JobStatus::Completed | JobStatus::Disputed)
}

/// Penalty charged to a driver who backs out; grows with job progress.
pub fn driver_penalty(status: JobStatus) -> Money {
    let units = match status {
        JobStatus::Pending => 0,
        JobStatus::Accepted => 25,
        JobStatus::EnRoute => 50,
        JobStatus::Arrived => 100,
        JobStatus::InProgress => 200,
        JobStatus::Completed | JobStatus::Cancelled | JobStatus::Disputed => 0,
    };
    Money::from_units(units)
}

/// Share of the agreed price owed to the driver, in basis points.
///
/// `completion` must already be within `[0, 1]`; it only matters for
/// `InProgress`, where it is resolved to the nearest basis point.
pub fn payout_basis_points(status: JobStatus, completion: f64) -> u32 {
    match status {
        JobStatus::Pending | JobStatus::Cancelled => 0,
        JobStatus::Accepted => 1_000,
        JobStatus::EnRoute => 3_000,
        JobStatus::Arrived => 5_000,
        JobStatus::InProgress => 7_000 + (completion * 3_000.0).round() as u32,
        JobStatus::Completed => 10_000,
        // held in escrow until the dispute is resolved
        JobStatus::Disputed => 5_000,
    }
}

pub static DISPUTE_REASONS: [DisputeReason; 7] = [
    DisputeReason {
        code: "SERVICE_NOT_PROVIDED",
        description: "The requested service was not provided",
        requires_evidence: false,
    },
    DisputeReason {
        code: "VEHICLE_DAMAGE",
        description: "The vehicle was damaged during the service",
        requires_evidence: true,
    },
    DisputeReason {
        code: "OVERCHARGED",
        description: "The amount charged differs from the agreed price",
        requires_evidence: true,
    },
    DisputeReason {
        code: "INCOMPLETE_SERVICE",
        description: "The service was started but not finished",
        requires_evidence: false,
    },
    DisputeReason {
        code: "WRONG_DESTINATION",
        description: "The vehicle was delivered to the wrong location",
        requires_evidence: true,
    },
    DisputeReason {
        code: "LATE_ARRIVAL",
        description: "The driver arrived much later than estimated",
        requires_evidence: false,
    },
    DisputeReason {
        code: "UNPROFESSIONAL_CONDUCT",
        description: "The other party behaved unprofessionally",
        requires_evidence: false,
    },
];

pub fn find_dispute_reason(code: &str) -> Option<&'static DisputeReason> {
    DISPUTE_REASONS.iter().find(|reason| reason.code == code)
}
