//! Core domain types for the policy engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use crate::Money;
use crate::policy::PolicyError;

/// Job identifier, owned by the order system.
pub type JobId = u64;

/// Lifecycle state of a tow job.
///
/// Typical progression is `Pending` through `Completed`; `Cancelled` and
/// `Disputed` are side states reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Accepted,
    EnRoute,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Accepted,
        JobStatus::EnRoute,
        JobStatus::Arrived,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
        JobStatus::Disputed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Accepted => "accepted",
            JobStatus::EnRoute => "en_route",
            JobStatus::Arrived => "arrived",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Disputed => "disputed",
        }
    }

    /// No further transitions are expected from this state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Disputed
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PolicyError::InvalidStatus(s.to_string()))
    }
}

/// Reasons a driver may give to back out of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverCancelReason {
    SafetyConcern,
    VehicleInaccessible,
    UserNoShow,
    Emergency,
}

impl DriverCancelReason {
    pub const ALL: [DriverCancelReason; 4] = [
        DriverCancelReason::SafetyConcern,
        DriverCancelReason::VehicleInaccessible,
        DriverCancelReason::UserNoShow,
        DriverCancelReason::Emergency,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DriverCancelReason::SafetyConcern => "safety_concern",
            DriverCancelReason::VehicleInaccessible => "vehicle_inaccessible",
            DriverCancelReason::UserNoShow => "user_no_show",
            DriverCancelReason::Emergency => "emergency",
        }
    }

    /// Look up an allow-listed reason by its wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == s)
    }
}

/// Catalog entry describing a kind of dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisputeReason {
    pub code: &'static str,
    pub description: &'static str,
    pub requires_evidence: bool,
}

/// A decision request, as handed over by the order system.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyRequest {
    /// Customer wants to cancel the job.
    UserCancel {
        status: JobStatus,
        requested_at: DateTime<Utc>,
    },
    /// Driver wants to back out of the job.
    DriverCancel { status: JobStatus, reason: String },
    /// Job ended early; work out what the driver is owed.
    Payout {
        status: JobStatus,
        amount: Money,
        completion: f64,
    },
    /// Either party raised a dispute.
    Dispute { code: String, evidence: Vec<String> },
}

impl PolicyRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            PolicyRequest::UserCancel { .. } => "user_cancel",
            PolicyRequest::DriverCancel { .. } => "driver_cancel",
            PolicyRequest::Payout { .. } => "payout",
            PolicyRequest::Dispute { .. } => "dispute",
        }
    }

    /// Job status the request is evaluated against; disputes carry none.
    pub fn status(&self) -> Option<JobStatus> {
        match self {
            PolicyRequest::UserCancel { status, .. }
            | PolicyRequest::DriverCancel { status, .. }
            | PolicyRequest::Payout { status, .. } => Some(*status),
            PolicyRequest::Dispute { .. } => None,
        }
    }
}

/// Outcome of a customer cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCancellation {
    pub allowed: bool,
    pub fee: Money,
    pub reason: &'static str,
}

/// Outcome of a driver cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCancellation {
    pub allowed: bool,
    pub penalty: Money,
}

/// Outcome of dispute validation, meant to be shown to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisputeValidation {
    pub valid: bool,
    pub message: &'static str,
}

/// Result of evaluating a [`PolicyRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    UserCancel(UserCancellation),
    DriverCancel(DriverCancellation),
    Payout(Money),
    Dispute(DisputeValidation),
}

impl Decision {
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::UserCancel(_) => "user_cancel",
            Decision::DriverCancel(_) => "driver_cancel",
            Decision::Payout(_) => "payout",
            Decision::Dispute(_) => "dispute",
        }
    }

    /// Whether the requested action goes ahead.
    pub fn allowed(&self) -> bool {
        match self {
            Decision::UserCancel(d) => d.allowed,
            Decision::DriverCancel(d) => d.allowed,
            Decision::Payout(_) => true,
            Decision::Dispute(d) => d.valid,
        }
    }

    /// The fee, penalty or payout carried by the decision.
    pub fn amount(&self) -> Option<Money> {
        match self {
            Decision::UserCancel(d) => Some(d.fee),
            Decision::DriverCancel(d) => Some(d.penalty),
            Decision::Payout(amount) => Some(*amount),
            Decision::Dispute(_) => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Decision::UserCancel(d) => d.reason,
            Decision::Dispute(d) => d.message,
            Decision::DriverCancel(_) | Decision::Payout(_) => "",
        }
    }
}
