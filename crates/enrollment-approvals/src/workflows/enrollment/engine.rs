//! Approval state engine for enrollment requests.
//!
//! Every function here is a pure transition over an already-loaded request and a
//! clock reading. Callers own persistence and must run read-decide-write as one
//! atomic unit per request (see [`super::service::EnrollmentService::decide`]).
//!
//! ```text
//! stage:   pending ──▶ approved | rejected          (one way)
//! overall: pending ──▶ approved | rejected          (one way)
//!
//! coordinator ──approved──▶ registrar ──approved──▶ instructor ──approved──▶ overall approved
//!      │                        │                        │
//!      └──rejected──────────────┴────────────────────────┴──▶ overall rejected
//!
//! deadline passed while pending ──▶ overall rejected (stages untouched)
//! ```

use chrono::{DateTime, Utc};

use super::domain::{
    Decision, EnrollmentRequest, NotificationDraft, RequestId, RequestStatus, ReviewRole,
    StageStatus, UserId,
};

/// Justification written onto the instructor stage when the deadline rejects a request.
pub const EXPIRY_JUSTIFICATION: &str = "automatically rejected - deadline expired";

/// Errors detected by the engine. None of them leave a partially mutated request behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("request {request} is not awaiting a {role} decision")]
    NotEligible { request: RequestId, role: ReviewRole },
    #[error("a justification is required for a {decision} decision by the {role}")]
    MissingJustification { role: ReviewRole, decision: Decision },
    #[error("decision '{0}' must be either approved or rejected")]
    InvalidDecisionValue(String),
    #[error("'{0}' is not a review role")]
    UnknownRole(String),
}

/// A decision accepted by the engine, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDecision {
    pub request: EnrollmentRequest,
    pub role: ReviewRole,
    pub decision: Decision,
    pub notification: NotificationDraft,
}

/// Whether `role` may record a decision on `request` at `now`.
pub fn can_act(request: &EnrollmentRequest, role: ReviewRole, now: DateTime<Utc>) -> bool {
    if request.status() != RequestStatus::Pending || request.is_expired(now) {
        return false;
    }

    role.preceding()
        .iter()
        .all(|earlier| request.stage(*earlier).status == StageStatus::Approved)
        && request.stage(role).status == StageStatus::Pending
}

/// Eligibility for a role string from untrusted input. Unknown roles are denied rather than raised.
pub fn can_act_as(request: &EnrollmentRequest, raw_role: &str, now: DateTime<Utc>) -> bool {
    ReviewRole::parse(raw_role).is_some_and(|role| can_act(request, role, now))
}

/// The role whose queue currently holds the request, if any.
pub fn eligible_role(request: &EnrollmentRequest, now: DateTime<Utc>) -> Option<ReviewRole> {
    ReviewRole::ordered()
        .into_iter()
        .find(|role| can_act(request, *role, now))
}

/// Rejects a still-pending request whose deadline has passed. Returns whether anything changed.
pub fn recompute_on_expiry(request: &mut EnrollmentRequest, now: DateTime<Utc>) -> bool {
    if request.status() != RequestStatus::Pending || !request.is_expired(now) {
        return false;
    }

    request.set_status(RequestStatus::Rejected);
    let instructor = request.stage_mut(ReviewRole::Instructor);
    if instructor.justification.is_empty() {
        instructor.justification = EXPIRY_JUSTIFICATION.to_string();
    }
    true
}

/// Full recompute of the overall status from the three stage records.
///
/// Terminal requests are left untouched. Returns whether anything changed.
pub fn recompute_status(request: &mut EnrollmentRequest, now: DateTime<Utc>) -> bool {
    if request.status().is_terminal() {
        return false;
    }
    if recompute_on_expiry(request, now) {
        return true;
    }

    let next = derive_status(request);
    if next == RequestStatus::Approved {
        request.mark_approved_at(now);
    }

    let changed = next != request.status();
    request.set_status(next);
    changed
}

fn derive_status(request: &EnrollmentRequest) -> RequestStatus {
    let mut all_approved = true;
    for (_, stage) in request.stages() {
        match stage.status {
            StageStatus::Rejected => return RequestStatus::Rejected,
            StageStatus::Pending => all_approved = false,
            StageStatus::Approved => {}
        }
    }

    if all_approved {
        RequestStatus::Approved
    } else {
        RequestStatus::Pending
    }
}

/// Coordinators always justify; everyone justifies a rejection.
pub fn requires_justification(role: ReviewRole, decision: Decision) -> bool {
    role == ReviewRole::Coordinator || decision == Decision::Rejected
}

pub fn decision_message(role: ReviewRole, decision: Decision) -> String {
    format!("Your request was {} by the {}.", decision.label(), role.label())
}

/// Applies one reviewer decision and returns the next request state plus the requester notice.
pub fn record_decision(
    request: &EnrollmentRequest,
    role: ReviewRole,
    actor: &UserId,
    decision: Decision,
    justification: &str,
    now: DateTime<Utc>,
) -> Result<RecordedDecision, ApprovalError> {
    if !can_act(request, role, now) {
        return Err(ApprovalError::NotEligible {
            request: request.id.clone(),
            role,
        });
    }

    let justification = justification.trim();
    if requires_justification(role, decision) && justification.is_empty() {
        return Err(ApprovalError::MissingJustification { role, decision });
    }

    let mut next = request.clone();
    let stage = next.stage_mut(role);
    stage.status = decision.stage_status();
    stage.decided_by = Some(actor.clone());
    stage.justification = justification.to_string();
    stage.decided_at = Some(now);
    recompute_status(&mut next, now);

    let notification = NotificationDraft {
        recipient: next.student.clone(),
        request: next.id.clone(),
        message: decision_message(role, decision),
    };

    Ok(RecordedDecision {
        request: next,
        role,
        decision,
        notification,
    })
}
