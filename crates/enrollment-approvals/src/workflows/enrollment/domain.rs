use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::engine::ApprovalError;

/// Identifier wrapper for submitted enrollment requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Reference to an account owned by the surrounding authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reviewer roles, one per stage of the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRole {
    Coordinator,
    Registrar,
    Instructor,
}

impl ReviewRole {
    /// Pipeline order. A stage may only be decided once every earlier stage approved.
    pub const fn ordered() -> [Self; 3] {
        [Self::Coordinator, Self::Registrar, Self::Instructor]
    }

    pub const fn index(self) -> usize {
        match self {
            Self::Coordinator => 0,
            Self::Registrar => 1,
            Self::Instructor => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Registrar => "registrar",
            Self::Instructor => "instructor",
        }
    }

    /// Roles that must have approved before this one may act.
    pub fn preceding(self) -> &'static [Self] {
        static ORDER: [ReviewRole; 3] = ReviewRole::ordered();
        &ORDER[..self.index()]
    }

    /// Lenient lookup for role strings coming from untrusted input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ordered()
            .into_iter()
            .find(|role| role.label() == normalized)
    }
}

impl FromStr for ReviewRole {
    type Err = ApprovalError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| ApprovalError::UnknownRole(raw.to_string()))
    }
}

impl fmt::Display for ReviewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl StageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Aggregate outcome of a request, derived from its stage records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome a reviewer may record on their stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub const fn stage_status(self) -> StageStatus {
        match self {
            Self::Approved => StageStatus::Approved,
            Self::Rejected => StageStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ApprovalError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            _ => Err(ApprovalError::InvalidDecisionValue(raw.to_string())),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One reviewer's slot on a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    pub decided_by: Option<UserId>,
    pub justification: String,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Supporting document uploaded with a request. Storage itself is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAttachment {
    pub storage_key: String,
}

impl EvidenceAttachment {
    pub fn file_name(&self) -> &str {
        self.storage_key
            .rsplit('/')
            .next()
            .unwrap_or(&self.storage_key)
    }
}

/// Aggregate root of the approval workflow.
///
/// The overall status, stage records and final approval timestamp are only
/// writable through the engine; everything else is fixed at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub id: RequestId,
    pub student: UserId,
    pub course: CourseId,
    pub reason: String,
    pub evidence: Option<EvidenceAttachment>,
    pub submitted_at: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    status: RequestStatus,
    stages: [StageRecord; 3],
    approved_at: Option<DateTime<Utc>>,
    version: u64,
}

impl EnrollmentRequest {
    /// Fresh request with every stage pending. A `review_window` of `None` leaves the deadline unset.
    pub fn new(
        id: RequestId,
        student: UserId,
        course: CourseId,
        reason: impl Into<String>,
        submitted_at: DateTime<Utc>,
        review_window: Option<Duration>,
    ) -> Self {
        Self {
            id,
            student,
            course,
            reason: reason.into(),
            evidence: None,
            submitted_at,
            deadline: review_window.map(|window| submitted_at + window),
            status: RequestStatus::Pending,
            stages: Default::default(),
            approved_at: None,
            version: 0,
        }
    }

    pub fn with_evidence(mut self, evidence: Option<EvidenceAttachment>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn stage(&self, role: ReviewRole) -> &StageRecord {
        &self.stages[role.index()]
    }

    /// Stage records in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = (ReviewRole, &StageRecord)> + '_ {
        ReviewRole::ordered()
            .into_iter()
            .map(move |role| (role, &self.stages[role.index()]))
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    /// Monotonic revision used by stores for compare-and-swap updates.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }

    pub fn has_evidence(&self) -> bool {
        self.evidence.is_some()
    }

    pub fn evidence_file_name(&self) -> Option<&str> {
        self.evidence.as_ref().map(EvidenceAttachment::file_name)
    }

    pub(crate) fn stage_mut(&mut self, role: ReviewRole) -> &mut StageRecord {
        &mut self.stages[role.index()]
    }

    pub(crate) fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
    }

    pub(crate) fn mark_approved_at(&mut self, now: DateTime<Utc>) {
        if self.approved_at.is_none() {
            self.approved_at = Some(now);
        }
    }

    pub(crate) fn advance_version(&mut self) {
        self.version += 1;
    }
}

/// Catalog entry a request refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub active: bool,
}

/// Message recorded for a student whenever a reviewer decides on their request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub request: RequestId,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification content produced by the engine before a store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub recipient: UserId,
    pub request: RequestId,
    pub message: String,
}

impl NotificationDraft {
    pub fn into_notification(self, id: NotificationId, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            recipient: self.recipient,
            request: self.request,
            message: self.message,
            read: false,
            created_at,
        }
    }
}
