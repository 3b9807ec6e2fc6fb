use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Course, CourseId, EnrollmentRequest, Notification, NotificationDraft, NotificationId,
    RequestId, ReviewRole, UserId,
};
use super::engine;

/// Storage abstraction for requests so the service can be exercised without a database.
///
/// `update` is a compare-and-swap: it must fail with [`RepositoryError::Conflict`] when the
/// stored version no longer equals `expected_version`.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, request: EnrollmentRequest) -> Result<EnrollmentRequest, RepositoryError>;
    fn update(
        &self,
        request: EnrollmentRequest,
        expected_version: u64,
    ) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<EnrollmentRequest>, RepositoryError>;
    /// Every overall-pending request, newest submission first.
    fn pending(&self) -> Result<Vec<EnrollmentRequest>, RepositoryError>;
    fn submitted_by(&self, student: &UserId) -> Result<Vec<EnrollmentRequest>, RepositoryError>;
    fn decided_by(
        &self,
        actor: &UserId,
        role: ReviewRole,
    ) -> Result<Vec<EnrollmentRequest>, RepositoryError>;
}

/// Read-mostly course catalog.
pub trait CourseCatalog: Send + Sync {
    fn fetch(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError>;
    fn find_by_code(&self, code: &str) -> Result<Option<Course>, RepositoryError>;
    /// Active courses ordered by code.
    fn active(&self) -> Result<Vec<Course>, RepositoryError>;
    /// Looks a course up by code, creating an active entry when missing. The flag reports creation.
    fn get_or_create(&self, seed: CourseSeed) -> Result<(Course, bool), RepositoryError>;
}

/// Side-effect log of decisions addressed to students.
pub trait NotificationStore: Send + Sync {
    fn append(
        &self,
        draft: NotificationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError>;
    /// Most recent notifications for a user, newest first.
    fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RepositoryError>;
    fn mark_read(&self, user: &UserId, ids: &[NotificationId]) -> Result<usize, RepositoryError>;
    fn mark_all_read(&self, user: &UserId) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists or was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Catalog input used for seeding and get-or-create lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSeed {
    pub code: String,
    pub name: String,
    pub description: String,
}

/// Public representation of a request and its stage trail.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub student: UserId,
    pub course: CourseId,
    pub reason: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiting: Option<&'static str>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_file: Option<String>,
    pub stages: Vec<StageView>,
}

impl RequestStatusView {
    pub fn from_request(request: &EnrollmentRequest, now: DateTime<Utc>) -> Self {
        Self {
            request_id: request.id.clone(),
            student: request.student.clone(),
            course: request.course.clone(),
            reason: request.reason.clone(),
            status: request.status().label(),
            awaiting: engine::eligible_role(request, now).map(ReviewRole::label),
            submitted_at: request.submitted_at,
            deadline: request.deadline,
            approved_at: request.approved_at(),
            evidence_file: request.evidence_file_name().map(str::to_string),
            stages: request
                .stages()
                .map(|(role, stage)| StageView {
                    role: role.label(),
                    status: stage.status.label(),
                    decided_by: stage.decided_by.clone(),
                    justification: stage.justification.clone(),
                    decided_at: stage.decided_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub role: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<UserId>,
    pub justification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub notification_id: NotificationId,
    pub request_id: RequestId,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(notification: &Notification) -> Self {
        Self {
            notification_id: notification.id.clone(),
            request_id: notification.request.clone(),
            message: notification.message.clone(),
            read: notification.read,
            created_at: notification.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub course_id: CourseId,
    pub code: String,
    pub name: String,
    pub description: String,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            course_id: course.id.clone(),
            code: course.code.clone(),
            name: course.name.clone(),
            description: course.description.clone(),
        }
    }
}
