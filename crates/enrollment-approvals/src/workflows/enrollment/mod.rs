//! Enrollment requests and their coordinator → registrar → instructor approval pipeline.
//!
//! `engine` holds the pure state machine; `service` wraps it with the persistence seams from
//! `repository`, and `router` exposes the service over HTTP.

pub mod catalog;
pub mod domain;
pub mod engine;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use catalog::{seed, standard_courses, SeedReport};
pub use domain::{
    Course, CourseId, Decision, EnrollmentRequest, EvidenceAttachment, Notification,
    NotificationDraft, NotificationId, RequestId, RequestStatus, ReviewRole, StageRecord,
    StageStatus, UserId,
};
pub use engine::{ApprovalError, RecordedDecision, EXPIRY_JUSTIFICATION};
pub use repository::{
    CourseCatalog, CourseSeed, CourseView, NotificationStore, NotificationView, RepositoryError,
    RequestRepository, RequestStatusView, StageView,
};
pub use router::enrollment_router;
pub use service::{
    DecisionOutcome, DecisionSubmission, EnrollmentService, EnrollmentServiceError,
    RequestSubmission, ReviewerDashboard, StudentDashboard,
};
