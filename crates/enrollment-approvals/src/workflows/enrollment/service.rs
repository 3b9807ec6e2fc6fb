use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::domain::{
    Course, CourseId, Decision, EnrollmentRequest, EvidenceAttachment, Notification,
    NotificationId, RequestId, ReviewRole, UserId,
};
use super::engine::{self, ApprovalError};
use super::repository::{CourseCatalog, NotificationStore, RepositoryError, RequestRepository};
use crate::config::WorkflowConfig;

const DECISION_ATTEMPTS: usize = 3;
const STUDENT_NOTIFICATION_LIMIT: usize = 10;

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

/// Payload a student sends to open a request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestSubmission {
    pub student: UserId,
    pub course: CourseId,
    pub reason: String,
    #[serde(default)]
    pub evidence: Option<EvidenceAttachment>,
}

/// Raw reviewer input. Role and decision stay strings until the service validates them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecisionSubmission {
    pub role: String,
    pub actor: UserId,
    pub decision: String,
    #[serde(default)]
    pub justification: String,
}

/// Persisted result of a successful decision.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub request: EnrollmentRequest,
    pub role: ReviewRole,
    pub decision: Decision,
    /// `None` when the decision was stored but the notification log refused the append.
    pub notification: Option<Notification>,
}

#[derive(Debug, Clone)]
pub struct ReviewerDashboard {
    pub role: ReviewRole,
    pub actor: UserId,
    /// Requests currently in this role's queue.
    pub pending: Vec<EnrollmentRequest>,
    /// Requests the actor already decided in this role.
    pub decided: Vec<EnrollmentRequest>,
}

#[derive(Debug, Clone)]
pub struct StudentDashboard {
    pub student: UserId,
    pub requests: Vec<EnrollmentRequest>,
    /// Snapshot taken before the dashboard marked them read.
    pub notifications: Vec<Notification>,
}

/// Service composing the request store, course catalog, notification log and approval engine.
pub struct EnrollmentService<R, C, N> {
    requests: Arc<R>,
    courses: Arc<C>,
    notifications: Arc<N>,
    config: WorkflowConfig,
}

impl<R, C, N> EnrollmentService<R, C, N>
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    pub fn new(
        requests: Arc<R>,
        courses: Arc<C>,
        notifications: Arc<N>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            requests,
            courses,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Open a new request against an active course. The deadline is `now` plus the review window.
    pub fn submit(
        &self,
        submission: RequestSubmission,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRequest, EnrollmentServiceError> {
        let RequestSubmission {
            student,
            course,
            reason,
            evidence,
        } = submission;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EnrollmentServiceError::EmptyReason);
        }

        let course = self
            .courses
            .fetch(&course)?
            .ok_or(EnrollmentServiceError::UnknownCourse(course))?;
        if !course.active {
            return Err(EnrollmentServiceError::InactiveCourse(course.code));
        }

        let request = EnrollmentRequest::new(
            next_request_id(),
            student,
            course.id,
            reason,
            now,
            Some(self.config.review_window()),
        )
        .with_evidence(evidence);

        let stored = self.requests.insert(request)?;
        info!(
            request_id = %stored.id,
            student = %stored.student,
            course = %course.code,
            "enrollment request submitted"
        );
        Ok(stored)
    }

    /// Fetch a request, applying any pending recompute before returning it.
    pub fn get(
        &self,
        request_id: &RequestId,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRequest, EnrollmentServiceError> {
        let request = self
            .requests
            .fetch(request_id)?
            .ok_or(RepositoryError::NotFound)?;
        self.refresh(request, now)
    }

    pub fn reviewer_dashboard(
        &self,
        role: ReviewRole,
        actor: &UserId,
        now: DateTime<Utc>,
    ) -> Result<ReviewerDashboard, EnrollmentServiceError> {
        let mut pending = Vec::new();
        for request in self.requests.pending()? {
            let request = self.refresh(request, now)?;
            if engine::can_act(&request, role, now) {
                pending.push(request);
            }
        }

        let decided = self.requests.decided_by(actor, role)?;

        Ok(ReviewerDashboard {
            role,
            actor: actor.clone(),
            pending,
            decided,
        })
    }

    /// The student's requests and latest notifications. Viewing marks their notifications read.
    pub fn student_dashboard(
        &self,
        student: &UserId,
        now: DateTime<Utc>,
    ) -> Result<StudentDashboard, EnrollmentServiceError> {
        let requests = self
            .requests
            .submitted_by(student)?
            .into_iter()
            .map(|request| self.refresh(request, now))
            .collect::<Result<Vec<_>, _>>()?;

        let notifications = self
            .notifications
            .recent(student, STUDENT_NOTIFICATION_LIMIT)?;
        let marked = self.notifications.mark_all_read(student)?;
        debug!(student = %student, marked, "student notifications marked read");

        Ok(StudentDashboard {
            student: student.clone(),
            requests,
            notifications,
        })
    }

    /// Record a reviewer decision.
    ///
    /// Read, eligibility check and write form one unit: the write is conditional on the
    /// version that was read, and a lost race re-runs the whole unit so the loser observes
    /// the winner's state (normally as `NotEligible`).
    pub fn decide(
        &self,
        request_id: &RequestId,
        submission: DecisionSubmission,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, EnrollmentServiceError> {
        let role: ReviewRole = submission.role.parse()?;

        for attempt in 1..=DECISION_ATTEMPTS {
            let fetched = self
                .requests
                .fetch(request_id)?
                .ok_or(RepositoryError::NotFound)?;
            let current = self.refresh(fetched, now)?;
            let expected_version = current.version();

            if !engine::can_act(&current, role, now) {
                if current.is_expired(now) {
                    warn!(request_id = %current.id, role = %role, "decision arrived after the deadline");
                }
                return Err(ApprovalError::NotEligible {
                    request: current.id.clone(),
                    role,
                }
                .into());
            }

            let decision: Decision = submission.decision.parse()?;
            let recorded = engine::record_decision(
                &current,
                role,
                &submission.actor,
                decision,
                &submission.justification,
                now,
            )?;

            let mut next = recorded.request;
            next.advance_version();
            match self.requests.update(next.clone(), expected_version) {
                Ok(()) => {
                    let notification = match self.notifications.append(recorded.notification, now)
                    {
                        Ok(notification) => Some(notification),
                        Err(err) => {
                            warn!(
                                request_id = %next.id,
                                error = %err,
                                "decision stored but notification could not be recorded"
                            );
                            None
                        }
                    };
                    info!(
                        request_id = %next.id,
                        role = %role,
                        decision = %decision,
                        status = next.status().label(),
                        "decision recorded"
                    );
                    return Ok(DecisionOutcome {
                        request: next,
                        role,
                        decision,
                        notification,
                    });
                }
                Err(RepositoryError::Conflict) => {
                    warn!(request_id = %request_id, attempt, "request changed during decision; retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(RepositoryError::Conflict.into())
    }

    pub fn mark_notifications_read(
        &self,
        user: &UserId,
        ids: &[NotificationId],
    ) -> Result<usize, EnrollmentServiceError> {
        Ok(self.notifications.mark_read(user, ids)?)
    }

    pub fn active_courses(&self) -> Result<Vec<Course>, EnrollmentServiceError> {
        Ok(self.courses.active()?)
    }

    /// Applies the recompute rule and persists the result when it changed anything.
    fn refresh(
        &self,
        mut request: EnrollmentRequest,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentRequest, EnrollmentServiceError> {
        let expected_version = request.version();
        if !engine::recompute_status(&mut request, now) {
            return Ok(request);
        }

        if request.is_expired(now) {
            info!(request_id = %request.id, "deadline passed; request rejected");
        }

        request.advance_version();
        match self.requests.update(request.clone(), expected_version) {
            Ok(()) => Ok(request),
            Err(RepositoryError::Conflict) => {
                debug!(request_id = %request.id, "request changed during refresh; reloading");
                let latest = self
                    .requests
                    .fetch(&request.id)?
                    .ok_or(RepositoryError::NotFound)?;
                Ok(latest)
            }
            Err(other) => Err(other.into()),
        }
    }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("course {0} does not exist")]
    UnknownCourse(CourseId),
    #[error("course {0} is not accepting enrollment requests")]
    InactiveCourse(String),
    #[error("a reason is required to submit an enrollment request")]
    EmptyReason,
}
