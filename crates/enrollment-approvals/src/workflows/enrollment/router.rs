use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{NotificationId, RequestId, ReviewRole, UserId};
use super::engine::ApprovalError;
use super::repository::{
    CourseCatalog, CourseView, NotificationStore, NotificationView, RepositoryError,
    RequestRepository, RequestStatusView,
};
use super::service::{
    DecisionSubmission, EnrollmentService, EnrollmentServiceError, RequestSubmission,
};

type SharedService<R, C, N> = Arc<EnrollmentService<R, C, N>>;

/// Router builder exposing submission, review and notification endpoints.
pub fn enrollment_router<R, C, N>(service: Arc<EnrollmentService<R, C, N>>) -> Router
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    Router::new()
        .route("/api/v1/enrollment/courses", get(courses_handler::<R, C, N>))
        .route("/api/v1/enrollment/requests", post(submit_handler::<R, C, N>))
        .route(
            "/api/v1/enrollment/requests/:request_id",
            get(status_handler::<R, C, N>),
        )
        .route(
            "/api/v1/enrollment/requests/:request_id/decisions",
            post(decision_handler::<R, C, N>),
        )
        .route(
            "/api/v1/enrollment/reviewers/:role/dashboard",
            get(reviewer_dashboard_handler::<R, C, N>),
        )
        .route(
            "/api/v1/enrollment/students/:student_id/dashboard",
            get(student_dashboard_handler::<R, C, N>),
        )
        .route(
            "/api/v1/enrollment/students/:student_id/notifications/read",
            post(mark_read_handler::<R, C, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewerQuery {
    pub(crate) actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarkReadRequest {
    #[serde(default)]
    pub(crate) notification_ids: Vec<NotificationId>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DecisionResponse {
    pub(crate) role: &'static str,
    pub(crate) decision: &'static str,
    pub(crate) request: RequestStatusView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notification: Option<NotificationView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReviewerDashboardView {
    pub(crate) role: &'static str,
    pub(crate) actor: UserId,
    pub(crate) pending: Vec<RequestStatusView>,
    pub(crate) decided: Vec<RequestStatusView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentDashboardView {
    pub(crate) student: UserId,
    pub(crate) unread: usize,
    pub(crate) requests: Vec<RequestStatusView>,
    pub(crate) notifications: Vec<NotificationView>,
}

/// HTTP status for a workflow error, shared by the handlers and `AppError`.
pub(crate) fn status_for(error: &EnrollmentServiceError) -> StatusCode {
    match error {
        EnrollmentServiceError::Approval(ApprovalError::NotEligible { .. }) => StatusCode::CONFLICT,
        EnrollmentServiceError::Approval(ApprovalError::MissingJustification { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EnrollmentServiceError::Approval(ApprovalError::InvalidDecisionValue(_)) => {
            StatusCode::BAD_REQUEST
        }
        EnrollmentServiceError::Approval(ApprovalError::UnknownRole(_)) => StatusCode::FORBIDDEN,
        EnrollmentServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EnrollmentServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        EnrollmentServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EnrollmentServiceError::UnknownCourse(_)
        | EnrollmentServiceError::InactiveCourse(_)
        | EnrollmentServiceError::EmptyReason => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(error: EnrollmentServiceError) -> Response {
    let status = status_for(&error);
    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn courses_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    match service.active_courses() {
        Ok(courses) => {
            let views: Vec<CourseView> = courses.iter().map(CourseView::from).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Json(submission): Json<RequestSubmission>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    let now = Utc::now();
    match service.submit(submission, now) {
        Ok(request) => {
            let view = RequestStatusView::from_request(&request, now);
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    let now = Utc::now();
    match service.get(&RequestId(request_id), now) {
        Ok(request) => {
            let view = RequestStatusView::from_request(&request, now);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Path(request_id): Path<String>,
    Json(submission): Json<DecisionSubmission>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    let now = Utc::now();
    match service.decide(&RequestId(request_id), submission, now) {
        Ok(outcome) => {
            let body = DecisionResponse {
                role: outcome.role.label(),
                decision: outcome.decision.label(),
                request: RequestStatusView::from_request(&outcome.request, now),
                notification: outcome.notification.as_ref().map(NotificationView::from),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reviewer_dashboard_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Path(role): Path<String>,
    Query(query): Query<ReviewerQuery>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    let role = match role.parse::<ReviewRole>() {
        Ok(role) => role,
        Err(error) => return error_response(error.into()),
    };

    let now = Utc::now();
    match service.reviewer_dashboard(role, &UserId(query.actor), now) {
        Ok(dashboard) => {
            let view = ReviewerDashboardView {
                role: dashboard.role.label(),
                actor: dashboard.actor,
                pending: dashboard
                    .pending
                    .iter()
                    .map(|request| RequestStatusView::from_request(request, now))
                    .collect(),
                decided: dashboard
                    .decided
                    .iter()
                    .map(|request| RequestStatusView::from_request(request, now))
                    .collect(),
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn student_dashboard_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    let now = Utc::now();
    match service.student_dashboard(&UserId(student_id), now) {
        Ok(dashboard) => {
            let view = StudentDashboardView {
                student: dashboard.student,
                unread: dashboard
                    .notifications
                    .iter()
                    .filter(|notification| !notification.read)
                    .count(),
                requests: dashboard
                    .requests
                    .iter()
                    .map(|request| RequestStatusView::from_request(request, now))
                    .collect(),
                notifications: dashboard
                    .notifications
                    .iter()
                    .map(NotificationView::from)
                    .collect(),
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn mark_read_handler<R, C, N>(
    State(service): State<SharedService<R, C, N>>,
    Path(student_id): Path<String>,
    Json(body): Json<MarkReadRequest>,
) -> Response
where
    R: RequestRepository + 'static,
    C: CourseCatalog + 'static,
    N: NotificationStore + 'static,
{
    match service.mark_notifications_read(&UserId(student_id), &body.notification_ids) {
        Ok(marked) => (StatusCode::OK, Json(json!({ "marked": marked }))).into_response(),
        Err(error) => error_response(error),
    }
}
