use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::enrollment::domain::{
    Course, CourseId, EnrollmentRequest, EvidenceAttachment, Notification, NotificationDraft,
    NotificationId, RequestId, RequestStatus, ReviewRole, UserId,
};
use crate::workflows::enrollment::repository::{
    CourseCatalog, CourseSeed, NotificationStore, RepositoryError, RequestRepository,
};
use crate::workflows::enrollment::service::{
    DecisionSubmission, EnrollmentService, RequestSubmission,
};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn student() -> UserId {
    UserId("student-ana".to_string())
}

pub(super) fn coordinator() -> UserId {
    UserId("coord-bruno".to_string())
}

pub(super) fn registrar() -> UserId {
    UserId("registrar-carla".to_string())
}

pub(super) fn instructor() -> UserId {
    UserId("instructor-davi".to_string())
}

pub(super) fn actor_for(role: ReviewRole) -> UserId {
    match role {
        ReviewRole::Coordinator => coordinator(),
        ReviewRole::Registrar => registrar(),
        ReviewRole::Instructor => instructor(),
    }
}

/// Request submitted at `now()` with the default seven day window.
pub(super) fn open_request() -> EnrollmentRequest {
    request_submitted_at(now(), Some(Duration::days(7)))
}

pub(super) fn request_submitted_at(
    submitted_at: DateTime<Utc>,
    window: Option<Duration>,
) -> EnrollmentRequest {
    EnrollmentRequest::new(
        RequestId("req-test".to_string()),
        student(),
        CourseId("crs-001".to_string()),
        "Schedule conflict with a mandatory lab",
        submitted_at,
        window,
    )
}

pub(super) fn course(id: &str, code: &str, active: bool) -> Course {
    Course {
        id: CourseId(id.to_string()),
        code: code.to_string(),
        name: format!("{code} course"),
        description: String::new(),
        active,
    }
}

pub(super) fn active_course_id() -> CourseId {
    CourseId("crs-001".to_string())
}

pub(super) fn inactive_course_id() -> CourseId {
    CourseId("crs-002".to_string())
}

pub(super) fn submission() -> RequestSubmission {
    RequestSubmission {
        student: student(),
        course: active_course_id(),
        reason: "Need the course to graduate this semester".to_string(),
        evidence: Some(EvidenceAttachment {
            storage_key: "requests/2025/03/transcript.pdf".to_string(),
        }),
    }
}

pub(super) fn decision(role: ReviewRole, decision: &str, justification: &str) -> DecisionSubmission {
    DecisionSubmission {
        role: role.label().to_string(),
        actor: actor_for(role),
        decision: decision.to_string(),
        justification: justification.to_string(),
    }
}

pub(super) type TestService = EnrollmentService<MemoryRequests, MemoryCourses, MemoryNotifications>;

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryRequests>,
    Arc<MemoryNotifications>,
) {
    let requests = Arc::new(MemoryRequests::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = EnrollmentService::new(
        requests.clone(),
        Arc::new(default_catalog()),
        notifications.clone(),
        WorkflowConfig::default(),
    );
    (service, requests, notifications)
}

pub(super) fn default_catalog() -> MemoryCourses {
    MemoryCourses::with_courses(vec![
        course("crs-001", "ALG001", true),
        course("crs-002", "LEGACY01", false),
    ])
}

#[derive(Default, Clone)]
pub(super) struct MemoryRequests {
    pub(super) records: Arc<Mutex<HashMap<RequestId, EnrollmentRequest>>>,
}

impl MemoryRequests {
    pub(super) fn stored(&self, id: &RequestId) -> EnrollmentRequest {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("request stored")
    }
}

impl RequestRepository for MemoryRequests {
    fn insert(&self, request: EnrollmentRequest) -> Result<EnrollmentRequest, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update(
        &self,
        request: EnrollmentRequest,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard.get(&request.id).ok_or(RepositoryError::NotFound)?;
        if stored.version() != expected_version {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<EnrollmentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn pending(&self) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut pending: Vec<EnrollmentRequest> = guard
            .values()
            .filter(|request| request.status() == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(pending)
    }

    fn submitted_by(&self, student: &UserId) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|request| &request.student == student)
            .cloned()
            .collect())
    }

    fn decided_by(
        &self,
        actor: &UserId,
        role: ReviewRole,
    ) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|request| request.stage(role).decided_by.as_ref() == Some(actor))
            .cloned()
            .collect())
    }
}

type Interference = Box<dyn FnOnce(&mut EnrollmentRequest) + Send>;

/// Request store that lets a simulated concurrent writer land just before the next update.
#[derive(Default)]
pub(super) struct RacingRequests {
    pub(super) inner: MemoryRequests,
    interference: Mutex<Vec<Interference>>,
}

impl RacingRequests {
    pub(super) fn interfere(&self, change: impl FnOnce(&mut EnrollmentRequest) + Send + 'static) {
        self.interference
            .lock()
            .expect("interference mutex poisoned")
            .push(Box::new(change));
    }
}

impl RequestRepository for RacingRequests {
    fn insert(&self, request: EnrollmentRequest) -> Result<EnrollmentRequest, RepositoryError> {
        self.inner.insert(request)
    }

    fn update(
        &self,
        request: EnrollmentRequest,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let pending_change = self
            .interference
            .lock()
            .expect("interference mutex poisoned")
            .pop();
        if let Some(change) = pending_change {
            let mut guard = self.inner.records.lock().expect("repository mutex poisoned");
            if let Some(stored) = guard.get_mut(&request.id) {
                change(&mut *stored);
                stored.advance_version();
            }
        }
        self.inner.update(request, expected_version)
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<EnrollmentRequest>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn pending(&self) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        self.inner.pending()
    }

    fn submitted_by(&self, student: &UserId) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        self.inner.submitted_by(student)
    }

    fn decided_by(
        &self,
        actor: &UserId,
        role: ReviewRole,
    ) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        self.inner.decided_by(actor, role)
    }
}

pub(super) struct UnavailableRequests;

impl RequestRepository for UnavailableRequests {
    fn insert(&self, _request: EnrollmentRequest) -> Result<EnrollmentRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _request: EnrollmentRequest,
        _expected_version: u64,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<EnrollmentRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn pending(&self) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn submitted_by(&self, _student: &UserId) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn decided_by(
        &self,
        _actor: &UserId,
        _role: ReviewRole,
    ) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryCourses {
    courses: Arc<Mutex<Vec<Course>>>,
}

impl MemoryCourses {
    pub(super) fn with_courses(courses: Vec<Course>) -> Self {
        Self {
            courses: Arc::new(Mutex::new(courses)),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.courses.lock().expect("catalog mutex poisoned").len()
    }
}

impl CourseCatalog for MemoryCourses {
    fn fetch(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        let guard = self.courses.lock().expect("catalog mutex poisoned");
        Ok(guard.iter().find(|course| &course.id == id).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Course>, RepositoryError> {
        let guard = self.courses.lock().expect("catalog mutex poisoned");
        Ok(guard.iter().find(|course| course.code == code).cloned())
    }

    fn active(&self) -> Result<Vec<Course>, RepositoryError> {
        let guard = self.courses.lock().expect("catalog mutex poisoned");
        let mut active: Vec<Course> = guard.iter().filter(|course| course.active).cloned().collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    fn get_or_create(&self, seed: CourseSeed) -> Result<(Course, bool), RepositoryError> {
        let mut guard = self.courses.lock().expect("catalog mutex poisoned");
        if let Some(existing) = guard.iter().find(|course| course.code == seed.code) {
            return Ok((existing.clone(), false));
        }
        let course = Course {
            id: CourseId(format!("crs-{:03}", guard.len() + 1)),
            code: seed.code,
            name: seed.name,
            description: seed.description,
            active: true,
        };
        guard.push(course.clone());
        Ok((course, true))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifications {
    entries: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.entries.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationStore for MemoryNotifications {
    fn append(
        &self,
        draft: NotificationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        let id = NotificationId(format!("ntf-{:04}", guard.len() + 1));
        let notification = draft.into_notification(id, created_at);
        guard.push(notification.clone());
        Ok(notification)
    }

    fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RepositoryError> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|notification| &notification.recipient == user)
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_read(&self, user: &UserId, ids: &[NotificationId]) -> Result<usize, RepositoryError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        let mut marked = 0;
        for notification in guard.iter_mut() {
            if &notification.recipient == user && !notification.read && ids.contains(&notification.id)
            {
                notification.read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    fn mark_all_read(&self, user: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        let mut marked = 0;
        for notification in guard.iter_mut() {
            if &notification.recipient == user && !notification.read {
                notification.read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }
}

pub(super) struct UnavailableNotifications;

impl NotificationStore for UnavailableNotifications {
    fn append(
        &self,
        _draft: NotificationDraft,
        _created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        Err(RepositoryError::Unavailable("notification log offline".to_string()))
    }

    fn recent(&self, _user: &UserId, _limit: usize) -> Result<Vec<Notification>, RepositoryError> {
        Err(RepositoryError::Unavailable("notification log offline".to_string()))
    }

    fn mark_read(&self, _user: &UserId, _ids: &[NotificationId]) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("notification log offline".to_string()))
    }

    fn mark_all_read(&self, _user: &UserId) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("notification log offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
