use chrono::{DateTime, Utc};
use enrollment_approvals::config::WorkflowConfig;
use enrollment_approvals::workflows::enrollment::{
    Course, CourseCatalog, CourseId, CourseSeed, EnrollmentRequest, EnrollmentService,
    Notification, NotificationDraft, NotificationId, NotificationStore, RepositoryError,
    RequestId, RequestRepository, RequestStatus, ReviewRole, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type AppService =
    EnrollmentService<InMemoryRequestRepository, InMemoryCourseCatalog, InMemoryNotificationStore>;

/// Stores backing one process. Handles are shared with the service so callers can inspect them.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStores {
    pub(crate) requests: Arc<InMemoryRequestRepository>,
    pub(crate) courses: Arc<InMemoryCourseCatalog>,
    pub(crate) notifications: Arc<InMemoryNotificationStore>,
}

impl InMemoryStores {
    pub(crate) fn service(&self, config: WorkflowConfig) -> AppService {
        EnrollmentService::new(
            self.requests.clone(),
            self.courses.clone(),
            self.notifications.clone(),
            config,
        )
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRequestRepository {
    records: Arc<Mutex<HashMap<RequestId, EnrollmentRequest>>>,
}

impl RequestRepository for InMemoryRequestRepository {
    fn insert(&self, request: EnrollmentRequest) -> Result<EnrollmentRequest, RepositoryError> {
        let mut guard = lock(&self.records)?;
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
        let mut guard = lock(&self.records)?;
        let stored = guard.get(&request.id).ok_or(RepositoryError::NotFound)?;
        if stored.version() != expected_version {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(request.id.clone(), request);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<EnrollmentRequest>, RepositoryError> {
        let guard = lock(&self.records)?;
        Ok(guard.get(id).cloned())
    }

    fn pending(&self) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut pending: Vec<EnrollmentRequest> = guard
            .values()
            .filter(|request| request.status() == RequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(pending)
    }

    fn submitted_by(&self, student: &UserId) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut requests: Vec<EnrollmentRequest> = guard
            .values()
            .filter(|request| &request.student == student)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(requests)
    }

    fn decided_by(
        &self,
        actor: &UserId,
        role: ReviewRole,
    ) -> Result<Vec<EnrollmentRequest>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut decided: Vec<EnrollmentRequest> = guard
            .values()
            .filter(|request| request.stage(role).decided_by.as_ref() == Some(actor))
            .cloned()
            .collect();
        decided.sort_by(|a, b| b.stage(role).decided_at.cmp(&a.stage(role).decided_at));
        Ok(decided)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCourseCatalog {
    courses: Arc<Mutex<Vec<Course>>>,
}

impl InMemoryCourseCatalog {
    pub(crate) fn deactivate(&self, code: &str) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.courses)?;
        match guard.iter_mut().find(|course| course.code == code) {
            Some(course) => {
                course.active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl CourseCatalog for InMemoryCourseCatalog {
    fn fetch(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        let guard = lock(&self.courses)?;
        Ok(guard.iter().find(|course| &course.id == id).cloned())
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Course>, RepositoryError> {
        let guard = lock(&self.courses)?;
        Ok(guard.iter().find(|course| course.code == code).cloned())
    }

    fn active(&self) -> Result<Vec<Course>, RepositoryError> {
        let guard = lock(&self.courses)?;
        let mut active: Vec<Course> = guard.iter().filter(|course| course.active).cloned().collect();
        active.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(active)
    }

    fn get_or_create(&self, seed: CourseSeed) -> Result<(Course, bool), RepositoryError> {
        let mut guard = lock(&self.courses)?;
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
pub(crate) struct InMemoryNotificationStore {
    entries: Arc<Mutex<Vec<Notification>>>,
    sequence: Arc<AtomicU64>,
}

impl InMemoryNotificationStore {
    pub(crate) fn unread(&self, user: &UserId) -> Result<usize, RepositoryError> {
        let guard = lock(&self.entries)?;
        Ok(guard
            .iter()
            .filter(|notification| &notification.recipient == user && !notification.read)
            .count())
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn append(
        &self,
        draft: NotificationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Notification, RepositoryError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let notification = draft.into_notification(NotificationId(format!("ntf-{id:06}")), created_at);
        lock(&self.entries)?.push(notification.clone());
        Ok(notification)
    }

    fn recent(&self, user: &UserId, limit: usize) -> Result<Vec<Notification>, RepositoryError> {
        let guard = lock(&self.entries)?;
        Ok(guard
            .iter()
            .rev()
            .filter(|notification| &notification.recipient == user)
            .take(limit)
            .cloned()
            .collect())
    }

    fn mark_read(&self, user: &UserId, ids: &[NotificationId]) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.entries)?;
        let mut marked = 0;
        for notification in guard.iter_mut().filter(|notification| {
            &notification.recipient == user && !notification.read && ids.contains(&notification.id)
        }) {
            notification.read = true;
            marked += 1;
        }
        Ok(marked)
    }

    fn mark_all_read(&self, user: &UserId) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.entries)?;
        let mut marked = 0;
        for notification in guard
            .iter_mut()
            .filter(|notification| &notification.recipient == user && !notification.read)
        {
            notification.read = true;
            marked += 1;
        }
        Ok(marked)
    }
}

pub(crate) fn parse_role(raw: &str) -> Result<ReviewRole, String> {
    ReviewRole::parse(raw).ok_or_else(|| {
        format!("unknown role '{raw}' (expected coordinator, registrar or instructor)")
    })
}
