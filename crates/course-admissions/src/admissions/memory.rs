//! Mutex-backed collaborators for local runs, demos, and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::collaborators::{
    CatalogError, CourseCatalog, DirectoryError, IdentityDirectory, Notification,
    NotificationFailure, Notifier, ProvisionedUser, UserProfile,
};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Course, CourseId, EnrollmentId,
    NewApplication, UserId,
};
use super::query::ApplicationFilter;
use super::repository::{ApplicationRepository, RepositoryError};
use crate::config::AdmissionsConfig;

#[derive(Default)]
struct RepositoryState {
    records: BTreeMap<ApplicationId, Application>,
    next_id: u64,
}

impl RepositoryState {
    fn active_conflict(
        &self,
        email: &str,
        course_id: &CourseId,
        ignore: Option<&ApplicationId>,
    ) -> Option<&Application> {
        self.records.values().find(|record| {
            Some(&record.id) != ignore
                && record.status.is_active()
                && &record.course_id == course_id
                && record.applicant.email == email
        })
    }
}

/// In-process store enforcing one active application per (email, course) under its lock.
#[derive(Default, Clone)]
pub struct MemoryApplicationRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl MemoryApplicationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, RepositoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApplicationRepository for MemoryApplicationRepository {
    fn create(&self, application: NewApplication) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.active_conflict(
            &application.applicant.email,
            &application.course_id,
            None,
        ) {
            return Err(RepositoryError::DuplicateActive {
                existing_id: existing.id.clone(),
                existing_status: existing.status,
            });
        }

        state.next_id += 1;
        let id = ApplicationId(format!("app-{:06}", state.next_id));
        let record = Application::from_new(id.clone(), application);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.records.get(id).cloned())
    }

    fn find_duplicate(
        &self,
        email: &str,
        course_id: &CourseId,
        statuses: &[ApplicationStatus],
    ) -> Result<Option<Application>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|record| {
                statuses.contains(&record.status)
                    && &record.course_id == course_id
                    && record.applicant.email == email
            })
            .min_by_key(|record| record.created_at)
            .cloned())
    }

    fn update(&self, application: &Application) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        let current = state
            .records
            .get(&application.id)
            .ok_or(RepositoryError::NotFound)?;

        if current.revision != application.revision {
            return Err(RepositoryError::StaleState {
                id: application.id.clone(),
                expected: application.revision,
                found: current.revision,
            });
        }

        if application.status.is_active() {
            if let Some(existing) = state.active_conflict(
                &application.applicant.email,
                &application.course_id,
                Some(&application.id),
            ) {
                return Err(RepositoryError::DuplicateActive {
                    existing_id: existing.id.clone(),
                    existing_status: existing.status,
                });
            }
        }

        let mut committed = application.clone();
        committed.revision += 1;
        state
            .records
            .insert(committed.id.clone(), committed.clone());
        Ok(committed)
    }

    fn matching(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct DirectoryState {
    users: HashMap<String, UserId>,
    enrollments: BTreeMap<String, (UserId, CourseId)>,
    next_user: u64,
    next_enrollment: u64,
}

/// Account and enrollment registry keyed by lower-cased email.
#[derive(Default, Clone)]
pub struct MemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl MemoryDirectory {
    fn lock(&self) -> Result<MutexGuard<'_, DirectoryState>, DirectoryError> {
        self.state
            .lock()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".to_string()))
    }

    pub fn enrollments_for(&self, course_id: &CourseId) -> Vec<UserId> {
        self.lock()
            .map(|state| {
                state
                    .enrollments
                    .values()
                    .filter(|(_, course)| course == course_id)
                    .map(|(user, _)| user.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn user_count(&self) -> usize {
        self.lock().map(|state| state.users.len()).unwrap_or(0)
    }
}

impl IdentityDirectory for MemoryDirectory {
    fn get_or_create_user(
        &self,
        email: &str,
        _profile: &UserProfile,
    ) -> Result<ProvisionedUser, DirectoryError> {
        let mut state = self.lock()?;
        let key = email.trim().to_lowercase();
        if let Some(user_id) = state.users.get(&key) {
            return Ok(ProvisionedUser {
                user_id: user_id.clone(),
                created: false,
                temp_password: None,
            });
        }

        state.next_user += 1;
        let user_id = UserId(format!("user-{:06}", state.next_user));
        let temp_password = format!("welcome-{:06}", state.next_user);
        state.users.insert(key, user_id.clone());
        Ok(ProvisionedUser {
            user_id,
            created: true,
            temp_password: Some(temp_password),
        })
    }

    fn create_enrollment(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<EnrollmentId, DirectoryError> {
        let mut state = self.lock()?;
        let already = state
            .enrollments
            .values()
            .any(|(user, course)| user == user_id && course == course_id);
        if already {
            return Err(DirectoryError::AlreadyEnrolled {
                user_id: user_id.clone(),
                course_id: course_id.clone(),
            });
        }

        state.next_enrollment += 1;
        let id = format!("enr-{:06}", state.next_enrollment);
        state
            .enrollments
            .insert(id.clone(), (user_id.clone(), course_id.clone()));
        Ok(EnrollmentId(id))
    }

    fn remove_enrollment(&self, enrollment_id: &EnrollmentId) -> Result<(), DirectoryError> {
        self.lock()?.enrollments.remove(&enrollment_id.0);
        Ok(())
    }
}

/// Records notifications instead of delivering them.
#[derive(Default, Clone)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryOutbox {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for MemoryOutbox {
    fn notify(&self, notification: Notification) -> Result<(), NotificationFailure> {
        let mut sent = self.sent.lock().map_err(|_| NotificationFailure {
            template: notification.kind.template(),
            recipient: notification.recipient.clone(),
            reason: "outbox lock poisoned".to_string(),
        })?;
        sent.push(notification);
        Ok(())
    }
}

/// Fixed set of course offerings.
#[derive(Debug, Default, Clone)]
pub struct StaticCourseCatalog {
    courses: BTreeMap<CourseId, Course>,
}

impl StaticCourseCatalog {
    pub fn new(courses: impl IntoIterator<Item = Course>) -> Self {
        Self {
            courses: courses
                .into_iter()
                .map(|course| (course.id.clone(), course))
                .collect(),
        }
    }

    /// Seed every configured course with the shared regional bonus list.
    pub fn from_config(config: &AdmissionsConfig) -> Self {
        Self::new(config.courses.iter().map(|seed| Course {
            id: CourseId(seed.id.clone()),
            title: seed.title.clone(),
            regional_bonus_countries: config.regional_bonus_countries.clone(),
        }))
    }

    pub fn courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.values()
    }
}

impl CourseCatalog for StaticCourseCatalog {
    fn get_course(&self, course_id: &CourseId) -> Result<Course, CatalogError> {
        self.courses
            .get(course_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(course_id.clone()))
    }
}
