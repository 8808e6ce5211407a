use super::domain::{Application, ApplicationId, ApplicationStatus, CourseId, NewApplication};
use super::query::{ApplicationFilter, ApplicationQuery, Page};

/// Storage abstraction so the service and workflow can be exercised in isolation.
///
/// Implementations must make `create` reject a second active application for the same
/// (email, course) atomically. `update` is a compare-and-set on `revision`: it fails with
/// `StaleState` unless the stored revision equals the one the caller read, and returns the
/// committed record with the next revision.
pub trait ApplicationRepository: Send + Sync {
    fn create(&self, application: NewApplication) -> Result<Application, RepositoryError>;
    fn get(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn find_duplicate(
        &self,
        email: &str,
        course_id: &CourseId,
        statuses: &[ApplicationStatus],
    ) -> Result<Option<Application>, RepositoryError>;
    fn update(&self, application: &Application) -> Result<Application, RepositoryError>;
    fn matching(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, RepositoryError>;

    fn list(&self, query: &ApplicationQuery) -> Result<Page<Application>, RepositoryError> {
        let rows = self.matching(&query.filter)?;
        Ok(query.paginate(rows))
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an active application already exists ({existing_id}, {existing_status})")]
    DuplicateActive {
        existing_id: ApplicationId,
        existing_status: ApplicationStatus,
    },
    #[error("record not found")]
    NotFound,
    #[error("application {id} changed concurrently (read revision {expected}, stored revision {found})")]
    StaleState {
        id: ApplicationId,
        expected: u64,
        found: u64,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
