use async_trait::async_trait;

use crate::domain::{CurrentSemester, SemesterOption, SemesterStatusRecord};
use crate::error::FetchError;

/// Key/value storage scoped to one execution context.
///
/// Every operation is best effort: an unavailable medium reads as absent and
/// silently drops writes. The in-memory caches stay authoritative for the
/// running session either way.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// The three read endpoints the caches sit in front of.
#[async_trait]
pub trait SemesterSource: Send + Sync {
    /// Selectable semesters in display order.
    async fn options(&self) -> Result<Vec<SemesterOption>, FetchError>;

    /// The globally active semester, if the backend has resolved one.
    async fn current(&self) -> Result<Option<CurrentSemester>, FetchError>;

    /// Status of `key`. `None` means the backend had nothing to say about it.
    async fn status(&self, key: &str) -> Result<Option<SemesterStatusRecord>, FetchError>;
}
