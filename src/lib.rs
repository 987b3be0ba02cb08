//! Semester data cache and write-lock evaluation.
//!
//! Keeps the list of selectable semesters, the backend's current semester and
//! per-semester lifecycle statuses cached per execution context, shares
//! invalidations between contexts, and decides whether a selected semester
//! still accepts changes.

pub mod cache;
pub mod domain;
pub mod error;
pub mod facade;
pub mod lock;
pub mod provider;
pub mod signal;

pub use cache::{CachedStatus, OptionsCache, OptionsSnapshot, StatusCache};
pub use error::FetchError;
pub use facade::SemesterData;
pub use lock::is_writable;
pub use provider::{PersistentStore, SemesterSource};
pub use signal::{SignalBus, SignalMedium, Subscription, Token, Topic};
