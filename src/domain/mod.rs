mod backend;
mod config;
mod paths;
mod semester;
mod store;

pub use backend::BackendFile;
pub use config::{AllOptionPolicy, Config};
pub use paths::{BackendDataFile, ContextDir, StoreDataFile};
pub use semester::{
    CurrentSemester, LifecycleState, Ordinal, SemesterIdentity, SemesterOption,
    SemesterStatusRecord,
};
pub use store::{FileStore, MemoryStore, CURRENT_KEY, OPTIONS_KEY, SELECTED_KEY, STATUS_KEY};
