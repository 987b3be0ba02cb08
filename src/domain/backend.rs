use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::FetchError;
use crate::provider::SemesterSource;

use super::{
    paths::{BackendDataFile, ReadDO},
    semester::{CurrentSemester, LifecycleState, SemesterIdentity, SemesterOption, SemesterStatusRecord},
};

/// Backend answers kept in a TOML file, re-read on every request so edits
/// show up without restarting anything.
///
/// ```toml
/// current = "1-2025"
///
/// [[options]]
/// value = "1-2025"
/// label = "Semester 1 2025"
///
/// [status]
/// "1-2025" = "ACTIVE"
/// "2-2024" = "ARCHIVED"
/// ```
#[derive(Debug, Clone)]
pub struct BackendFile {
    file: BackendDataFile,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackendDO {
    current: Option<String>,
    #[serde(default)]
    options: Vec<SemesterOption>,
    #[serde(default)]
    status: BTreeMap<String, LifecycleState>,
    /// When set every endpoint answers with this error message.
    error: Option<String>,
}

impl ReadDO for BackendDataFile {
    type Object = BackendDO;
}

impl BackendFile {
    pub fn new(file: BackendDataFile) -> BackendFile {
        BackendFile { file }
    }

    fn load(&self) -> Result<BackendDO, FetchError> {
        if !self.file.is_file() {
            return Err(FetchError::Unreachable(format!(
                "no backend file at {}",
                self.file.display()
            )));
        }
        let backend = self
            .file
            .read()
            .map_err(|err| FetchError::Malformed(format!("{:#}", err)))?;
        match backend.error {
            Some(ref message) => Err(FetchError::Rejected(message.clone())),
            None => Ok(backend),
        }
    }
}

#[async_trait]
impl SemesterSource for BackendFile {
    async fn options(&self) -> Result<Vec<SemesterOption>, FetchError> {
        let backend = self.load()?;
        debug!(count = backend.options.len(), "backend options read");
        Ok(backend.options)
    }

    async fn current(&self) -> Result<Option<CurrentSemester>, FetchError> {
        let backend = self.load()?;
        Ok(backend.current.map(|value| CurrentSemester { value }))
    }

    async fn status(&self, key: &str) -> Result<Option<SemesterStatusRecord>, FetchError> {
        let backend = self.load()?;
        let identity = backend
            .current
            .as_deref()
            .and_then(|it| it.parse::<SemesterIdentity>().ok());
        let state = backend.status.get(key).copied();
        Ok(Some(SemesterStatusRecord::new(identity, state)))
    }
}
