use std::{
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;

/// Directory holding the persisted state of one execution context.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextDir(PathBuf);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreDataFile(PathBuf);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendDataFile(PathBuf);

impl ContextDir {
    /// Opens the context directory, creating it when it does not exist yet.
    pub fn new<P>(path: P) -> Result<ContextDir>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if path.exists() && !path.is_dir() {
            bail!(
                "The context path '{}' exists but is not a directory.",
                path.display()
            )
        }
        std::fs::create_dir_all(path).with_context(|| {
            anyhow!("Failed to create context directory at: {}", path.display())
        })?;
        Ok(ContextDir(path.to_path_buf()))
    }

    /// Path of the store data file. The file itself is created lazily by the
    /// first write.
    pub fn data_file(&self) -> StoreDataFile {
        StoreDataFile(self.0.join(".semgate"))
    }
}

impl StoreDataFile {
    pub(crate) fn new<P>(path: P) -> StoreDataFile
    where
        P: AsRef<Path>,
    {
        StoreDataFile(path.as_ref().to_path_buf())
    }
}

impl BackendDataFile {
    pub fn new<P>(path: P) -> BackendDataFile
    where
        P: AsRef<Path>,
    {
        BackendDataFile(path.as_ref().to_path_buf())
    }
}

pub(crate) trait ReadDO: Deref<Target = PathBuf> {
    type Object: DeserializeOwned;

    fn read(&self) -> Result<Self::Object> {
        let content = std::fs::read_to_string(self.deref())
            .with_context(|| anyhow!("Failed to read file at: {}", self.deref().display()))?;
        let it: Self::Object = toml_edit::de::from_str::<Self::Object>(&content)
            .with_context(|| anyhow!("Failed to parse data from: {}", self.deref().display()))?;
        Ok(it)
    }
}

impl Deref for ContextDir {
    type Target = PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for StoreDataFile {
    type Target = PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for BackendDataFile {
    type Target = PathBuf;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
