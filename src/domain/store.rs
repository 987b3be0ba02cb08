use std::collections::HashMap;

use parking_lot::Mutex;
use toml_edit::DocumentMut;
use tracing::warn;

use crate::provider::PersistentStore;

use super::paths::StoreDataFile;

/// Cached semester options, serialized as a JSON array.
pub const OPTIONS_KEY: &str = "semester_options";
/// Key of the semester the backend reports as current. Kept apart from the
/// user's own selection.
pub const CURRENT_KEY: &str = "backend_current_semester";
/// Semester key to status record mapping, serialized as a JSON object.
pub const STATUS_KEY: &str = "semester_status_cache";
pub const SELECTED_KEY: &str = "selected_semester";

/// Store living only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

enum Loaded {
    Document(DocumentMut),
    /// Read fine but not TOML.
    Corrupt,
    /// Exists but cannot be read; its content is left alone.
    Unreadable,
}

/// Store backed by a TOML document in the context directory.
///
/// Writes are read-modify-write under one lock, so two keys can be written
/// independently without losing each other's update.
#[derive(Debug)]
pub struct FileStore {
    file: StoreDataFile,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(file: StoreDataFile) -> FileStore {
        FileStore {
            file,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Loaded {
        let content = match std::fs::read_to_string(&*self.file) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Loaded::Document(DocumentMut::new())
            }
            Err(err) => {
                warn!(path = %self.file.display(), error = %err, "store file unreadable");
                return Loaded::Unreadable;
            }
        };
        match content.parse::<DocumentMut>() {
            Ok(document) => Loaded::Document(document),
            Err(err) => {
                warn!(path = %self.file.display(), error = %err, "store file is not valid toml");
                Loaded::Corrupt
            }
        }
    }

    fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut DocumentMut),
    {
        let _guard = self.lock.lock();
        let mut document = match self.load() {
            Loaded::Document(document) => document,
            // A corrupt file is replaced rather than kept around forever.
            Loaded::Corrupt => DocumentMut::new(),
            Loaded::Unreadable => {
                warn!(path = %self.file.display(), "store write dropped, file unreadable");
                return;
            }
        };
        edit(&mut document);
        if let Err(err) = std::fs::write(&*self.file, document.to_string()) {
            warn!(path = %self.file.display(), error = %err, "store write dropped");
        }
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock();
        match self.load() {
            Loaded::Document(document) => document
                .get(key)
                .and_then(|it| it.as_str().map(String::from)),
            Loaded::Corrupt | Loaded::Unreadable => None,
        }
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|document| {
            document[key] = toml_edit::value(value);
        });
    }

    fn remove(&self, key: &str) {
        self.update(|document| {
            document.remove(key);
        });
    }
}
