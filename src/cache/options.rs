use std::{
    collections::HashSet,
    sync::{Arc, Weak},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::domain::{SemesterOption, CURRENT_KEY, OPTIONS_KEY};
use crate::provider::{PersistentStore, SemesterSource};
use crate::signal::{Signal, SignalBus, Token, Topic};

const LOAD_FAILED: &str = "Could not load the semester list";

/// What the options cache holds right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsSnapshot {
    pub options: Vec<SemesterOption>,
    /// Key the backend reports as the globally active semester.
    pub current: Option<String>,
    pub loading: bool,
    /// Set only when a load failed while there was nothing cached.
    pub error: String,
}

/// Selectable semesters and the backend's current semester, one per context.
///
/// Starts from whatever the store persisted and is filled by the first
/// successful load. An invalidation published elsewhere empties it and starts
/// a forced reload in the background.
#[derive(Clone)]
pub struct OptionsCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn PersistentStore>,
    source: Arc<dyn SemesterSource>,
    bus: SignalBus,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    options: Vec<SemesterOption>,
    current: Option<String>,
    loading: bool,
    error: String,
    /// Bumped by every invalidation; a load that started under an older
    /// generation does not get to write.
    generation: u64,
    in_flight: Option<Shared<BoxFuture<'static, ()>>>,
    /// Token of this cache's latest invalidation. Its own signal does not
    /// trigger a reload.
    published: Option<Token>,
}

impl OptionsCache {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        source: Arc<dyn SemesterSource>,
        bus: SignalBus,
    ) -> OptionsCache {
        let state = State {
            options: read_persisted_options(store.as_ref()),
            current: store.get(CURRENT_KEY).filter(|it| !it.is_empty()),
            ..State::default()
        };
        OptionsCache {
            inner: Arc::new(Inner {
                store,
                source,
                bus,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn read(&self) -> OptionsSnapshot {
        let state = self.inner.state.lock();
        OptionsSnapshot {
            options: state.options.clone(),
            current: state.current.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Fills the cache. Without `force` a non-empty cache is left alone and
    /// no request goes out. A load already in flight is joined, not repeated.
    pub async fn load(&self, force: bool) {
        let load = {
            let mut state = self.inner.state.lock();
            if !force && !state.options.is_empty() {
                debug!("semester options served from cache");
                return;
            }
            if let Some(load) = state.in_flight.clone() {
                debug!("joining semester options load in flight");
                load
            } else {
                state.loading = true;
                state.error.clear();
                let load = fetch(
                    Arc::downgrade(&self.inner),
                    self.inner.source.clone(),
                    state.generation,
                    state.options.is_empty(),
                )
                .boxed()
                .shared();
                state.in_flight = Some(load.clone());
                load
            }
        };
        load.await
    }

    /// Empties the cache here and in the store, then tells every other
    /// context to do the same.
    pub fn invalidate(&self) {
        self.discard();
        let token = self.inner.bus.next_token();
        self.inner.state.lock().published = Some(token);
        info!("semester options invalidated");
        self.inner.bus.publish_with(Topic::Options, token);
    }

    /// Drops cached options and current semester, in memory and in the store.
    /// A load in flight keeps running but its result is thrown away.
    pub fn discard(&self) {
        let mut state = self.inner.state.lock();
        state.options.clear();
        state.current = None;
        state.error.clear();
        state.loading = false;
        state.in_flight = None;
        state.generation += 1;
        self.inner.store.remove(OPTIONS_KEY);
        self.inner.store.remove(CURRENT_KEY);
    }

    /// Handler for [Topic::Options] signals. Holds the cache weakly, so a
    /// subscription never keeps it alive.
    ///
    /// A signal from anyone but this cache discards and reloads. The reload
    /// runs on the current tokio runtime; without one it waits for the next
    /// [OptionsCache::load].
    pub(crate) fn on_signal(&self) -> impl Fn(&Signal) + Send + Sync + 'static {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        move |signal| {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let own = inner.state.lock().published == Some(signal.token);
            let cache = OptionsCache { inner };
            cache.discard();
            if own {
                return;
            }
            debug!(token = signal.token.value(), "semester options stale, reloading");
            match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { cache.load(true).await });
                }
                Err(_) => debug!("no runtime, semester options reload deferred"),
            }
        }
    }
}

/// One options round trip. `was_empty` decides whether a failure may show up
/// as an error: a refresh over a good list keeps the list and stays quiet.
async fn fetch(
    inner: Weak<Inner>,
    source: Arc<dyn SemesterSource>,
    generation: u64,
    was_empty: bool,
) {
    let result = source.options().await;
    let result = match result {
        Ok(fetched) => {
            let current = match source.current().await {
                Ok(current) => current.map(|it| it.value).filter(|it| !it.is_empty()),
                Err(err) => {
                    warn!(error = %err, "failed to load current semester");
                    None
                }
            };
            Ok((dedup(fetched), current))
        }
        Err(err) => Err(err),
    };

    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.state.lock();
    if state.generation != generation {
        debug!("discarding semester options loaded before invalidation");
        return;
    }
    match result {
        Ok((fetched, current)) => {
            persist_options(inner.store.as_ref(), &fetched);
            state.options = fetched;
            if let Some(current) = current {
                inner.store.set(CURRENT_KEY, &current);
                state.current = Some(current);
            }
        }
        Err(err) => {
            warn!(error = %err, "failed to load semester options");
            if was_empty {
                state.error = err.user_message(LOAD_FAILED);
            }
        }
    }
    state.loading = false;
    state.in_flight = None;
}

/// Persisted options that do not parse are treated as never persisted.
fn read_persisted_options(store: &dyn PersistentStore) -> Vec<SemesterOption> {
    let Some(raw) = store.get(OPTIONS_KEY) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<SemesterOption>>(&raw) {
        Ok(options) => dedup(options),
        Err(err) => {
            debug!(error = %err, "ignoring malformed persisted semester options");
            Vec::new()
        }
    }
}

fn persist_options(store: &dyn PersistentStore, options: &[SemesterOption]) {
    match serde_json::to_string(options) {
        Ok(raw) => store.set(OPTIONS_KEY, &raw),
        Err(err) => warn!(error = %err, "failed to serialize semester options"),
    }
}

/// Keeps the first option of every value, in order.
fn dedup(options: Vec<SemesterOption>) -> Vec<SemesterOption> {
    let mut seen = HashSet::new();
    let before = options.len();
    let options: Vec<_> = options
        .into_iter()
        .filter(|option| seen.insert(option.value.clone()))
        .collect();
    if options.len() != before {
        warn!(
            dropped = before - options.len(),
            "duplicate semester options dropped"
        );
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemoryStore;

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let options = vec![
            SemesterOption::new("2-2025", "Semester 2 2025"),
            SemesterOption::new("1-2025", "Semester 1 2025"),
            SemesterOption::new("2-2025", "duplicate"),
        ];
        let deduped = dedup(options);
        assert_eq!(
            deduped,
            vec![
                SemesterOption::new("2-2025", "Semester 2 2025"),
                SemesterOption::new("1-2025", "Semester 1 2025"),
            ]
        );
    }

    #[test]
    fn malformed_persisted_options_read_as_empty() {
        let store = MemoryStore::new();
        store.set(OPTIONS_KEY, "{\"not\":\"a list\"}");
        assert!(read_persisted_options(&store).is_empty());

        store.set(OPTIONS_KEY, "[{\"value\":\"1-2025\"");
        assert!(read_persisted_options(&store).is_empty());
    }

    #[test]
    fn persisted_options_round_trip() {
        let store = MemoryStore::new();
        let options = vec![
            SemesterOption::new("1-2025", "Semester 1 2025"),
            SemesterOption::new("2-2025", "Semester 2 2025"),
        ];
        persist_options(&store, &options);
        assert_eq!(read_persisted_options(&store), options);
    }
}
