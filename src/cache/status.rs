use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Weak},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::domain::{SemesterStatusRecord, STATUS_KEY};
use crate::error::FetchError;
use crate::provider::{PersistentStore, SemesterSource};
use crate::signal::{Signal, SignalBus, Topic};

const STATUS_FAILED: &str = "Could not load the semester status";

pub type StatusResult = Result<Option<Arc<SemesterStatusRecord>>, FetchError>;

/// What is known about one semester key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedStatus {
    Found(Arc<SemesterStatusRecord>),
    /// The backend answered without a record. Cached like any other answer.
    NotFound,
}

impl CachedStatus {
    fn from_record(record: Option<Arc<SemesterStatusRecord>>) -> CachedStatus {
        match record {
            Some(record) => CachedStatus::Found(record),
            None => CachedStatus::NotFound,
        }
    }

    pub fn record(&self) -> Option<&SemesterStatusRecord> {
        match self {
            CachedStatus::Found(record) => Some(record),
            CachedStatus::NotFound => None,
        }
    }

    fn to_record(&self) -> Option<Arc<SemesterStatusRecord>> {
        match self {
            CachedStatus::Found(record) => Some(record.clone()),
            CachedStatus::NotFound => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Cached(CachedStatus),
    /// The last fetch failed; the next read has to go to the backend again.
    Evicted,
}

type Request = Shared<BoxFuture<'static, StatusResult>>;

#[derive(Default)]
struct State {
    slots: HashMap<String, Slot>,
    in_flight: HashMap<String, Request>,
    errors: HashMap<String, String>,
    /// Sequence number of the latest request started per key. Only that
    /// request may write its answer.
    seq: HashMap<String, u64>,
    generation: u64,
}

impl State {
    fn persisted(&self) -> BTreeMap<&str, Option<&SemesterStatusRecord>> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Cached(status) => Some((key.as_str(), status.record())),
                Slot::Evicted => None,
            })
            .collect()
    }
}

/// Last known lifecycle status per semester key.
///
/// Entries appear on first read of a key, are replaced by forced refreshes,
/// evicted when a fetch fails and cleared in bulk by a status invalidation.
#[derive(Clone)]
pub struct StatusCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn PersistentStore>,
    source: Arc<dyn SemesterSource>,
    bus: SignalBus,
    state: Mutex<State>,
}

impl StatusCache {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        source: Arc<dyn SemesterSource>,
        bus: SignalBus,
    ) -> StatusCache {
        let state = State {
            slots: read_persisted_statuses(store.as_ref()),
            ..State::default()
        };
        StatusCache {
            inner: Arc::new(Inner {
                store,
                source,
                bus,
                state: Mutex::new(state),
            }),
        }
    }

    /// `None` while nothing is known about `key`, including after a failed
    /// fetch.
    pub fn read(&self, key: &str) -> Option<CachedStatus> {
        match self.inner.state.lock().slots.get(key) {
            Some(Slot::Cached(status)) => Some(status.clone()),
            Some(Slot::Evicted) | None => None,
        }
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.state.lock().in_flight.contains_key(key)
    }

    /// Message of the last failed fetch for `key`, cleared by the next attempt.
    pub fn error(&self, key: &str) -> Option<String> {
        self.inner.state.lock().errors.get(key).cloned()
    }

    pub fn is_evicted(&self, key: &str) -> bool {
        matches!(self.inner.state.lock().slots.get(key), Some(Slot::Evicted))
    }

    /// Returns the status of `key`, going to the backend only when needed.
    ///
    /// Without `force` a cached answer is returned as is and a request already
    /// in flight for `key` is awaited instead of repeated. With `force` a new
    /// request is started; whichever request started last owns the cache
    /// entry, earlier ones still answer their own callers.
    pub async fn fetch_status(&self, key: &str, force: bool) -> StatusResult {
        if key.trim().is_empty() {
            return Ok(None);
        }
        let request = {
            let mut state = self.inner.state.lock();
            if !force {
                if let Some(Slot::Cached(status)) = state.slots.get(key) {
                    debug!(key, "semester status served from cache");
                    return Ok(status.to_record());
                }
            }
            let pending = if force {
                None
            } else {
                state.in_flight.get(key).cloned()
            };
            match pending {
                Some(request) => {
                    debug!(key, "joining semester status request in flight");
                    request
                }
                None => self.start(&mut state, key),
            }
        };
        request.await
    }

    fn start(&self, state: &mut State, key: &str) -> Request {
        let seq = state.seq.get(key).copied().unwrap_or_default() + 1;
        state.seq.insert(key.to_owned(), seq);
        state.errors.remove(key);
        let request = fetch(
            Arc::downgrade(&self.inner),
            self.inner.source.clone(),
            key.to_owned(),
            seq,
            state.generation,
        )
        .boxed()
        .shared();
        state.in_flight.insert(key.to_owned(), request.clone());
        request
    }

    /// Clears every cached status here and in the store, then tells every
    /// other context to do the same.
    pub fn invalidate_all(&self) {
        self.discard();
        info!("semester status cache invalidated");
        self.inner.bus.publish(Topic::Status);
    }

    /// Clears every cached status, in memory and in the store. Requests in
    /// flight keep running, their answers are dropped.
    pub fn discard(&self) {
        let mut state = self.inner.state.lock();
        state.slots.clear();
        state.in_flight.clear();
        state.errors.clear();
        state.generation += 1;
        self.inner.store.remove(STATUS_KEY);
    }

    /// Handler for [Topic::Status] signals, holding the cache weakly.
    pub(crate) fn on_signal(&self) -> impl Fn(&Signal) + Send + Sync + 'static {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        move |signal| {
            if let Some(inner) = inner.upgrade() {
                debug!(token = signal.token.value(), "semester status cache stale");
                StatusCache { inner }.discard();
            }
        }
    }
}

async fn fetch(
    inner: Weak<Inner>,
    source: Arc<dyn SemesterSource>,
    key: String,
    seq: u64,
    generation: u64,
) -> StatusResult {
    let result = source.status(&key).await.map(|it| it.map(Arc::new));

    let Some(inner) = inner.upgrade() else {
        return result;
    };
    let mut state = inner.state.lock();
    let latest = state.generation == generation && state.seq.get(&key) == Some(&seq);
    if !latest {
        debug!(key = %key, seq, "ignoring superseded semester status answer");
        return result;
    }
    state.in_flight.remove(&key);
    match result {
        Ok(ref record) => {
            state.slots.insert(
                key.clone(),
                Slot::Cached(CachedStatus::from_record(record.clone())),
            );
            state.errors.remove(&key);
        }
        Err(ref err) => {
            warn!(key = %key, error = %err, "failed to load semester status");
            state.slots.insert(key.clone(), Slot::Evicted);
            state.errors.insert(key, err.user_message(STATUS_FAILED));
        }
    }
    persist_statuses(inner.store.as_ref(), &state);
    result
}

/// A persisted mapping that does not parse is treated as never persisted.
fn read_persisted_statuses(store: &dyn PersistentStore) -> HashMap<String, Slot> {
    let Some(raw) = store.get(STATUS_KEY) else {
        return HashMap::new();
    };
    match serde_json::from_str::<HashMap<String, Option<SemesterStatusRecord>>>(&raw) {
        Ok(statuses) => statuses
            .into_iter()
            .map(|(key, record)| {
                let status = CachedStatus::from_record(record.map(Arc::new));
                (key, Slot::Cached(status))
            })
            .collect(),
        Err(err) => {
            debug!(error = %err, "ignoring malformed persisted semester statuses");
            HashMap::new()
        }
    }
}

fn persist_statuses(store: &dyn PersistentStore, state: &State) {
    match serde_json::to_string(&state.persisted()) {
        Ok(raw) => store.set(STATUS_KEY, &raw),
        Err(err) => warn!(error = %err, "failed to serialize semester statuses"),
    }
}
