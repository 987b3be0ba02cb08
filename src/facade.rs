use std::sync::Arc;

use tracing::debug;

use crate::cache::{CachedStatus, OptionsCache, OptionsSnapshot, StatusCache, StatusResult};
use crate::domain::{AllOptionPolicy, SemesterOption, SELECTED_KEY};
use crate::lock;
use crate::provider::{PersistentStore, SemesterSource};
use crate::signal::{Signal, SignalBus, Subscription, Topic};

/// Single entry point for everything that needs to know about semesters.
///
/// Composes the options cache, the status cache and the write-lock check,
/// and keeps both caches subscribed to the signal bus: an invalidation done
/// by any facade, in this context or another one, empties the caches here and
/// the next load goes back to the backend.
///
/// Cloning is cheap and clones share the caches. The subscriptions end when
/// the last clone is dropped.
#[derive(Clone)]
pub struct SemesterData {
    options: OptionsCache,
    status: StatusCache,
    store: Arc<dyn PersistentStore>,
    bus: SignalBus,
    all_option: AllOptionPolicy,
    _subscriptions: Arc<[Subscription]>,
}

impl SemesterData {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        source: Arc<dyn SemesterSource>,
        bus: SignalBus,
    ) -> SemesterData {
        let options = OptionsCache::new(store.clone(), source.clone(), bus.clone());
        let status = StatusCache::new(store.clone(), source, bus.clone());
        let subscriptions = [
            bus.subscribe(Topic::Options, options.on_signal()),
            bus.subscribe(Topic::Status, status.on_signal()),
        ];
        SemesterData {
            options,
            status,
            store,
            bus,
            all_option: AllOptionPolicy::default(),
            _subscriptions: Arc::new(subscriptions),
        }
    }

    pub fn with_all_option_policy(mut self, policy: AllOptionPolicy) -> SemesterData {
        self.all_option = policy;
        self
    }

    pub fn options(&self) -> OptionsSnapshot {
        self.options.read()
    }

    /// Options the given role may pick from.
    pub fn visible_options(&self, role: Option<&str>) -> Vec<SemesterOption> {
        self.all_option.filter(&self.options.read().options, role)
    }

    pub fn current(&self) -> Option<String> {
        self.options.read().current
    }

    pub async fn load(&self, force: bool) {
        self.options.load(force).await
    }

    pub async fn refresh(&self) {
        self.options.load(true).await
    }

    pub fn invalidate(&self) {
        self.options.invalidate()
    }

    pub fn invalidate_status(&self) {
        self.status.invalidate_all()
    }

    /// Drops every semester cache and tells every context about it.
    pub fn invalidate_all(&self) {
        self.options.invalidate();
        self.status.invalidate_all();
    }

    pub fn status(&self, key: &str) -> Option<CachedStatus> {
        self.status.read(key)
    }

    pub async fn fetch_status(&self, key: &str, force: bool) -> StatusResult {
        self.status.fetch_status(key, force).await
    }

    pub async fn refresh_status(&self, key: &str) -> StatusResult {
        self.status.fetch_status(key, true).await
    }

    pub fn status_loading(&self, key: &str) -> bool {
        self.status.is_loading(key)
    }

    pub fn status_error(&self, key: &str) -> Option<String> {
        self.status.error(key)
    }

    /// Write permission from what is cached, without touching the backend.
    pub fn is_writable_cached(&self, selected: Option<&str>) -> bool {
        let status = selected.and_then(|key| self.status.read(key));
        lock::is_writable(status.as_ref().and_then(CachedStatus::record), selected)
    }

    /// Write permission for `selected`, fetching its status first when it is
    /// not cached yet. A failed fetch leaves the status unknown, which permits.
    pub async fn is_writable(&self, selected: Option<&str>) -> bool {
        let Some(key) = selected.filter(|it| !it.trim().is_empty()) else {
            return true;
        };
        if self.status.read(key).is_none() {
            if let Err(err) = self.status.fetch_status(key, false).await {
                debug!(key, error = %err, "status unknown, write check fails open");
            }
        }
        self.is_writable_cached(Some(key))
    }

    /// Semester picked by the user in this context.
    pub fn selected(&self) -> Option<String> {
        self.store.get(SELECTED_KEY).filter(|it| !it.is_empty())
    }

    /// Records the user's pick and tells the other listeners of this context.
    pub fn select(&self, key: Option<&str>) {
        match key.filter(|it| !it.is_empty()) {
            Some(key) => self.store.set(SELECTED_KEY, key),
            None => self.store.remove(SELECTED_KEY),
        }
        self.bus.notify_local(Topic::Selection);
    }

    pub fn on_selection<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.bus.subscribe(Topic::Selection, handler)
    }
}
