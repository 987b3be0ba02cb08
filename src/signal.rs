//! Invalidation signals between execution contexts.
//!
//! A [SignalMedium] is shared by every context that should hear about each
//! other's invalidations. Each context attaches once and gets a [SignalBus].
//! Publishing on a bus reaches the handlers of that same context directly and
//! the handlers of every other attached context through the medium, so a local
//! invalidation and a foreign one end up in the same handler.
//!
//! Handlers run synchronously inside `publish`, with no lock held.
//!
//! Contexts living in different processes share a medium through a journal: a
//! [PersistentStore] holding the last token per topic. A bus that remembers
//! which tokens its context has seen can [catch up](SignalBus::catch_up) with
//! invalidations published while it was not running.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::provider::PersistentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Option list and current semester are stale.
    Options,
    /// Every cached semester status is stale.
    Status,
    /// The selected semester changed. Same-context only.
    Selection,
}

impl Topic {
    pub fn key(&self) -> &'static str {
        match self {
            Topic::Options => "semester_options_invalidate",
            Topic::Status => "semester_status_invalidate",
            Topic::Selection => "semester_selection_changed",
        }
    }
}

/// Distinct value carried by a signal. Tokens minted by one medium strictly
/// increase; they carry nothing beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(u64);

impl Token {
    pub fn new(value: u64) -> Token {
        Token(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

/// Origin of signals replayed from the journal.
const JOURNAL: ContextId = ContextId(u64::MAX);

/// Topics that cross contexts and therefore end up in the journal.
const JOURNALED: [Topic; 2] = [Topic::Options, Topic::Status];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub topic: Topic,
    pub token: Token,
    /// Context the signal was published in.
    pub origin: ContextId,
}

type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
struct Dispatcher {
    handlers: Mutex<Vec<HandlerEntry>>,
    next_id: AtomicU64,
}

impl Dispatcher {
    fn dispatch(&self, signal: &Signal) {
        let handlers: Vec<Handler> = self
            .handlers
            .lock()
            .iter()
            .filter(|entry| entry.topic == signal.topic)
            .map(|entry| entry.handler.clone())
            .collect();
        for handler in handlers {
            handler(signal);
        }
    }
}

#[derive(Default)]
struct MediumState {
    /// Last token written per topic; rewriting the same value is not a change.
    last: HashMap<Topic, Token>,
    contexts: Vec<(ContextId, Weak<Dispatcher>)>,
    next_context: u64,
}

/// Medium shared across contexts.
#[derive(Default)]
pub struct SignalMedium {
    state: Mutex<MediumState>,
    last_token: AtomicU64,
    journal: Option<Arc<dyn PersistentStore>>,
}

impl SignalMedium {
    pub fn new() -> Arc<SignalMedium> {
        Arc::new(SignalMedium::default())
    }

    /// A medium that also records every published token in `journal`, for
    /// contexts of other processes to pick up.
    pub fn journaled(journal: Arc<dyn PersistentStore>) -> Arc<SignalMedium> {
        Arc::new(SignalMedium {
            journal: Some(journal),
            ..SignalMedium::default()
        })
    }

    /// Joins a new execution context to this medium.
    pub fn attach(self: &Arc<Self>) -> SignalBus {
        let dispatcher = Arc::new(Dispatcher::default());
        let mut state = self.state.lock();
        let id = ContextId(state.next_context);
        state.next_context += 1;
        state.contexts.push((id, Arc::downgrade(&dispatcher)));
        SignalBus {
            id,
            medium: self.clone(),
            dispatcher,
            seen: None,
        }
    }

    /// Millisecond timestamp, bumped past the previous token when the clock
    /// has not moved on.
    fn mint(&self) -> Token {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|it| it.as_millis() as u64)
            .unwrap_or_default();
        let previous = self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_default();
        Token(now.max(previous + 1))
    }

    /// Stores the token and hands it to every other live context. Nothing is
    /// delivered when the stored token did not change.
    fn write(&self, signal: &Signal) {
        let receivers: Vec<Arc<Dispatcher>> = {
            let mut state = self.state.lock();
            if state.last.get(&signal.topic) == Some(&signal.token) {
                debug!(topic = signal.topic.key(), "token unchanged, nothing to deliver");
                return;
            }
            state.last.insert(signal.topic, signal.token);
            state.contexts.retain(|(_, it)| it.strong_count() > 0);
            state
                .contexts
                .iter()
                .filter(|(id, _)| *id != signal.origin)
                .filter_map(|(_, it)| it.upgrade())
                .collect()
        };
        let journal = self.journal.as_ref().filter(|_| JOURNALED.contains(&signal.topic));
        if let Some(journal) = journal {
            journal.set(signal.topic.key(), &signal.token.value().to_string());
        }
        for receiver in receivers {
            receiver.dispatch(signal);
        }
    }
}

/// One context's handle on the signal medium.
#[derive(Clone)]
pub struct SignalBus {
    id: ContextId,
    medium: Arc<SignalMedium>,
    dispatcher: Arc<Dispatcher>,
    /// Where this context records the journal tokens it has already handled.
    seen: Option<Arc<dyn PersistentStore>>,
}

impl SignalBus {
    /// A bus on a medium of its own, for a context nobody else listens to.
    pub fn standalone() -> SignalBus {
        SignalMedium::new().attach()
    }

    /// Records handled tokens in `seen`, so [SignalBus::catch_up] replays
    /// only what other contexts published.
    pub fn remembering(mut self, seen: Arc<dyn PersistentStore>) -> SignalBus {
        self.seen = Some(seen);
        self
    }

    pub fn context(&self) -> ContextId {
        self.id
    }

    /// A token no earlier publish on this medium has used.
    pub fn next_token(&self) -> Token {
        self.medium.mint()
    }

    /// Publishes a freshly minted token on `topic`.
    pub fn publish(&self, topic: Topic) -> Token {
        let token = self.next_token();
        self.publish_with(topic, token);
        token
    }

    /// Publishes `token` on both paths: directly to this context's handlers,
    /// and through the medium to every other context.
    pub fn publish_with(&self, topic: Topic, token: Token) {
        let signal = Signal {
            topic,
            token,
            origin: self.id,
        };
        info!(topic = topic.key(), token = token.value(), "publishing signal");
        self.dispatcher.dispatch(&signal);
        self.medium.write(&signal);
        self.mark_seen(topic, token);
    }

    /// Delivers to this context every journaled token it has not seen yet,
    /// as if it had been published while the context was listening. Returns
    /// how many topics were replayed.
    pub fn catch_up(&self) -> usize {
        let (Some(journal), Some(seen)) = (&self.medium.journal, &self.seen) else {
            return 0;
        };
        let mut replayed = 0;
        for topic in JOURNALED {
            let Some(latest) = stored_token(journal.as_ref(), topic.key()) else {
                continue;
            };
            let handled = stored_token(seen.as_ref(), &seen_key(topic));
            if handled.is_some_and(|it| it >= latest) {
                continue;
            }
            debug!(
                topic = topic.key(),
                token = latest.value(),
                "replaying journaled signal"
            );
            self.mark_seen(topic, latest);
            self.dispatcher.dispatch(&Signal {
                topic,
                token: latest,
                origin: JOURNAL,
            });
            replayed += 1;
        }
        replayed
    }

    fn mark_seen(&self, topic: Topic, token: Token) {
        if let Some(seen) = self.seen.as_ref().filter(|_| JOURNALED.contains(&topic)) {
            seen.set(&seen_key(topic), &token.value().to_string());
        }
    }

    /// Reaches only the handlers of this context.
    pub fn notify_local(&self, topic: Topic) -> Token {
        let token = self.next_token();
        self.dispatcher.dispatch(&Signal {
            topic,
            token,
            origin: self.id,
        });
        token
    }

    /// Registers `handler` for `topic` until the returned guard is dropped.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let id = self.dispatcher.next_id.fetch_add(1, Ordering::Relaxed);
        self.dispatcher.handlers.lock().push(HandlerEntry {
            id,
            topic,
            handler: Arc::new(handler),
        });
        Subscription {
            id,
            dispatcher: Arc::downgrade(&self.dispatcher),
        }
    }
}

fn seen_key(topic: Topic) -> String {
    format!("{}_seen", topic.key())
}

fn stored_token(store: &dyn PersistentStore, key: &str) -> Option<Token> {
    store.get(key)?.trim().parse().ok().map(Token)
}

/// Keeps a handler registered. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the handler"]
pub struct Subscription {
    id: u64,
    dispatcher: Weak<Dispatcher>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.handlers.lock().retain(|entry| entry.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemoryStore;
    use std::sync::atomic::AtomicUsize;

    fn counter(bus: &SignalBus, topic: Topic) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let subscription = bus.subscribe(topic, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn publish_reaches_own_and_other_contexts() {
        let medium = SignalMedium::new();
        let first = medium.attach();
        let second = medium.attach();
        let (own, _a) = counter(&first, Topic::Options);
        let (other, _b) = counter(&second, Topic::Options);

        first.publish(Topic::Options);

        assert_eq!(own.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn topics_are_independent() {
        let medium = SignalMedium::new();
        let first = medium.attach();
        let second = medium.attach();
        let (options, _a) = counter(&second, Topic::Options);
        let (status, _b) = counter(&second, Topic::Status);

        first.publish(Topic::Status);

        assert_eq!(options.load(Ordering::SeqCst), 0);
        assert_eq!(status.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unchanged_token_does_not_cross_contexts() {
        let medium = SignalMedium::new();
        let first = medium.attach();
        let second = medium.attach();
        let (own, _a) = counter(&first, Topic::Options);
        let (other, _b) = counter(&second, Topic::Options);

        first.publish_with(Topic::Options, Token::new(7));
        first.publish_with(Topic::Options, Token::new(7));

        assert_eq!(own.load(Ordering::SeqCst), 2);
        assert_eq!(other.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokens_are_distinct() {
        let bus = SignalBus::standalone();
        let first = bus.publish(Topic::Status);
        let second = bus.publish(Topic::Status);
        assert!(second > first);
    }

    #[test]
    fn local_notification_stays_in_context() {
        let medium = SignalMedium::new();
        let first = medium.attach();
        let second = medium.attach();
        let (own, _a) = counter(&first, Topic::Selection);
        let (other, _b) = counter(&second, Topic::Selection);

        first.notify_local(Topic::Selection);

        assert_eq!(own.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_subscription_stops_delivery() {
        let bus = SignalBus::standalone();
        let (count, subscription) = counter(&bus, Topic::Options);
        bus.publish(Topic::Options);
        drop(subscription);
        bus.publish(Topic::Options);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    /// Two processes: each has its own medium, both write the same journal.
    fn process(journal: &Arc<MemoryStore>) -> (SignalBus, Arc<MemoryStore>) {
        let seen = Arc::new(MemoryStore::new());
        let bus = SignalMedium::journaled(journal.clone())
            .attach()
            .remembering(seen.clone());
        (bus, seen)
    }

    #[test]
    fn journaled_signal_is_replayed_once_in_another_process() {
        let journal = Arc::new(MemoryStore::new());
        let (first, _) = process(&journal);
        let (second, _) = process(&journal);
        let (options, _a) = counter(&second, Topic::Options);
        let (status, _b) = counter(&second, Topic::Status);

        let token = first.publish(Topic::Options);
        assert_eq!(options.load(Ordering::SeqCst), 0);
        assert_eq!(
            journal.get(Topic::Options.key()),
            Some(token.value().to_string())
        );

        assert_eq!(second.catch_up(), 1);
        assert_eq!(second.catch_up(), 0);
        assert_eq!(options.load(Ordering::SeqCst), 1);
        assert_eq!(status.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn own_publish_is_not_replayed() {
        let journal = Arc::new(MemoryStore::new());
        let (bus, seen) = process(&journal);
        let (count, _a) = counter(&bus, Topic::Status);

        bus.publish(Topic::Status);
        assert_eq!(bus.catch_up(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A later process over the same context storage agrees.
        let restarted = SignalMedium::journaled(journal.clone())
            .attach()
            .remembering(seen);
        assert_eq!(restarted.catch_up(), 0);
    }

    #[test]
    fn selection_stays_out_of_the_journal() {
        let journal = Arc::new(MemoryStore::new());
        let (bus, _) = process(&journal);
        bus.notify_local(Topic::Selection);
        bus.publish_with(Topic::Selection, Token::new(3));
        assert_eq!(journal.get(Topic::Selection.key()), None);
    }

    #[test]
    fn bus_without_journal_has_nothing_to_catch_up() {
        let bus = SignalBus::standalone().remembering(Arc::new(MemoryStore::new()));
        bus.publish(Topic::Options);
        assert_eq!(bus.catch_up(), 0);
    }

    #[test]
    fn late_subscriber_misses_earlier_signals() {
        let medium = SignalMedium::new();
        let first = medium.attach();
        first.publish(Topic::Options);

        let second = medium.attach();
        let (count, _a) = counter(&second, Topic::Options);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        first.publish(Topic::Options);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
