#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use semgate::domain::{
    CurrentSemester, LifecycleState, Ordinal, SemesterIdentity, SemesterOption,
    SemesterStatusRecord,
};
use semgate::{FetchError, SemesterSource};
use tokio::sync::Semaphore;

/// One scripted answer, optionally held back until its gate opens.
#[derive(Clone)]
pub struct Scripted<T> {
    response: Result<T, FetchError>,
    gate: Option<Arc<Semaphore>>,
}

impl<T: Clone> Scripted<T> {
    pub fn ready(response: Result<T, FetchError>) -> Self {
        Scripted {
            response,
            gate: None,
        }
    }

    pub fn gated(response: Result<T, FetchError>, gate: Arc<Semaphore>) -> Self {
        Scripted {
            response,
            gate: Some(gate),
        }
    }

    async fn resolve(self) -> Result<T, FetchError> {
        if let Some(gate) = self.gate {
            // A closed gate never hands out a permit; tests always open it.
            let _permit = gate.acquire().await.map_err(|_| unreachable_gate())?;
        }
        self.response
    }
}

fn unreachable_gate() -> FetchError {
    FetchError::Unreachable("gate closed".into())
}

/// Answers are consumed front to back; the last one keeps being repeated.
struct Script<T>(VecDeque<Scripted<T>>);

impl<T: Clone> Script<T> {
    fn next(&mut self) -> Option<Scripted<T>> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

/// Scripted stand-in for the semester endpoints, counting every call.
pub struct MockSource {
    options: Mutex<Script<Vec<SemesterOption>>>,
    current: Mutex<Script<Option<CurrentSemester>>>,
    status: Mutex<HashMap<String, Script<Option<SemesterStatusRecord>>>>,
    option_calls: AtomicUsize,
    current_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Arc<MockSource> {
        Arc::new(MockSource {
            options: Mutex::new(Script(VecDeque::from([Scripted::ready(Ok(standard_options()))]))),
            current: Mutex::new(Script(VecDeque::from([Scripted::ready(Ok(Some(
                CurrentSemester {
                    value: "1-2025".into(),
                },
            )))]))),
            status: Mutex::new(HashMap::new()),
            option_calls: AtomicUsize::new(0),
            current_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    pub fn script_options(&self, answers: Vec<Scripted<Vec<SemesterOption>>>) {
        *self.options.lock() = Script(answers.into());
    }

    pub fn script_current(&self, answers: Vec<Scripted<Option<CurrentSemester>>>) {
        *self.current.lock() = Script(answers.into());
    }

    pub fn script_status(&self, key: &str, answers: Vec<Scripted<Option<SemesterStatusRecord>>>) {
        self.status.lock().insert(key.to_owned(), Script(answers.into()));
    }

    pub fn option_calls(&self) -> usize {
        self.option_calls.load(Ordering::SeqCst)
    }

    pub fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SemesterSource for MockSource {
    async fn options(&self) -> Result<Vec<SemesterOption>, FetchError> {
        self.option_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.options.lock().next();
        match answer {
            Some(answer) => answer.resolve().await,
            None => Ok(Vec::new()),
        }
    }

    async fn current(&self) -> Result<Option<CurrentSemester>, FetchError> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.current.lock().next();
        match answer {
            Some(answer) => answer.resolve().await,
            None => Ok(None),
        }
    }

    async fn status(&self, key: &str) -> Result<Option<SemesterStatusRecord>, FetchError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.status.lock().get_mut(key).and_then(|it| it.next());
        match answer {
            Some(answer) => answer.resolve().await,
            None => Ok(None),
        }
    }
}

pub fn standard_options() -> Vec<SemesterOption> {
    vec![
        SemesterOption::new("1-2025", "Semester 1 2025"),
        SemesterOption::new("2-2025", "Semester 2 2025"),
    ]
}

pub fn record(ordinal: Ordinal, year: u16, state: LifecycleState) -> SemesterStatusRecord {
    SemesterStatusRecord::new(Some(SemesterIdentity::new(ordinal, year)), Some(state))
}

pub fn unreachable() -> FetchError {
    FetchError::Unreachable("connection refused".into())
}
