//! Recording driver for unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::driver::Driver;
use crate::error::Error;

#[derive(Debug, Default)]
struct Counters {
    begins: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// Counts begin/commit/rollback calls and fails them on request.
#[derive(Clone, Default)]
pub struct FakeDriver {
    counters: Arc<Counters>,
    begin_error: Option<fn() -> Error>,
    begin_delay: Option<Duration>,
    commit_error: Option<fn() -> Error>,
    rollback_error: Option<fn() -> Error>,
}

#[derive(Debug)]
pub struct FakeTx {
    counters: Arc<Counters>,
    commit_error: Option<fn() -> Error>,
    rollback_error: Option<fn() -> Error>,
}

impl FakeDriver {
    pub fn fail_begin_with(mut self, err: fn() -> Error) -> Self {
        self.begin_error = Some(err);
        self
    }

    pub fn delay_begin(mut self, delay: Duration) -> Self {
        self.begin_delay = Some(delay);
        self
    }

    pub fn fail_commit_with(mut self, err: fn() -> Error) -> Self {
        self.commit_error = Some(err);
        self
    }

    pub fn fail_rollback_with(mut self, err: fn() -> Error) -> Self {
        self.rollback_error = Some(err);
        self
    }

    pub fn begins(&self) -> usize {
        self.counters.begins.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }
}

impl Driver for FakeDriver {
    type Transaction = FakeTx;

    async fn begin(&self) -> Result<FakeTx, Error> {
        if let Some(delay) = self.begin_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.begin_error {
            return Err(err());
        }
        self.counters.begins.fetch_add(1, Ordering::SeqCst);
        Ok(FakeTx {
            counters: Arc::clone(&self.counters),
            commit_error: self.commit_error,
            rollback_error: self.rollback_error,
        })
    }

    async fn commit(tx: FakeTx) -> Result<(), Error> {
        tx.counters.commits.fetch_add(1, Ordering::SeqCst);
        match tx.commit_error {
            Some(err) => Err(err()),
            None => Ok(()),
        }
    }

    async fn rollback(tx: FakeTx) -> Result<(), Error> {
        tx.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        match tx.rollback_error {
            Some(err) => Err(err()),
            None => Ok(()),
        }
    }
}
