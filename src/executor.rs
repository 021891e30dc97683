//! Run units of work inside a transaction
//!
//! Begin, run the work, then commit on success or roll back on failure. The
//! transaction is finished exactly once on every path past a successful begin.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::context::Context;
use crate::driver::Driver;
use crate::error::Error;
use crate::tx::{self, Tx};

/// Wraps functions and HTTP handlers within a transaction.
#[derive(Clone, Debug)]
pub struct Transactional<D> {
    driver: D,
    begin_timeout: Option<Duration>,
}

impl<D: Driver> Transactional<D> {
    pub fn with_db(driver: D) -> Self {
        Self {
            driver,
            begin_timeout: None,
        }
    }

    /// Give up on `begin` after `timeout`, on top of any context deadline.
    pub fn begin_timeout(mut self, timeout: Duration) -> Self {
        self.begin_timeout = Some(timeout);
        self
    }

    /// Run `f` within a new transaction and return its result.
    ///
    /// A commit that fails because `f` already finished the transaction counts
    /// as success: whoever finished it also reported its outcome.
    pub async fn run<T, F, Fut>(&self, ctx: &Context, f: F) -> Result<T, Error>
    where
        F: FnOnce(Tx<D>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let tx = self.begin(ctx).await?;

        let value = match f(tx.clone()).await {
            Ok(value) => value,
            Err(err) => return Err(tx::rollback(&tx, err).await),
        };

        match tx.commit().await {
            Ok(()) => Ok(value),
            Err(err) if err.is_already_finished() => {
                log::debug!("Commit skipped, transaction already finished");
                Ok(value)
            }
            // The driver owns the fate of a transaction whose commit failed.
            Err(err) => Err(Error::Commit(Box::new(err))),
        }
    }

    /// Run `f` within a new transaction for its side effects only.
    pub async fn run_in_transaction<F, Fut>(&self, ctx: &Context, f: F) -> Result<(), Error>
    where
        F: FnOnce(Tx<D>) -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        self.run(ctx, f).await
    }

    async fn begin(&self, ctx: &Context) -> Result<Tx<D>, Error> {
        let timeout = self.begin_timeout.map(|t| Instant::now() + t);
        let deadline = match (ctx.deadline(), timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let begun = match deadline {
            Some(at) => tokio::time::timeout_at(at, self.driver.begin())
                .await
                .unwrap_or(Err(Error::DeadlineExceeded)),
            None => self.driver.begin().await,
        };

        match begun {
            Ok(inner) => {
                log::debug!("Began transaction");
                Ok(Tx::new(inner))
            }
            Err(err) => Err(Error::Begin(Box::new(err))),
        }
    }
}
