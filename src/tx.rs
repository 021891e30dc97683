//! Transaction handle shared along one call chain

use std::fmt;
use std::sync::Arc;

use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use crate::driver::Driver;
use crate::error::Error;

/// Handle to an in-progress transaction.
///
/// Clones refer to the same transaction; nothing is duplicated. Once
/// [`Tx::commit`] or [`Tx::rollback`] has run, every further commit, rollback
/// or lock reports [`Error::AlreadyFinished`].
pub struct Tx<D: Driver> {
    slot: Arc<Mutex<Option<D::Transaction>>>,
}

impl<D: Driver> Tx<D> {
    pub(crate) fn new(inner: D::Transaction) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(inner))),
        }
    }

    /// Borrow the live transaction to run queries on it.
    ///
    /// For sqlx drivers `&mut **guard` is an `sqlx::Executor`. Release the
    /// guard before handing the request to a nested handler, otherwise the
    /// nested call waits on it forever.
    pub async fn lock(&self) -> Result<MappedMutexGuard<'_, D::Transaction>, Error> {
        let guard = self.slot.lock().await;
        MutexGuard::try_map(guard, |slot| slot.as_mut()).map_err(|_| Error::AlreadyFinished)
    }

    pub async fn commit(&self) -> Result<(), Error> {
        let inner = self.take().await?;
        log::debug!("Committing transaction");
        D::commit(inner).await
    }

    pub async fn rollback(&self) -> Result<(), Error> {
        let inner = self.take().await?;
        log::debug!("Rolling back transaction");
        D::rollback(inner).await
    }

    pub async fn is_finished(&self) -> bool {
        self.slot.lock().await.is_none()
    }

    async fn take(&self) -> Result<D::Transaction, Error> {
        self.slot.lock().await.take().ok_or(Error::AlreadyFinished)
    }
}

impl<D: Driver> Clone for Tx<D> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<D: Driver> fmt::Debug for Tx<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").finish_non_exhaustive()
    }
}

/// Roll back after `err` and decide which error the caller sees.
///
/// The triggering error is returned as is, unless the rollback itself failed
/// for a reason other than the transaction already being finished. In that
/// case both errors are returned together.
pub(crate) async fn rollback<D: Driver>(tx: &Tx<D>, err: Error) -> Error {
    match tx.rollback().await {
        Ok(()) => err,
        Err(rerr) if rerr.is_already_finished() => {
            log::warn!("Rollback skipped, transaction already finished: {}", err);
            err
        }
        Err(rerr) => {
            log::error!("Rollback failed: {}: {}", err, rerr);
            Error::Rollback {
                original: Box::new(err),
                rollback: Box::new(rerr),
            }
        }
    }
}
