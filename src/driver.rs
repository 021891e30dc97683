//! Database driver capability
//!
//! The executor only needs three things from a database: begin a transaction,
//! commit it, roll it back. Every `sqlx::Pool` provides them, so application
//! code normally passes its `PgPool` straight to [`crate::Transactional`].

use std::future::Future;

use crate::error::Error;

/// Begin/commit/rollback capability of a database.
pub trait Driver: Send + Sync + 'static {
    /// Live transaction owned by a [`crate::Tx`] handle.
    type Transaction: Send + 'static;

    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, Error>> + Send;

    fn commit(tx: Self::Transaction) -> impl Future<Output = Result<(), Error>> + Send;

    fn rollback(tx: Self::Transaction) -> impl Future<Output = Result<(), Error>> + Send;
}

impl<DB: sqlx::Database> Driver for sqlx::Pool<DB> {
    type Transaction = sqlx::Transaction<'static, DB>;

    async fn begin(&self) -> Result<Self::Transaction, Error> {
        Ok(sqlx::Pool::begin(self).await?)
    }

    async fn commit(tx: Self::Transaction) -> Result<(), Error> {
        Ok(tx.commit().await?)
    }

    async fn rollback(tx: Self::Transaction) -> Result<(), Error> {
        Ok(tx.rollback().await?)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    use crate::{Context, Error, Transactional};

    // One connection so every query sees the same in-memory database.
    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn count_notes(pool: &SqlitePool) -> i64 {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes")
            .fetch_one(pool)
            .await
            .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_sqlite_commit_persists_rows() {
        let pool = memory_pool().await;
        let transactional = Transactional::with_db(pool.clone());

        let id = transactional
            .run(&Context::new(), |tx| async move {
                let mut conn = tx.lock().await?;
                let row: (i64,) =
                    sqlx::query_as("INSERT INTO notes (body) VALUES (?) RETURNING id")
                        .bind("hello")
                        .fetch_one(&mut **conn)
                        .await?;
                Ok::<_, Error>(row.0)
            })
            .await
            .unwrap();

        assert_eq!(id, 1);
        assert_eq!(count_notes(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_sqlite_failure_rolls_back_rows() {
        let pool = memory_pool().await;
        let transactional = Transactional::with_db(pool.clone());

        let err = transactional
            .run_in_transaction(&Context::new(), |tx| async move {
                let mut conn = tx.lock().await?;
                sqlx::query("INSERT INTO notes (body) VALUES (?)")
                    .bind("discarded")
                    .execute(&mut **conn)
                    .await?;
                sqlx::query_as::<_, (String,)>("SELECT body FROM notes WHERE id = 42")
                    .fetch_one(&mut **conn)
                    .await?;
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();

        assert!(err.is_no_rows());
        assert_eq!(count_notes(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_sqlite_commit_after_manual_rollback_is_ignored() {
        let pool = memory_pool().await;
        let transactional = Transactional::with_db(pool.clone());

        let result = transactional
            .run(&Context::new(), |tx| async move {
                {
                    let mut conn = tx.lock().await?;
                    sqlx::query("INSERT INTO notes (body) VALUES (?)")
                        .bind("undone")
                        .execute(&mut **conn)
                        .await?;
                }
                tx.rollback().await?;
                Ok::<_, Error>("done")
            })
            .await
            .unwrap();

        assert_eq!(result, "done");
        assert_eq!(count_notes(&pool).await, 0);
    }
}
