//! Run functions and axum handlers inside sqlx transactions
//!
//! [`Transactional`] begins a transaction, hands it to a unit of work and
//! commits when the work succeeds or rolls back when it fails. Wrapped HTTP
//! handlers share one transaction per request: a wrapped handler invoked with
//! a request that already carries a transaction reuses it.
//!
//! ```ignore
//! let transactional = Transactional::with_db(pool);
//!
//! let id = transactional
//!     .run(&Context::new(), |tx| async move {
//!         let mut conn = tx.lock().await?;
//!         let row: (i64,) = sqlx::query_as("INSERT INTO notes (body) VALUES ($1) RETURNING id")
//!             .bind("hello")
//!             .fetch_one(&mut **conn)
//!             .await?;
//!         Ok::<_, Error>(row.0)
//!     })
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod executor;
pub mod logging;
pub mod service;
pub mod tx;

#[cfg(test)]
mod testing;

pub use context::Context;
pub use driver::Driver;
pub use error::{Error, ErrorKind, render_error};
pub use executor::Transactional;
pub use service::{ErrorRenderer, TransactionalService, TxHandler};
pub use tx::Tx;
