//! Error type shared by the executor, the request mediator and drivers
//!
//! Errors keep their cause when wrapped, so `is_no_rows` and
//! `is_already_finished` still answer correctly after a begin/commit/rollback
//! failure has been layered on top. Wrapping variants print their cause in
//! their own message and do not report it again as `source()`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Everything that can go wrong while running work inside a transaction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to begin transaction: {0}")]
    Begin(Box<Error>),

    #[error("failed to commit transaction: {0}")]
    Commit(Box<Error>),

    /// Rollback failed while handling `original`. Both errors are kept.
    #[error("failed to rollback: {original}: {rollback}")]
    Rollback {
        original: Box<Error>,
        rollback: Box<Error>,
    },

    /// Commit or rollback on a transaction that was already terminated.
    #[error("transaction has already been committed or rolled back")]
    AlreadyFinished,

    #[error("no rows in result set")]
    NoRows,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("not found: {0}")]
    NotFound(Box<Error>),

    #[error(transparent)]
    Database(sqlx::Error),

    /// Application errors raised by a unit of work.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Tag of an [`Error`] variant, used for classification without matching on
/// payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Begin,
    Commit,
    Rollback,
    AlreadyFinished,
    NoRows,
    DeadlineExceeded,
    NotFound,
    Database,
    Other,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Begin(_) => ErrorKind::Begin,
            Error::Commit(_) => ErrorKind::Commit,
            Error::Rollback { .. } => ErrorKind::Rollback,
            Error::AlreadyFinished => ErrorKind::AlreadyFinished,
            Error::NoRows => ErrorKind::NoRows,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Database(_) => ErrorKind::Database,
            Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Whether this error, or any error it wraps, is of the given kind.
    ///
    /// A rollback failure matches on either half: the triggering error or the
    /// rollback error.
    pub fn is(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            Error::Begin(inner) | Error::Commit(inner) | Error::NotFound(inner) => inner.is(kind),
            Error::Rollback { original, rollback } => original.is(kind) || rollback.is(kind),
            _ => false,
        }
    }

    pub fn is_no_rows(&self) -> bool {
        self.is(ErrorKind::NoRows)
    }

    pub fn is_already_finished(&self) -> bool {
        self.is(ErrorKind::AlreadyFinished)
    }

    /// Translate "no matching row" into a not-found failure. Anything else,
    /// including a failed rollback triggered by a missing row, is returned
    /// untouched.
    pub fn into_not_found(self) -> Error {
        match self {
            Error::NoRows => Error::NotFound(Box::new(Error::NoRows)),
            err => err,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NoRows,
            err => Error::Database(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Default error renderer for [`crate::Transactional::wrap`].
pub fn render_error(err: Error) -> Response {
    err.into_response()
}
