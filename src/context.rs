//! Request-scoped values and deadline
//!
//! A [`Context`] is never changed in place: `with_*` methods return a derived
//! copy. Requests carry the same values in their extensions, which is how a
//! nested handler finds the transaction its caller opened. To bound `begin`
//! for one request, extend its extensions with a context carrying a deadline:
//!
//! ```ignore
//! let ctx = Context::new().with_timeout(Duration::from_millis(200));
//! req.extensions_mut().extend(ctx.into());
//! ```

use std::time::Duration;

use axum::http::Extensions;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug)]
struct Deadline(Instant);

/// Immutable bag of typed values plus an optional deadline.
#[derive(Clone, Debug, Default)]
pub struct Context {
    values: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context carrying `value`. A value of the same type already in
    /// this context is shadowed in the derived one.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = self.values.clone();
        values.insert(value);
        Self { values }
    }

    pub fn value<T>(&self) -> Option<&T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    /// Derive a context that expires at `at`, or earlier if this one already
    /// expires earlier.
    pub fn with_deadline(&self, at: Instant) -> Self {
        match self.deadline() {
            Some(current) if current <= at => self.clone(),
            _ => self.with_value(Deadline(at)),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.values.get::<Deadline>().map(|d| d.0)
    }

    /// Context for opening a transaction on behalf of a request. Only the
    /// deadline is taken from the request extensions.
    pub(crate) fn for_request(extensions: &Extensions) -> Self {
        match extensions.get::<Deadline>() {
            Some(&deadline) => Self::new().with_value(deadline),
            None => Self::new(),
        }
    }
}

impl From<Extensions> for Context {
    fn from(values: Extensions) -> Self {
        Self { values }
    }
}

impl From<Context> for Extensions {
    fn from(ctx: Context) -> Self {
        ctx.values
    }
}
