//! HTTP handlers running inside a request-bound transaction
//!
//! [`Transactional::wrap`] turns a handler that takes a transaction into a
//! `tower::Service` for `axum::Router::route_service`. The first wrapped
//! service a request reaches opens the transaction and stores it in the
//! request extensions. Wrapped services called further down with the same
//! request reuse it instead of opening a second one.
//!
//! ```ignore
//! async fn get_note(tx: Tx<PgPool>, req: Request) -> Result<Json<Note>, Error> {
//!     let (mut parts, _) = req.into_parts();
//!     let Path(id) = parts.extract::<Path<i64>>().await.map_err(anyhow::Error::from)?;
//!     let mut conn = tx.lock().await?;
//!     Ok(Json(notes::get(&mut **conn, id).await?))
//! }
//!
//! let app = Router::new()
//!     .route_service("/notes/{id}", transactional.wrap(get_note, render_error));
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::task::{Context as TaskContext, Poll};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures::future::{BoxFuture, FutureExt};
use tower::Service;

use crate::context::Context;
use crate::driver::Driver;
use crate::error::Error;
use crate::executor::Transactional;
use crate::tx::{self, Tx};

/// Extension key under which the active transaction travels with a request.
struct ActiveTx<D: Driver>(Tx<D>);

impl<D: Driver> Clone for ActiveTx<D> {
    fn clone(&self) -> Self {
        ActiveTx(self.0.clone())
    }
}

/// HTTP handler that takes a transaction and might error.
pub trait TxHandler<D: Driver>: Clone + Send + Sync + 'static {
    fn serve(&self, tx: Tx<D>, req: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

impl<D, F, Fut, R> TxHandler<D> for F
where
    D: Driver,
    F: Fn(Tx<D>, Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse,
{
    fn serve(&self, tx: Tx<D>, req: Request) -> BoxFuture<'static, Result<Response, Error>> {
        self(tx, req)
            .map(|result| result.map(IntoResponse::into_response))
            .boxed()
    }
}

/// Turns an error that escaped a handler into the response sent back.
pub trait ErrorRenderer: Clone + Send + Sync + 'static {
    fn render(&self, err: Error) -> Response;
}

impl<F> ErrorRenderer for F
where
    F: Fn(Error) -> Response + Clone + Send + Sync + 'static,
{
    fn render(&self, err: Error) -> Response {
        self(err)
    }
}

impl<D: Driver + Clone> Transactional<D> {
    /// Wrap `handler` within a transaction, rendering its errors with
    /// `renderer`.
    pub fn wrap<H, R>(&self, handler: H, renderer: R) -> TransactionalService<D, H, R>
    where
        H: TxHandler<D>,
        R: ErrorRenderer,
    {
        TransactionalService {
            transactional: self.clone(),
            handler,
            renderer,
        }
    }
}

/// Service returned by [`Transactional::wrap`].
#[derive(Clone)]
pub struct TransactionalService<D, H, R> {
    transactional: Transactional<D>,
    handler: H,
    renderer: R,
}

impl<D, H, R> TransactionalService<D, H, R>
where
    D: Driver + Clone,
    H: TxHandler<D>,
    R: ErrorRenderer,
{
    async fn serve(self, mut req: Request) -> Result<Response, Error> {
        if let Some(ActiveTx(tx)) = req.extensions().get::<ActiveTx<D>>().cloned() {
            log::debug!("Reusing transaction for {} {}", req.method(), req.uri());
            return match self.handler.serve(tx.clone(), req).await {
                Ok(response) => Ok(response),
                Err(err) => Err(tx::rollback(&tx, err).await),
            };
        }

        let ctx = Context::for_request(req.extensions());
        let handler = self.handler;
        self.transactional
            .run(&ctx, |tx| {
                req.extensions_mut().insert(ActiveTx(tx.clone()));
                handler.serve(tx, req)
            })
            .await
    }
}

impl<D, H, R> Service<Request> for TransactionalService<D, H, R>
where
    D: Driver + Clone,
    H: TxHandler<D>,
    R: ErrorRenderer,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let this = self.clone();
        let renderer = self.renderer.clone();
        async move {
            let response = match this.serve(req).await {
                Ok(response) => response,
                Err(err) => renderer.render(err.into_not_found()),
            };
            Ok(response)
        }
        .boxed()
    }
}
