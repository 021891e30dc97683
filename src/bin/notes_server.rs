//! Small notes API whose routes each run inside one transaction

use axum::{
    Json, RequestExt, RequestPartsExt, Router,
    extract::{Path, Request},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, PgPool, Postgres};

use transactional::{Error, Tx, config::Config, logging, render_error};

#[derive(Debug, Serialize, sqlx::FromRow)]
struct Note {
    id: i64,
    body: String,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct NewNote {
    body: String,
}

async fn insert_note<'e, E>(executor: E, body: &str) -> Result<Note, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("INSERT INTO notes (body) VALUES ($1) RETURNING id, body, created_at")
        .bind(body)
        .fetch_one(executor)
        .await
}

async fn find_note<'e, E>(executor: E, id: i64) -> Result<Note, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT id, body, created_at FROM notes WHERE id = $1")
        .bind(id)
        .fetch_one(executor)
        .await
}

async fn note_id(req: Request) -> Result<i64, Response> {
    let (mut parts, _) = req.into_parts();
    let Path(id) = parts
        .extract::<Path<i64>>()
        .await
        .map_err(IntoResponse::into_response)?;
    Ok(id)
}

/// POST /notes - Create a note
async fn create_note(tx: Tx<PgPool>, req: Request) -> Result<Response, Error> {
    let Json(payload) = match req.extract::<Json<NewNote>, _>().await {
        Ok(payload) => payload,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let mut conn = tx.lock().await?;
    let note = insert_note(&mut **conn, &payload.body).await?;

    Ok((StatusCode::CREATED, Json(note)).into_response())
}

/// GET /notes/{id} - Fetch a note, 404 when it does not exist
async fn get_note(tx: Tx<PgPool>, req: Request) -> Result<Response, Error> {
    let id = match note_id(req).await {
        Ok(id) => id,
        Err(rejection) => return Ok(rejection),
    };

    let mut conn = tx.lock().await?;
    let note = find_note(&mut **conn, id).await?;

    Ok(Json(note).into_response())
}

/// DELETE /notes/{id} - Delete a note, 404 when it does not exist
async fn delete_note(tx: Tx<PgPool>, req: Request) -> Result<Response, Error> {
    let id = match note_id(req).await {
        Ok(id) => id,
        Err(rejection) => return Ok(rejection),
    };

    let mut conn = tx.lock().await?;
    let result = sqlx::query("DELETE FROM notes WHERE id = $1")
        .bind(id)
        .execute(&mut **conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NoRows);
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn health() -> &'static str {
    "ok"
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = Config::from_env();
    let pool = config
        .connect()
        .await
        .expect("Failed to connect to database");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id BIGSERIAL PRIMARY KEY,
            body TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(&pool)
    .await
    .expect("Failed to create notes table");

    let transactional = config.transactional(pool);

    let app = Router::new()
        .route("/health", get(health))
        .route_service("/notes", transactional.wrap(create_note, render_error))
        .route_service(
            "/notes/{id}",
            transactional.wrap(
                |tx: Tx<PgPool>, req: Request| async move {
                    if req.method() == Method::DELETE {
                        delete_note(tx, req).await
                    } else {
                        get_note(tx, req).await
                    }
                },
                render_error,
            ),
        );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", addr, e));

    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.expect("Server failed");
}
