//! The cloud side of sync: a small document store over HTTP. One JSON
//! document per `users/{user}/data/{recordType}` path, plus an atomic
//! multi-document commit used by bulk uploads.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path as UrlPath, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nosh_core::catalog::RecordType;

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

// --- Storage ---

/// SQLite-backed document table. The batch commit runs in one transaction,
/// which is what gives bulk upload its all-or-nothing guarantee.
pub struct DocDb {
    conn: Connection,
}

impl DocDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = DocDb { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = DocDb { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (path, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(path) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![path, body.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns true when a document was actually removed.
    pub fn delete(&self, path: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM documents WHERE path = ?1", params![path])?;
        Ok(n > 0)
    }

    /// Write every document or none.
    pub fn commit(&mut self, writes: &[(String, Value)]) -> Result<()> {
        let tx = self.conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        for (path, body) in writes {
            tx.execute(
                "INSERT INTO documents (path, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(path) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![path, body.to_string(), now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

// --- Request / response types ---

#[derive(Deserialize)]
struct BatchWrite {
    doc: String,
    body: Value,
}

#[derive(Deserialize)]
struct BatchRequest {
    writes: Vec<BatchWrite>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Only catalogued record types may be stored; anything else is a client bug.
fn validate_doc_id(doc: &str) -> Result<(), ApiError> {
    if RecordType::from_tag(doc).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unknown record type '{doc}'"
        )));
    }
    Ok(())
}

fn doc_path(user: &str, doc: &str) -> String {
    format!("users/{user}/data/{doc}")
}

// --- Middleware ---

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<DocDb>>,
    api_key: Option<String>,
}

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn get_document(
    State(state): State<AppState>,
    UrlPath((user, doc)): UrlPath<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    validate_doc_id(&doc)?;
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    match db.get(&doc_path(&user, &doc))? {
        Some(body) => Ok(Json(body)),
        None => Err(ApiError::NotFound(format!("No {doc} document"))),
    }
}

async fn put_document(
    State(state): State<AppState>,
    UrlPath((user, doc)): UrlPath<(String, String)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    validate_doc_id(&doc)?;
    if !body.is_object() {
        return Err(ApiError::BadRequest(
            "Document body must be a JSON object".to_string(),
        ));
    }
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    db.put(&doc_path(&user, &doc), &body)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_document(
    State(state): State<AppState>,
    UrlPath((user, doc)): UrlPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    validate_doc_id(&doc)?;
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    db.delete(&doc_path(&user, &doc))?;
    // Idempotent: deleting an absent document is still 204
    Ok(StatusCode::NO_CONTENT)
}

async fn commit_batch(
    State(state): State<AppState>,
    UrlPath(user): UrlPath<String>,
    Json(request): Json<BatchRequest>,
) -> Result<StatusCode, ApiError> {
    let mut writes = Vec::with_capacity(request.writes.len());
    for write in &request.writes {
        validate_doc_id(&write.doc)?;
        if !write.body.is_object() {
            return Err(ApiError::BadRequest(format!(
                "Document body for '{}' must be a JSON object",
                write.doc
            )));
        }
        writes.push((doc_path(&user, &write.doc), write.body.clone()));
    }
    let mut db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    db.commit(&writes)?;
    Ok(StatusCode::NO_CONTENT)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/users/{user}/data/{doc}",
            get(get_document).put(put_document).delete(delete_document),
        )
        .route("/api/users/{user}/commit", post(commit_batch))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: DocDb,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_app(api_key: Option<String>) -> Router {
        build_router(AppState {
            db: Arc::new(Mutex::new(DocDb::open_in_memory().unwrap())),
            api_key,
        })
    }

    async fn body_json(response: Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/u1/data/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/u1/data/profile")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // Authed but the document does not exist yet
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let app = test_app(None);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::put("/api/users/u1/data/streakData")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "current": 3, "longest": 8 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/u1/data/streakData")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["current"], 3);
    }

    #[tokio::test]
    async fn unknown_record_type_rejected() {
        let app = test_app(None);

        let response = app
            .oneshot(
                axum::http::Request::put("/api/users/u1/data/passwords")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let app = test_app(None);

        let response = app
            .oneshot(
                axum::http::Request::delete("/api/users/u1/data/favorites")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn commit_writes_all_documents() {
        let app = test_app(None);

        let request = json!({
            "writes": [
                { "doc": "profile", "body": { "onboardingComplete": true } },
                { "doc": "weightLog", "body": { "items": [] } },
            ]
        });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::post("/api/users/u1/commit")
                    .header("content-type", "application/json")
                    .body(Body::from(request.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        for doc in ["profile", "weightLog"] {
            let response = app
                .clone()
                .oneshot(
                    axum::http::Request::get(format!("/api/users/u1/data/{doc}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn commit_with_bad_write_stores_nothing() {
        let app = test_app(None);

        let request = json!({
            "writes": [
                { "doc": "profile", "body": { "onboardingComplete": true } },
                { "doc": "notARecordType", "body": {} },
            ]
        });
        let response = app
            .clone()
            .oneshot(
                axum::http::Request::post("/api/users/u1/commit")
                    .header("content-type", "application/json")
                    .body(Body::from(request.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/u1/data/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "batch must be all-or-nothing");
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app(None);

        let response = app
            .oneshot(
                axum::http::Request::get("/api/users/u1/data/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret db path /home/user/.nosh/db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }
}
