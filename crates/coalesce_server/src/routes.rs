// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! HTTP routes.
//!
//! | Route | Response |
//! |---|---|
//! | `GET /cache?key=K` | `{key, value, ttl}` with the raw cached payload |
//! | `POST /cache?key=K&value=V` | stores `V` under the default TTL |
//! | `GET /resolve?key=K` | the coalesced [`Resolution`](coalesce::Resolution); scheduled keys are read from the cache only |
//! | `GET /health` | process liveness |
//! | `GET /healthz` | dependency report, 503 when degraded |

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use coalesce::Source;
use coalesce_store::{StoreError, Ttl, TtlStore};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{AppState, Route};

/// A request that could not be served.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// The `key` parameter is empty.
    #[error("key must not be empty")]
    EmptyKey,

    /// No producer serves the key.
    #[error("no producer for key {0}")]
    UnknownKey(String),

    /// The cache store failed.
    #[error("cache unavailable: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyKey => StatusCode::BAD_REQUEST,
            Self::UnknownKey(_) => StatusCode::NOT_FOUND,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Store(error) = &self {
            tracing::warn!(error = %error, "cache request failed");
        }
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    key: String,
}

impl KeyQuery {
    fn key(self) -> Result<String, ApiError> {
        if self.key.trim().is_empty() {
            return Err(ApiError::EmptyKey);
        }
        Ok(self.key)
    }
}

#[derive(Debug, Deserialize)]
struct SetQuery {
    key: String,
    value: String,
}

/// A raw cache entry as returned by `/cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    /// The requested key.
    pub key: String,
    /// The stored payload, `None` when absent.
    pub value: Option<String>,
    /// Remaining lifetime, `-2` on the wire when absent.
    pub ttl: Ttl,
}

/// Builds the router over `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
    S: TtlStore + Clone + 'static,
{
    Router::new()
        .route("/cache", get(read_entry::<S>).post(write_entry::<S>))
        .route("/resolve", get(resolve::<S>))
        .route("/health", get(liveness))
        .route("/healthz", get(readiness::<S>))
        .with_state(state)
}

async fn read_entry<S: TtlStore>(State(state): State<AppState<S>>, Query(query): Query<KeyQuery>) -> Result<Json<CacheEntry>, ApiError> {
    let key = query.key()?;
    let accessor = state.resolver.accessor();
    let value = accessor.get_raw(&key).await?;
    let ttl = accessor.ttl(&key).await?;
    Ok(Json(CacheEntry { key, value, ttl }))
}

async fn write_entry<S: TtlStore>(State(state): State<AppState<S>>, Query(query): Query<SetQuery>) -> Result<Json<CacheEntry>, ApiError> {
    let key = KeyQuery { key: query.key }.key()?;
    let accessor = state.resolver.accessor();
    let ttl = accessor.default_ttl();
    accessor.set_raw(&key, &query.value, ttl).await?;
    Ok(Json(CacheEntry {
        key,
        value: Some(query.value),
        ttl: Ttl::Remaining(ttl),
    }))
}

async fn resolve<S: TtlStore>(State(state): State<AppState<S>>, Query(query): Query<KeyQuery>) -> Result<Response, ApiError> {
    let key = query.key()?;
    let Some(route) = Route::of(&key) else {
        return Err(ApiError::UnknownKey(key));
    };

    let resolution = if route.is_scheduled() {
        state.resolver.lookup::<serde_json::Value>(&key).await
    } else {
        state.resolver.resolve(&key, &state.producer).await
    };
    tracing::debug!(resolve.key = %key, source = %resolution.source, found = resolution.has_value(), "resolved");
    let status = if resolution.source == Source::Unavailable {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resolution)).into_response())
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness<S>(State(state): State<AppState<S>>) -> Response {
    let report = state.prober.report().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::EmptyKey.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::UnknownKey("x".to_owned()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Store(StoreError::unreachable("refused")).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn blank_keys_are_rejected() {
        assert!(matches!(KeyQuery { key: "  ".to_owned() }.key(), Err(ApiError::EmptyKey)));
        assert_eq!(KeyQuery { key: "fs:tape".to_owned() }.key().unwrap(), "fs:tape");
    }
}
