//! HTTP boundary: thin axum handlers over the feed service.

pub mod seed;
pub mod session;

use crate::api::{
    CreateTweetRequest, FeedPage, FeedQuery, ToggleLikeRequest, ToggleLikeResponse, Tweet,
};
use crate::feed::{FeedError, FeedService};
use crate::storage::StorageError;
use axum::extract::{FromRef, FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{async_trait, Json, Router};
use self::session::SessionMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub feed: FeedService,
    pub sessions: SessionMap,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    // Deliberately uncategorized: no partial result escapes, and the
    // caller learns nothing beyond "query failed".
    #[error("query failed")]
    Internal,
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::EmptyContent => ApiError::BadRequest(err.to_string()),
            FeedError::Storage(StorageError::UnknownTweet(id)) => {
                ApiError::NotFound(format!("unknown tweet: {id}"))
            }
            FeedError::Storage(StorageError::UnknownUser(id)) => {
                ApiError::NotFound(format!("unknown user: {id}"))
            }
            FeedError::Storage(err) => {
                error!("storage failure: {err}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Viewer identity resolved from the bearer session token; `None` is an
/// anonymous viewer. Resolution never rejects; mutation handlers decide
/// whether anonymity is acceptable.
pub struct Viewer(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let viewer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .and_then(|token| app.sessions.resolve(token));
        Ok(Viewer(viewer))
    }
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/feed", get(list_feed))
        .route("/tweets", post(create_tweet))
        .route("/likes/toggle", post(toggle_like))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_feed(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, ApiError> {
    let page = state.feed.list_feed(&query, viewer.as_deref()).await?;
    Ok(Json(page))
}

async fn create_tweet(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Json(req): Json<CreateTweetRequest>,
) -> Result<(StatusCode, Json<Tweet>), ApiError> {
    let viewer = viewer.ok_or(ApiError::Unauthorized)?;
    let tweet = state.feed.create_tweet(&req.content, &viewer).await?;
    Ok((StatusCode::CREATED, Json(tweet)))
}

async fn toggle_like(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Json(req): Json<ToggleLikeRequest>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let viewer = viewer.ok_or(ApiError::Unauthorized)?;
    let resp = state.feed.toggle_like(&req.id, &viewer).await?;
    Ok(Json(resp))
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    if state.sessions.is_empty() {
        info!("no sessions provisioned; the server is read-only for everyone");
    }

    let app = create_routes(state);
    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
        info!("received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
