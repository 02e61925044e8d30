//! Token relay server
//!
//! Forwards the caller's `Authorization: Bearer` header to the upstream API
//! and returns pages, summaries and karma in a uniform JSON envelope. The
//! relay keeps no sessions: every request brings its own credential.

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::aggregate::{collect_activity, KarmaBreakdown};
use crate::auth::Credential;
use crate::error::{Error, ErrorKind, Result};
use crate::fetch::{HttpPageFetcher, PageFetcher, PageRequest};
use crate::http::HttpClient;
use crate::notify::{NotificationId, NotificationQueue};
use crate::pagination::{ControllerConfig, PaginationController};
use crate::resources::Resource;
use crate::types::Page;

/// Shared state of the relay
#[derive(Clone)]
pub struct AppState {
    client: Arc<HttpClient>,
    controller: ControllerConfig,
    notifications: Arc<NotificationQueue>,
}

impl AppState {
    /// Create relay state over an upstream client
    pub fn new(
        client: Arc<HttpClient>,
        controller: ControllerConfig,
        notifications: Arc<NotificationQueue>,
    ) -> Self {
        Self {
            client,
            controller,
            notifications,
        }
    }

    /// A controller scoped to one request
    ///
    /// Views are never shared between callers, so one caller's cached pages
    /// cannot leak to another.
    fn request_controller(&self) -> Arc<PaginationController<HttpPageFetcher>> {
        Arc::new(
            PaginationController::with_config(
                HttpPageFetcher::new(Arc::clone(&self.client)),
                self.controller.clone(),
            )
            .with_notifications(Arc::clone(&self.notifications)),
        )
    }
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
}

/// Machine-readable failure
#[derive(Debug, Serialize)]
struct ApiError {
    code: &'static str,
    message: String,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(code: &'static str, message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Query of a summary request
#[derive(Debug, Deserialize)]
struct SummaryQuery {
    #[serde(default = "default_top")]
    top: usize,
}

fn default_top() -> usize {
    5
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    // Browser dashboards call the relay cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/listing/*resource", get(listing_page))
        .route("/api/summary/:user", get(summary))
        .route("/api/karma", get(karma))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/:id", delete(dismiss_notification))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Start the relay and run until `shutdown` fires
pub async fn serve(state: AppState, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to {addr}: {e}")))?;
    serve_on(listener, state, shutdown).await
}

/// Run the relay on an already bound listener
pub async fn serve_on(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Starting relay on http://{}", addr);
    }

    let reaper = state.notifications.spawn_reaper(shutdown.child_token());
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    shutdown.cancel();
    let _ = reaper.await;
    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// One page of any listing
async fn listing_page(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(mut query): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let resource: Resource = match resource.parse() {
        Ok(resource) => resource,
        Err(e) => return invalid_request(e.to_string()),
    };

    let after = query.remove("after");
    let mut request = PageRequest::new(resource.resource_id()).after(after);
    if let Some(limit) = query.remove("limit") {
        match limit.parse::<u32>() {
            Ok(limit) => request = request.limit(limit),
            Err(_) => return invalid_request(format!("invalid limit '{limit}'")),
        }
    }
    let request = request.with_params(query);

    let fetcher = HttpPageFetcher::new(Arc::clone(&state.client));
    match fetcher
        .fetch_page(&request, bearer(&headers).as_ref())
        .await
    {
        Ok(page) => ok(page_body(&page)),
        Err(e) => failure(&e),
    }
}

/// Drain and summarize a user's activity
async fn summary(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<SummaryQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(credential) = bearer(&headers) else {
        return failure(&Error::missing_credential(format!("summary of {user}")));
    };

    let controller = state.request_controller();
    match collect_activity(&controller, &user, &credential, query.top).await {
        Ok(report) => ok(report),
        Err(e) => failure(&e),
    }
}

/// Per-community karma of the caller
async fn karma(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(credential) = bearer(&headers) else {
        return failure(&Error::missing_credential("karma"));
    };

    match KarmaBreakdown::fetch(&state.client, &credential).await {
        Ok(karma) => ok(json!({
            "communities": karma.communities,
            "link_karma": karma.link_karma(),
            "comment_karma": karma.comment_karma(),
        })),
        Err(e) => failure(&e),
    }
}

/// Live notifications, oldest first
async fn list_notifications(State(state): State<AppState>) -> Response {
    ok(state.notifications.list())
}

/// Dismiss one notification
async fn dismiss_notification(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Response {
    if state.notifications.dismiss(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(
                "not_found",
                format!("no notification {id}"),
            )),
        )
            .into_response()
    }
}

fn bearer(headers: &HeaderMap) -> Option<Credential> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(Credential::from_authorization_header)
}

fn page_body(page: &Page) -> serde_json::Value {
    json!({ "items": page.items, "after": page.next_cursor })
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

fn invalid_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("invalid_request", message)),
    )
        .into_response()
}

/// Map an upstream failure onto a relay status
///
/// An upstream auth rejection is reported as `auth_expired` so the browser
/// signs the user out.
fn failure(err: &Error) -> Response {
    let (status, code) = match err.kind() {
        ErrorKind::MissingCredential => (StatusCode::UNAUTHORIZED, "missing_credential"),
        ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, "auth_expired"),
        ErrorKind::ServerError | ErrorKind::NetworkError | ErrorKind::MalformedResponse => {
            (StatusCode::BAD_GATEWAY, err.kind().as_str())
        }
        ErrorKind::ClientError => match err {
            Error::ClientError { status: 404, .. } => (StatusCode::NOT_FOUND, "not_found"),
            _ => (StatusCode::BAD_REQUEST, "client_error"),
        },
        ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    if status.is_server_error() {
        tracing::warn!(code, "Relay request failed: {err}");
    }
    (status, Json(ApiResponse::<()>::error(code, err.to_string()))).into_response()
}
