//! HTTP transport for the relay.
//!
//! - `POST /shutdown` - arm; body is a JSON string identity
//! - `POST /pending`  - consume; answers JSON `true`/`false`
//! - `GET /health`    - liveness check
//!
//! Bodies are decoded as JSON whatever the `Content-Type` says.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::relay::Relay;
use crate::sweeper::run_sweeper;

/// Transport knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpOptions {
    /// Take the origin from the last `X-Forwarded-For` address, the one the
    /// reverse proxy appended. Only set this behind exactly one proxy that
    /// appends to the header; otherwise clients choose their own origin.
    pub trust_forwarded_for: bool,
}

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
    options: HttpOptions,
}

/// Build the relay router.
///
/// Needs connect info: serve with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(relay: Arc<Relay>, options: HttpOptions) -> Router {
    Router::new()
        .route("/shutdown", post(arm_handler))
        .route("/pending", post(pending_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { relay, options })
}

/// Serve the relay on `listener` and run the expiry sweeper alongside it.
///
/// Returns after `shutdown` is cancelled and in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    relay: Arc<Relay>,
    options: HttpOptions,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let sweeper = tokio::spawn(run_sweeper(Arc::clone(&relay), shutdown.clone()));
    let app = router(relay, options);

    log::info!("Relay listening on {}", listener.local_addr()?);

    let signal = shutdown.clone();
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { signal.cancelled().await })
    .await;

    // Stop the sweeper even if the server failed on its own
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        log::error!("sweeper task failed: {e}");
    }
    log::info!("Relay stopped");
    result
}

async fn arm_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = match decode_identity(&body) {
        Ok(raw) => raw,
        Err(resp) => return resp,
    };
    let origin = request_origin(&headers, peer, state.options.trust_forwarded_for);

    let relay = state.relay;
    match tokio::task::spawn_blocking(move || relay.arm(&raw, &origin.to_string())).await {
        Ok(Ok(())) => StatusCode::OK.into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("arm task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn pending_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let raw = match decode_identity(&body) {
        Ok(raw) => raw,
        Err(resp) => return resp,
    };

    let relay = state.relay;
    match tokio::task::spawn_blocking(move || relay.consume_if_pending(&raw)).await {
        Ok(Ok(present)) => axum::Json(present).into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            log::error!("consume task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Body must be a JSON string.
fn decode_identity(body: &[u8]) -> Result<String, Response> {
    serde_json::from_slice::<String>(body).map_err(|e| {
        log::debug!("rejecting body: {e}");
        StatusCode::BAD_REQUEST.into_response()
    })
}

fn error_response(e: &RelayError) -> Response {
    match e {
        RelayError::InvalidIdentity(msg) => log::debug!("invalid identity: {msg}"),
        RelayError::RateLimited => {}
        RelayError::StoreUnavailable(msg) => log::error!("store unavailable: {msg}"),
    }
    StatusCode::from_u16(e.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

/// The address rate limiting is keyed on. Port is ignored.
///
/// Earlier `X-Forwarded-For` entries are whatever the client sent, so only
/// the last one is used.
fn request_origin(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}
