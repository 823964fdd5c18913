//! HTTP surface over the ledger core.
//!
//! Three groups of routes:
//! - `/postback` — partner conversion notifications, JSON body (POST) or
//!   query-string callback (GET, bare `OK`/`ERROR` responses).
//! - `/withdrawals` — request creation and listing for an authenticated
//!   session (session handling itself is an external collaborator).
//! - `/admin/withdrawals` — operator-only status mutations, gated by the
//!   configured bearer token.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, PostbackConfig};
use crate::domain::{ConversionEvent, EntryId, LedgerEntry, UserId, WithdrawalStatus};
use crate::ledger::{LedgerError, SettlementService, WithdrawalManager};
use crate::server::postback::{PostbackBody, PostbackQuery};
use crate::store::StoreError;

pub mod postback;

#[derive(Clone)]
pub struct AppState {
    pub settlement: Arc<SettlementService>,
    pub withdrawals: Arc<WithdrawalManager>,
    pub config: Arc<Config>,
}

pub fn make_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/postback", post(postback_json).get(postback_callback))
        .route("/withdrawals", post(create_withdrawal))
        .route("/withdrawals/:user_id", get(list_user_withdrawals))
        .route(
            "/admin/withdrawals",
            put(admin_update_withdrawal).get(admin_list_withdrawals),
        )
        .with_state(state)
}

/// Bind and serve until the task is aborted.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Ledger server listening");
    axum::serve(
        listener,
        make_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidPayload(_)
        | LedgerError::InvalidAmount(_)
        | LedgerError::InvalidTransition { .. }
        | LedgerError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
        LedgerError::UnknownUser(_) | LedgerError::UnknownRequest(_) => StatusCode::NOT_FOUND,
        LedgerError::ConcurrencyExhausted => StatusCode::CONFLICT,
        LedgerError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (
            status,
            Json(serde_json::json!({
                "status": "error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Client origin: proxy headers when present, otherwise the peer address of
/// the connection itself. A direct connection is judged by its real source,
/// never assumed local.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

fn origin_allowed(config: &PostbackConfig, headers: &HeaderMap, peer: SocketAddr) -> bool {
    if config.allow_unverified_origin {
        return true;
    }
    let ip = client_ip(headers, peer);
    let allowed = config.allowed_ips.contains(&ip);
    if !allowed {
        warn!(%ip, "Rejected postback from unlisted origin");
    }
    allowed
}

#[derive(Debug, Serialize)]
struct PostbackAccepted {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
}

async fn postback_json(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(body): Json<PostbackBody>,
) -> Response {
    if !origin_allowed(&state.config.postback, &headers, peer) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let event = match ConversionEvent::try_from(body) {
        Ok(event) => event,
        Err(err) => return err.into_response(),
    };
    match state.settlement.settle(event).await {
        Ok(_) => Json(PostbackAccepted {
            status: "success",
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

/// The callback-URL binding. Partners expect a bare `OK`/`ERROR` body.
async fn postback_callback(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<PostbackQuery>,
) -> Response {
    if !origin_allowed(&state.config.postback, &headers, peer) {
        return (StatusCode::UNAUTHORIZED, "ERROR").into_response();
    }
    if let Some(secret) = &state.config.postback.secret {
        if query.password.as_deref() != Some(secret.as_str()) {
            warn!("Rejected postback with missing or wrong secret");
            return (StatusCode::UNAUTHORIZED, "ERROR").into_response();
        }
    }
    let event = match ConversionEvent::try_from(query) {
        Ok(event) => event,
        Err(err) => return (status_for(&err), "ERROR").into_response(),
    };
    match state.settlement.settle(event).await {
        Ok(_) => (StatusCode::OK, "OK").into_response(),
        Err(err) => (status_for(&err), "ERROR").into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CreateWithdrawalRequest {
    user_id: String,
    /// Stringly-typed on the wire, like postback amounts.
    amount: String,
    method: String,
    destination: String,
}

#[derive(Debug, Serialize)]
struct CreateWithdrawalResponse {
    success: bool,
    withdrawal_id: EntryId,
}

async fn create_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<CreateWithdrawalRequest>,
) -> Result<Json<CreateWithdrawalResponse>, LedgerError> {
    let amount = body
        .amount
        .trim()
        .parse()
        .map_err(|_| LedgerError::InvalidAmount(body.amount.clone()))?;
    let entry = state
        .withdrawals
        .create_request(body.user_id.into(), amount, body.method, body.destination)
        .await?;
    Ok(Json(CreateWithdrawalResponse {
        success: true,
        withdrawal_id: entry.id,
    }))
}

async fn list_user_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LedgerEntry>>, LedgerError> {
    let user_id: UserId = user_id.into();
    let requests = state.withdrawals.requests_for_user(&user_id).await?;
    Ok(Json(requests))
}

#[derive(Debug, Deserialize)]
struct UpdateWithdrawalRequest {
    request_id: EntryId,
    status: WithdrawalStatus,
    notes: Option<String>,
}

fn admin_authorized(config: &Config, headers: &HeaderMap) -> bool {
    let Some(expected) = &config.admin_token else {
        // No token configured: the operator surface is closed.
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

fn operator_name(headers: &HeaderMap) -> String {
    headers
        .get("x-operator-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("operator")
        .to_owned()
}

async fn admin_update_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UpdateWithdrawalRequest>,
) -> Response {
    if !admin_authorized(&state.config, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let actor = operator_name(&headers);
    match state
        .withdrawals
        .update_status(body.request_id, body.status, &actor, body.notes)
        .await
    {
        Ok(entry) => Json(entry).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn admin_list_withdrawals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if !admin_authorized(&state.config, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match state.withdrawals.all_requests().await {
        Ok(requests) => Json(requests).into_response(),
        Err(err) => err.into_response(),
    }
}
