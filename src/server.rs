//!
//! switchgate HTTP server
//! ----------------------
//! Axum-based HTTP surface over the switch protocol engine.
//!
//! Responsibilities:
//! - Host session management with a simple cookie model (login/logout).
//! - The `/switch` protocol endpoint: parses the switch-to / switch-back
//!   query parameters, runs the engine, and maps the outcome to a redirect
//!   plus the override Set-Cookie, or to a blocking error response.
//! - The `/switch/menu` data feed consumed by the presentation layer.
//! - A dashboard placeholder reporting the effective principal, used as the
//!   redirect target after both transitions.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::engine::{OverrideDirective, SwitchEngine, SwitchRequest};
use crate::error::AppError;
use crate::identity::{
    Directory, InMemoryDirectory, OverrideSlot, Principal, RequestContext, SessionManager,
    ELEVATED_ROLE, OVERRIDE_COOKIE,
};
use crate::token::TokenService;

const SESSION_COOKIE: &str = "switchgate_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<InMemoryDirectory>,
    pub sessions: SessionManager,
    pub engine: Arc<SwitchEngine>,
    pub slot: OverrideSlot,
}

impl AppState {
    pub fn new(config: &Config, directory: Arc<InMemoryDirectory>) -> Self {
        let sessions = SessionManager::default();
        let tokens = TokenService::new(&config.secret, config.token_window_secs);
        let engine = SwitchEngine::new(
            tokens,
            sessions.clone(),
            directory.clone() as Arc<dyn Directory>,
            config.dashboard_url.clone(),
        );
        let slot = OverrideSlot::new(&config.secret);
        Self { directory, sessions, engine: Arc::new(engine), slot }
    }
}

/// Seed a default admin account when the directory has no elevated user yet,
/// so a fresh instance is reachable.
pub fn ensure_default_admin(directory: &InMemoryDirectory) -> anyhow::Result<()> {
    if directory.has_user_with_role(ELEVATED_ROLE) {
        return Ok(());
    }
    let admin = Principal::new(
        "admin",
        "Administrator",
        "admin@localhost",
        vec!["user".into(), ELEVATED_ROLE.into()],
    );
    directory.add_user(admin, "switchgate", chrono::Utc::now().timestamp())?;
    info!("seeded default admin user 'admin' (change its password)");
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/switch", get(switch_handler))
        .route("/switch/menu", get(menu))
        .with_state(state)
}

pub async fn run_with_port(config: Config, directory: Arc<InMemoryDirectory>) -> anyhow::Result<()> {
    ensure_default_admin(&directory)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let app = router(AppState::new(&config, directory));
    info!("switchgate listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // Secure, HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

/// Resolve the request context once per request: session, principal, and the
/// client-supplied override record (tampered or expired reads as absent).
fn context_from(state: &AppState, headers: &HeaderMap) -> RequestContext {
    let session_id = parse_cookie(headers, SESSION_COOKIE);
    let principal = session_id.as_deref().and_then(|sid| state.sessions.current(sid));
    let override_record = parse_cookie(headers, OVERRIDE_COOKIE)
        .and_then(|v| state.slot.decode(&v, chrono::Utc::now().timestamp()));
    RequestContext {
        request_id: Some(uuid::Uuid::new_v4().to_string()),
        session_id,
        principal,
        override_record,
    }
}

fn error_response(err: &AppError) -> (StatusCode, HeaderMap, Json<serde_json::Value>) {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        HeaderMap::new(),
        Json(json!({"status": "error", "code": err.code_str(), "message": err.message()})),
    )
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.directory.authenticate(&payload.username, &payload.password) {
        Ok(true) => {
            // resolve is infallible right after a successful authenticate
            let Some(principal) = state.directory.resolve(&payload.username) else {
                return (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Json(json!({"status":"error"})));
            };
            let sid = state.sessions.establish(principal);
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sid));
            (StatusCode::OK, headers, Json(json!({"status":"ok"})))
        }
        Ok(false) => (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(json!({"status":"unauthorized"}))),
        Err(e) => {
            error!("login error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Json(json!({"status":"error","error": e.to_string()})))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        state.sessions.logout(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

/// The protocol endpoint. On success: 303 redirect to the dashboard plus the
/// override Set-Cookie. On any guard failure: a blocking error response with
/// no redirect and no state change.
async fn switch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let ctx = context_from(&state, &headers);
    let Some(req) = SwitchRequest::from_query(|k| params.get(k).cloned()) else {
        let err = AppError::user("bad_request", "expected switch_to or switch_back parameters");
        return error_response(&err);
    };
    match state.engine.handle(&ctx, &req) {
        Ok(outcome) => {
            let mut h = HeaderMap::new();
            let cookie = match &outcome.override_directive {
                OverrideDirective::Establish(record) => state.slot.set_cookie(record),
                OverrideDirective::Clear => state.slot.clear_cookie(),
            };
            h.insert("Set-Cookie", cookie);
            h.insert("Location", HeaderValue::from_str(&outcome.redirect_to).unwrap_or(HeaderValue::from_static("/")));
            (StatusCode::SEE_OTHER, h, Json(json!({"status": "redirect", "location": outcome.redirect_to})))
        }
        Err(err) => error_response(&err),
    }
}

async fn menu(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = context_from(&state, &headers);
    let menu = state.engine.menu_for(&ctx);
    Json(json!({"status": "ok", "menu": menu}))
}

/// Redirect target after both transitions: reports the effective principal
/// and, while switched, the override holder.
async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let ctx = context_from(&state, &headers);
    let Some(principal) = &ctx.principal else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})));
    };
    let original = ctx.override_record.as_ref().map(|r| r.original_principal_id.clone());
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "effective_principal": principal.user_id,
            "display_name": principal.display_name,
            "override_holder": original,
        })),
    )
}
