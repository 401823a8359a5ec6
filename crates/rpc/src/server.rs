use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use heartwise_assistant::Gateway;
use heartwise_identity::{IdentityError, SessionKeeper, UserStore};
use heartwise_model::Pipeline;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::pages::{self, Notice};

const SESSION_COOKIE: &str = "heartwise_session";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub users: Arc<UserStore>,
    pub sessions: SessionKeeper,
    pub assistant: Arc<Gateway>,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
    pub prediction_count: Arc<AtomicUsize>,
}

impl AppState {
    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn record_prediction(&self) -> u64 {
        self.prediction_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Username of the authenticated caller, when the request carries a
    /// valid session cookie.
    fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        let token = session_cookie(headers)?;
        self.sessions.verify(&token)
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
    models_loaded: bool,
    chat_enabled: bool,
    req_total: u64,
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    #[serde(default)]
    notice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("HTTP server listening on {addr}");
    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handle_login_page))
        .route("/login", get(handle_login_page).post(handle_login_submit))
        .route(
            "/register",
            get(handle_register_page).post(handle_register_submit),
        )
        .route("/logout", get(handle_logout))
        .route("/predictor", get(handle_predictor_page))
        .route("/predict", post(handle_predict))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    let prefix = format!("{SESSION_COOKIE}=");
    raw.split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .map(str::to_string)
}

fn set_session_cookie(token: &str) -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax"),
    )]
}

fn clear_session_cookie() -> [(header::HeaderName, String); 1] {
    [(
        header::SET_COOKIE,
        format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    )]
}

async fn handle_login_page(
    State(state): State<SharedState>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Response {
    state.record_request();
    if state.current_user(&headers).is_some() {
        return Redirect::to("/predictor").into_response();
    }
    let notice = match query.notice.as_deref() {
        Some("registered") => Some(Notice::success("Registration successful! Please login.")),
        Some("logged_out") => Some(Notice::success("You have been logged out.")),
        _ => None,
    };
    Html(pages::login_page(notice.as_ref())).into_response()
}

async fn handle_login_submit(
    State(state): State<SharedState>,
    Form(credentials): Form<Credentials>,
) -> Response {
    state.record_request();
    match state
        .users
        .authenticate(&credentials.username, &credentials.password)
    {
        Ok(user) => {
            let token = state.sessions.issue(&user.username);
            (set_session_cookie(&token), Redirect::to("/predictor")).into_response()
        }
        Err(IdentityError::InvalidCredential) => Html(pages::login_page(Some(&Notice::danger(
            "Invalid username or password.",
        ))))
        .into_response(),
        Err(err) => {
            warn!("login failed: {err}");
            Html(pages::login_page(Some(&Notice::danger(format!(
                "An error occurred: {err}"
            )))))
            .into_response()
        }
    }
}

async fn handle_register_page(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.record_request();
    if state.current_user(&headers).is_some() {
        return Redirect::to("/predictor").into_response();
    }
    Html(pages::register_page(None)).into_response()
}

async fn handle_register_submit(
    State(state): State<SharedState>,
    Form(credentials): Form<Credentials>,
) -> Response {
    state.record_request();
    // '.' is the session-token separator; keep usernames unambiguous.
    if credentials.username.trim().is_empty() || credentials.username.contains('.') {
        return Html(pages::register_page(Some(&Notice::warning(
            "Usernames must be non-empty and must not contain '.'",
        ))))
        .into_response();
    }

    match state
        .users
        .register(credentials.username.trim(), &credentials.password)
    {
        Ok(user) => {
            info!("registered new user '{}'", user.username);
            Redirect::to("/login?notice=registered").into_response()
        }
        Err(IdentityError::DuplicateUsername) => {
            Html(pages::register_page(Some(&Notice::warning(
                "Username already exists. Please choose a different one.",
            ))))
            .into_response()
        }
        Err(err) => {
            warn!("registration failed: {err}");
            Html(pages::register_page(Some(&Notice::danger(format!(
                "An error occurred: {err}"
            )))))
            .into_response()
        }
    }
}

async fn handle_logout(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.record_request();
    if state.current_user(&headers).is_none() {
        return Redirect::to("/login").into_response();
    }
    (
        clear_session_cookie(),
        Redirect::to("/login?notice=logged_out"),
    )
        .into_response()
}

async fn handle_predictor_page(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    state.record_request();
    if state.current_user(&headers).is_none() {
        return Redirect::to("/login").into_response();
    }
    Html(pages::predictor_page(None, None)).into_response()
}

async fn handle_predict(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    state.record_request();
    if state.current_user(&headers).is_none() {
        return Redirect::to("/login").into_response();
    }

    state.record_prediction();
    match state.pipeline.predict(&fields) {
        Ok(outcome) => Html(pages::predictor_page(Some(&outcome), None)).into_response(),
        Err(err) => {
            // Every pipeline failure is a user-visible notice, never a 500.
            Html(pages::predictor_page(
                None,
                Some(&Notice::danger(err.to_string())),
            ))
            .into_response()
        }
    }
}

async fn handle_chat(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    state.record_request();
    if state.current_user(&headers).is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "authentication required".to_string(),
            }),
        )
            .into_response();
    }

    let response = state.assistant.ask(&request.message).await;
    Json(ChatResponse { response }).into_response()
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let req_total = state.record_request();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_seconds(),
        models_loaded: state.pipeline.is_ready(),
        chat_enabled: state.assistant.is_configured(),
        req_total,
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Response {
    let req_total = state.record_request();
    let predictions = state.prediction_count.load(Ordering::Relaxed);
    let uptime = state.uptime_seconds();
    let models_loaded = if state.pipeline.is_ready() { 1 } else { 0 };

    let mut metrics =
        "# HELP heartwise_http_requests_total Total number of HTTP requests handled\n".to_string();
    metrics.push_str("# TYPE heartwise_http_requests_total counter\n");
    metrics.push_str(&format!("heartwise_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP heartwise_predictions_total Total number of prediction attempts\n");
    metrics.push_str("# TYPE heartwise_predictions_total counter\n");
    metrics.push_str(&format!("heartwise_predictions_total {predictions}\n"));
    metrics.push_str("# HELP heartwise_uptime_seconds Uptime of the service in seconds\n");
    metrics.push_str("# TYPE heartwise_uptime_seconds gauge\n");
    metrics.push_str(&format!("heartwise_uptime_seconds {uptime}\n"));
    metrics.push_str("# HELP heartwise_models_loaded Whether both inference artifacts loaded\n");
    metrics.push_str("# TYPE heartwise_models_loaded gauge\n");
    metrics.push_str(&format!("heartwise_models_loaded {models_loaded}\n"));

    let mut response = Response::new(Body::from(metrics));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
