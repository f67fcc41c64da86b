//! HTTP handlers: login, logout, and the command endpoint.

use std::collections::HashMap;

use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::debug;

use harbormail_core::{
    execute, Command, CommandContext, CommandResponse, CoreError, CoreResult, Database,
    MailboxSession, ProviderRegistry,
};

use crate::forms::LoginForm;
use crate::session::{SessionStore, UserSession};

/// Cookie referencing the server-side session.
pub const SESSION_COOKIE: &str = "harbormail_session";

/// Shared state handed to every handler.
pub struct AppState {
    pub registry: ProviderRegistry,
    pub database: Database,
    pub sessions: SessionStore,
    pub fetch_limit: u32,
}

/// Route table, shared with the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(login))
        .route("/logout", web::post().to(logout))
        .route("/query", web::post().to(query))
        .route("/health", web::get().to(health));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// POST /login: check the form, prove the credentials against the
/// provider, hand out a session cookie.
///
/// Every failure collapses to the same message. The client cannot tell
/// a typo from an unsupported provider from a rejected password; the
/// real cause only reaches the log.
async fn login(state: web::Data<AppState>, form: web::Form<LoginForm>) -> HttpResponse {
    let form = form.into_inner();
    match try_login(&state, &form).await {
        Ok(token) => {
            let cookie = Cookie::build(SESSION_COOKIE, token)
                .path("/")
                .http_only(true)
                .finish();
            HttpResponse::Ok()
                .cookie(cookie)
                .json(CommandResponse::ok(json!({ "email": form.email })))
        }
        Err(e) => {
            debug!("Login for {:?} failed: {}", form.email, e);
            HttpResponse::Ok().json(CommandResponse::err(CoreError::Auth.to_string()))
        }
    }
}

async fn try_login(state: &AppState, form: &LoginForm) -> CoreResult<String> {
    form.validate(&state.registry)?;

    // Credential validity is exactly "the LOGIN handshake succeeds"
    let session = MailboxSession::login(&state.registry, &form.email, &form.password).await?;
    session.logout().await?;

    state.database.ensure_user(&form.email).await?;
    let token = state
        .sessions
        .create(form.email.clone(), form.password.clone())
        .await;
    Ok(token)
}

/// POST /logout: drop the server-side session and expire the cookie.
async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }

    let mut expired = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    expired.make_removal();
    HttpResponse::Ok()
        .cookie(expired)
        .json(CommandResponse::ok(json!({ "logged_in": false })))
}

/// POST /query: the command endpoint.
///
/// Always answers HTTP 200 with the `{success, data?, error?}`
/// envelope. Failures ride in the envelope, never in the status code.
async fn query(
    state: web::Data<AppState>,
    req: HttpRequest,
    form: web::Form<HashMap<String, String>>,
) -> HttpResponse {
    let session = match live_session(&state, &req).await {
        Some(session) => session,
        None => return HttpResponse::Ok().json(CommandResponse::err("Not logged in")),
    };

    let command = match Command::from_form(&form, state.fetch_limit) {
        Ok(command) => command,
        Err(e) => return HttpResponse::Ok().json(CommandResponse::err(e.to_string())),
    };

    let ctx = CommandContext {
        registry: &state.registry,
        database: &state.database,
        email: &session.email,
        password: &session.password,
    };
    HttpResponse::Ok().json(execute(&ctx, command).await)
}

async fn live_session(state: &AppState, req: &HttpRequest) -> Option<UserSession> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    state.sessions.resolve(cookie.value()).await
}
