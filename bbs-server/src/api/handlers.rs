//! # Handlers
//!
//! `AuthEndpoints` (§4.10) and `TerminalEndpoints` (§4.11), wired the way
//! the teacher's `auth-service` handlers are: validate, call a service,
//! map the result into a DTO, with the `?` operator propagating `ApiError`
//! straight into `actix_web::ResponseError` (§7).

use actix_web::{web, HttpResponse};
use shared::errors::ApiError;
use shared::validation::validate_request;

use super::dto::*;
use super::state::AppState;
use crate::domain::{NewUser, Role};

// =============================================================================
// AUTH (C10, §4.10)
// =============================================================================

pub async fn register(state: web::Data<AppState>, body: web::Json<RegisterRequest>) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validate_request(&body)?;

    if state.store.user_find_by_username(&body.username).await?.is_some() {
        return Err(ApiError::Conflict { resource: "username".to_string() });
    }
    if let Some(email) = &body.email {
        if state.store.user_find_by_email(email).await?.is_some() {
            return Err(ApiError::Conflict { resource: "email".to_string() });
        }
    }

    let password_hash = state.identity.hash_password(&body.password)?;
    let user = state
        .store
        .user_create(NewUser {
            username: body.username.clone(),
            display_name: body.display_name.clone(),
            email: body.email.clone(),
            password_hash,
            role: Role::User,
        })
        .await?;

    let session = state.sessions.create(body.session_id.clone(), None, None).await?;
    let session = state.sessions.bind_user(&session.key, user.id, user.username.clone(), user.role()).await?;

    Ok(HttpResponse::Ok().json(AuthResponseDto {
        success: true,
        session_id: session.key,
        current_area: session.current_area,
        command_history: session.command_history,
        user: state.identity.public_view(&user),
    }))
}

pub async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validate_request(&body)?;

    let user = state.store.user_find_by_username(&body.username).await?.ok_or(ApiError::InvalidCredentials)?;
    if !state.identity.verify_password(&body.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }
    state.store.user_update_last_login(user.id).await?;

    let session = state.sessions.create(body.session_id.clone(), None, None).await?;
    let session = state.sessions.bind_user(&session.key, user.id, user.username.clone(), user.role()).await?;

    Ok(HttpResponse::Ok().json(AuthResponseDto {
        success: true,
        session_id: session.key,
        current_area: session.current_area,
        command_history: session.command_history,
        user: state.identity.public_view(&user),
    }))
}

pub async fn logout(state: web::Data<AppState>, body: web::Json<LogoutRequest>) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validate_request(&body)?;
    state.sessions.unbind_user(&body.session_id).await?;
    Ok(HttpResponse::Ok().json(MessageResponse { success: true, message: "Logged out.".to_string() }))
}

pub async fn me(state: web::Data<AppState>, query: web::Query<MeQuery>) -> Result<HttpResponse, ApiError> {
    let session = state.sessions.check(&query.session_id).await?;

    let user = match session.user_id {
        Some(user_id) => state.store.user_find_by_id(user_id).await?.map(|u| state.identity.public_view(&u)),
        None => None,
    };

    Ok(HttpResponse::Ok().json(MeResponse {
        success: true,
        is_logged_in: session.is_authenticated(),
        session_id: session.key,
        current_area: session.current_area,
        command_history: session.command_history,
        user,
    }))
}

// =============================================================================
// TERMINAL (C11, §4.11)
// =============================================================================

pub async fn terminal_init(state: web::Data<AppState>, query: web::Query<TerminalInitQuery>) -> Result<HttpResponse, ApiError> {
    let session = match &query.session_id {
        Some(key) => match state.sessions.get(key).await? {
            Some(session) => session,
            None => state.sessions.create(Some(key.clone()), None, None).await?,
        },
        None => state.sessions.create(None, None, None).await?,
    };

    let menu_options: Vec<MenuOption> = state
        .registry
        .list_all()
        .iter()
        .enumerate()
        .map(|(i, app)| MenuOption {
            index: i + 1,
            id: app.id().to_string(),
            name: app.app.name().to_string(),
            description: app.app.description().to_string(),
        })
        .collect();

    let full_welcome_text = state.shell.render_main_menu();
    let simple_welcome_text = "Welcome to the BBS. Type HELP for commands.".to_string();
    let default_welcome_text = if query.simplified { simple_welcome_text.clone() } else { full_welcome_text.clone() };

    Ok(HttpResponse::Ok().json(TerminalInitResponse {
        session_id: session.key,
        current_area: session.current_area,
        default_welcome_text,
        full_welcome_text,
        simple_welcome_text,
        menu_options,
    }))
}

pub async fn terminal_command(state: web::Data<AppState>, body: web::Json<TerminalCommandRequest>) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validate_request(&body)?;

    let outcome = state.shell.dispatch(&body.session_id, &body.command).await?;
    let session = state.sessions.check(&body.session_id).await?;

    Ok(HttpResponse::Ok().json(TerminalCommandResponse {
        success: true,
        message: "ok".to_string(),
        data: TerminalCommandData {
            screen: outcome.screen,
            area: outcome.area,
            response: outcome.response,
            refresh: outcome.refresh,
            session: SessionSnapshot { id: session.key, current_area: session.current_area, command_history: session.command_history },
        },
    }))
}

pub async fn terminal_session(state: web::Data<AppState>, query: web::Query<TerminalSessionQuery>) -> Result<HttpResponse, ApiError> {
    match state.sessions.get(&query.session_id).await? {
        Some(session) => Ok(HttpResponse::Ok().json(TerminalSessionResponse {
            exists: true,
            current_area: Some(session.current_area),
            history_length: Some(session.command_history.len()),
        })),
        None => Ok(HttpResponse::Ok().json(TerminalSessionResponse { exists: false, current_area: None, history_length: None })),
    }
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "bbs-server",
        "timestamp": chrono::Utc::now(),
    }))
}
