//! Google sign-in route handlers.
//!
//! - Login: stores a CSRF `state` and redirects to Google's account chooser
//! - Callback: checks `state`, exchanges the code and signs the customer in
//! - Logout: forgets the customer; the cart stays with the browser

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::OptionalUser;
use crate::models::CurrentUser;
use crate::services::auth::{self, AuthError};
use crate::state::AppState;

/// Query parameters for starting sign-in.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Same-site path to return to afterwards.
    pub return_to: Option<String>,
}

/// Query parameters from the Google OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for tokens.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
}

/// # Route
///
/// `GET /auth/login`
#[instrument(skip(state, session))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect> {
    let oauth_state = auth::begin_oauth(&session, query.return_to.as_deref()).await?;
    let url = state
        .google()
        .authorization_url(&state.config().oauth_redirect_uri(), &oauth_state);
    Ok(Redirect::to(&url))
}

/// # Route
///
/// `GET /auth/callback`
#[instrument(skip(state, session, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let return_to = auth::finish_oauth(&session, query.state.as_deref().unwrap_or_default()).await?;

    if let Some(error) = query.error {
        tracing::info!(error = %error, "Google sign-in was not completed");
        return Err(AuthError::Denied(error).into());
    }
    let code = query.code.ok_or(AuthError::MissingCode)?;

    let redirect_uri = state.config().oauth_redirect_uri();
    let token = state.google().exchange_code(&code, &redirect_uri).await?;
    let profile = state.google().userinfo(&token).await?;

    let user = CurrentUser::from(profile);
    auth::sign_in(&session, state.backend(), &user).await?;

    Ok(Redirect::to(&return_to))
}

/// # Route
///
/// `POST /auth/logout`
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode> {
    auth::sign_out(&session, state.backend()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in customer, or `null`.
///
/// # Route
///
/// `GET /auth/me`
pub async fn me(OptionalUser(user): OptionalUser) -> Json<Option<CurrentUser>> {
    Json(user)
}
