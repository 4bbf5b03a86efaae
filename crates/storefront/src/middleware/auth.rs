//! Authentication extractors.
//!
//! Customers are identified by the [`CurrentUser`] stored in their session
//! after Google sign-in. Admin routes check the session flag set by the admin
//! gate. Rejections are JSON 401 responses.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::services::AdminGate;

/// Extractor that requires a signed-in customer.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireUser(user): RequireUser) -> impl IntoResponse {
///     format!("Orders for {}", user.uid)
/// }
/// ```
pub struct RequireUser(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let OptionalUser(user) = OptionalUser::from_request_parts(parts, state).await?;
        user.map(Self)
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }
}

/// Extractor that optionally gets the signed-in customer.
///
/// Unlike `RequireUser`, this does not reject guests.
pub struct OptionalUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Extractor that requires a session that passed the admin gate.
pub struct RequireAdmin;

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        if AdminGate::is_authenticated(session).await {
            Ok(Self)
        } else {
            Err(AppError::Unauthorized("admin login required".to_string()))
        }
    }
}
