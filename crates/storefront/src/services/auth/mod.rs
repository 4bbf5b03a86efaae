//! Customer authentication.
//!
//! Customers sign in with Google. The verified identity is kept in the
//! session as a [`CurrentUser`]; signing in also reconciles the guest cart
//! with the customer's stored cart.

mod error;
mod google;

pub use error::AuthError;
pub use google::{GoogleClient, GoogleProfile};

use std::sync::Arc;

use rand::Rng;
use tower_sessions::Session;

use pasta_haus_core::{Cart, UserId};

use super::cart_mirror::CartMirror;
use crate::db::Backend;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};

/// Length of the generated OAuth `state` value.
const OAUTH_STATE_LEN: usize = 32;

/// Generate a cryptographically secure random string.
#[must_use]
pub fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}

impl From<GoogleProfile> for CurrentUser {
    fn from(profile: GoogleProfile) -> Self {
        Self {
            uid: UserId::new(profile.sub),
            display_name: profile.name,
            email: profile.email,
        }
    }
}

/// The signed-in customer for this session, if any.
pub async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Start an OAuth round trip: remember a fresh `state` and return it.
///
/// # Errors
///
/// Returns `AuthError::Session` if the session cannot be written.
pub async fn begin_oauth(session: &Session, return_to: Option<&str>) -> Result<String, AuthError> {
    let state = generate_random_string(OAUTH_STATE_LEN);
    session.insert(session_keys::OAUTH_STATE, &state).await?;

    // Only same-site paths are honored.
    match return_to.filter(|path| path.starts_with('/') && !path.starts_with("//")) {
        Some(path) => session.insert(session_keys::OAUTH_RETURN_TO, path).await?,
        None => {
            session.remove_value(session_keys::OAUTH_RETURN_TO).await?;
        }
    }

    Ok(state)
}

/// Check the `state` returned by the provider. The stored value is consumed
/// either way. Returns where to send the customer next.
///
/// # Errors
///
/// Returns `AuthError::InvalidSessionState` on a missing or mismatched state.
pub async fn finish_oauth(session: &Session, returned_state: &str) -> Result<String, AuthError> {
    let stored: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();
    let return_to: Option<String> = session
        .remove(session_keys::OAUTH_RETURN_TO)
        .await
        .ok()
        .flatten();

    if stored.as_deref() != Some(returned_state) {
        tracing::warn!("OAuth state mismatch");
        return Err(AuthError::InvalidSessionState);
    }

    Ok(return_to.unwrap_or_else(|| "/".to_owned()))
}

/// Record `user` as signed in and merge their stored cart into this session.
///
/// Returns the resulting cart.
///
/// # Errors
///
/// Returns `AuthError::Session` if the session cannot be written. Cart sync
/// problems are logged, never returned.
pub async fn sign_in(
    session: &Session,
    backend: Arc<dyn Backend>,
    user: &CurrentUser,
) -> Result<Cart, AuthError> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.uid, user.email.as_deref());
    tracing::info!(user_id = %user.uid, "Customer signed in");

    Ok(CartMirror::new(backend)
        .merge_on_sign_in(session, &user.uid)
        .await)
}

/// Forget the signed-in customer. The local cart stays with the browser.
///
/// # Errors
///
/// Returns `AuthError::Session` if the session cannot be written.
pub async fn sign_out(session: &Session, backend: Arc<dyn Backend>) -> Result<(), AuthError> {
    if let Some(user) = current_user(session).await {
        tracing::info!(user_id = %user.uid, "Customer signed out");
    }
    session.remove_value(session_keys::CURRENT_USER).await?;
    CartMirror::new(backend).on_sign_out(session).await;
    clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CartRepository, MemoryBackend};
    use crate::services::cart::LocalCart;
    use crate::services::cart::tests::{product, session};

    fn alice() -> CurrentUser {
        CurrentUser {
            uid: UserId::new("google-sub-1"),
            display_name: Some("Alice".to_owned()),
            email: Some("alice@example.com".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let session = session();
        let state = begin_oauth(&session, Some("/checkout")).await.unwrap();
        assert_eq!(state.len(), OAUTH_STATE_LEN);

        assert_eq!(finish_oauth(&session, &state).await.unwrap(), "/checkout");
        assert!(matches!(
            finish_oauth(&session, &state).await,
            Err(AuthError::InvalidSessionState)
        ));
    }

    #[tokio::test]
    async fn test_oauth_rejects_foreign_state_and_offsite_return() {
        let session = session();
        begin_oauth(&session, Some("//evil.example")).await.unwrap();
        assert!(finish_oauth(&session, "forged").await.is_err());

        let state = begin_oauth(&session, Some("https://evil.example")).await.unwrap();
        assert_eq!(finish_oauth(&session, &state).await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_sign_in_merges_then_sign_out_keeps_cart() {
        let session = session();
        let backend = Arc::new(MemoryBackend::new());
        let user = alice();
        let mut stored = Cart::new();
        stored.add(product("4", 260), 1, None, None);
        backend.put_cart(&user.uid, &stored).await.unwrap();
        LocalCart::new(&session).add(product("3", 130), 2, None, None).await;

        let cart = sign_in(&session, backend.clone(), &user).await.unwrap();
        assert_eq!(cart.count(), 3);
        assert_eq!(current_user(&session).await, Some(user.clone()));

        sign_out(&session, backend).await.unwrap();
        assert!(current_user(&session).await.is_none());
        assert_eq!(LocalCart::new(&session).count().await, 3);
    }

    #[test]
    fn test_profile_maps_to_current_user() {
        let user = CurrentUser::from(GoogleProfile {
            sub: "1234".to_owned(),
            name: None,
            email: Some("bob@example.com".to_owned()),
        });
        assert_eq!(user.uid.as_str(), "1234");
        assert!(user.display_name.is_none());
    }
}
