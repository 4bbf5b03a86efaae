//! Admin dashboard gate.
//!
//! A single shared password, verified on the server against an argon2 hash
//! from configuration. Success marks the visitor's session as admin; every
//! admin route checks that flag.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tower_sessions::Session;

use crate::models::session_keys;

/// Errors that can occur at the admin gate.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password hashing error")]
    PasswordHash,

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Verifies the admin password and tracks admin sessions.
pub struct AdminGate<'a> {
    password_hash: &'a SecretString,
}

impl<'a> AdminGate<'a> {
    #[must_use]
    pub const fn new(password_hash: &'a SecretString) -> Self {
        Self { password_hash }
    }

    /// Check the password and mark the session as admin.
    ///
    /// The session id is rotated on success.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::InvalidCredentials` for a wrong password; the
    /// session is left as it was.
    pub async fn login(&self, session: &Session, password: &str) -> Result<(), AdminError> {
        if let Err(e) = verify_password(password, self.password_hash.expose_secret()) {
            tracing::warn!("Rejected admin login attempt");
            return Err(e);
        }

        session.cycle_id().await?;
        session
            .insert(session_keys::ADMIN_AUTHENTICATED, true)
            .await?;
        tracing::info!("Admin signed in");
        Ok(())
    }

    /// Drop the admin flag from the session.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Session` if the session cannot be modified.
    pub async fn logout(session: &Session) -> Result<(), AdminError> {
        session
            .remove_value(session_keys::ADMIN_AUTHENTICATED)
            .await?;
        Ok(())
    }

    /// Whether the session has passed the admin gate.
    pub async fn is_authenticated(session: &Session) -> bool {
        session
            .get::<bool>(session_keys::ADMIN_AUTHENTICATED)
            .await
            .ok()
            .flatten()
            .unwrap_or(false)
    }
}

/// Hash a password for `STOREFRONT_ADMIN_PASSWORD_HASH`.
///
/// # Errors
///
/// Returns `AdminError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AdminError> {
    let mut salt_bytes = [0u8; 16];
    rand::rng().fill(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|_| AdminError::PasswordHash)?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminError::PasswordHash)
}

/// Verify a password against a PHC-format hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AdminError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::cart::tests::session;

    fn secret(password: &str) -> SecretString {
        SecretString::from(hash_password(password).unwrap())
    }

    #[tokio::test]
    async fn test_login_sets_session_flag() {
        let hash = secret("lasagna-for-everyone");
        let session = session();
        assert!(!AdminGate::is_authenticated(&session).await);

        AdminGate::new(&hash)
            .login(&session, "lasagna-for-everyone")
            .await
            .unwrap();
        assert!(AdminGate::is_authenticated(&session).await);

        AdminGate::logout(&session).await.unwrap();
        assert!(!AdminGate::is_authenticated(&session).await);
    }

    #[tokio::test]
    async fn test_wrong_password_is_rejected() {
        let hash = secret("lasagna-for-everyone");
        let session = session();

        let err = AdminGate::new(&hash)
            .login(&session, "baked-mac")
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidCredentials));
        assert!(!AdminGate::is_authenticated(&session).await);
    }

    #[tokio::test]
    async fn test_malformed_hash_never_authenticates() {
        let hash = SecretString::from("not-a-phc-string".to_owned());
        let session = session();
        assert!(AdminGate::new(&hash).login(&session, "anything").await.is_err());
    }

    #[test]
    fn test_hash_is_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }
}
