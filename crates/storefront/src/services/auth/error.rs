//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during customer sign-in.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The identity provider reported an error or denied access.
    #[error("sign-in was denied: {0}")]
    Denied(String),

    /// OAuth state missing, reused, or not matching the session.
    #[error("invalid session state")]
    InvalidSessionState,

    /// Callback arrived without an authorization code.
    #[error("missing authorization code")]
    MissingCode,

    /// Token exchange or profile lookup failed.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// HTTP transport failure talking to the provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session could not be read or written.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}
