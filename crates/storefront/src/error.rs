//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Error bodies are JSON: `{ "error": "<message>" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::{
    AddressError, AdminError, AuthError, CatalogError, CheckoutError, OrderError,
};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Placing an order failed.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Order lookup or status change failed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Address operation failed.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Catalog lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Admin gate rejected the request.
    #[error(transparent)]
    Admin(#[from] AdminError),

    /// Customer sign-in failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Caller must sign in first.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(err) => repository_status(err),
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                CheckoutError::Persistence(err) => repository_status(err),
            },
            Self::Order(err) => match err {
                OrderError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderError::InvalidTransition(_)
                | OrderError::NoNextStatus(_)
                | OrderError::StatusChanged(_) => StatusCode::CONFLICT,
                OrderError::Repository(err) => repository_status(err),
            },
            Self::Address(err) => match err {
                AddressError::Invalid(_) => StatusCode::BAD_REQUEST,
                AddressError::NotFound(_) => StatusCode::NOT_FOUND,
                AddressError::Repository(err) => repository_status(err),
            },
            Self::Catalog(err) => match err {
                CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                CatalogError::VariantNotFound { .. } | CatalogError::Unorderable { .. } => {
                    StatusCode::BAD_REQUEST
                }
                CatalogError::Repository(err) => repository_status(err),
            },
            Self::Admin(err) => match err {
                AdminError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AdminError::PasswordHash | AdminError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::Denied(_) | AuthError::InvalidSessionState => StatusCode::UNAUTHORIZED,
                AuthError::MissingCode => StatusCode::BAD_REQUEST,
                AuthError::Provider(_) | AuthError::Http(_) => StatusCode::BAD_GATEWAY,
                AuthError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    fn client_message(&self, status: StatusCode) -> String {
        // Don't expose internal error details to clients
        if status.is_server_error() {
            return match status {
                StatusCode::BAD_GATEWAY => "Sign-in service error".to_string(),
                StatusCode::SERVICE_UNAVAILABLE => {
                    "Service temporarily unavailable, please try again".to_string()
                }
                _ => "Internal server error".to_string(),
            };
        }

        match self {
            Self::Checkout(CheckoutError::EmptyCart) => {
                "Your cart is empty. Add something from the menu before checking out.".to_string()
            }
            Self::Checkout(CheckoutError::NotAuthenticated) => {
                "Please sign in to place your order.".to_string()
            }
            Self::Admin(AdminError::InvalidCredentials) => "Invalid password".to_string(),
            Self::Auth(AuthError::InvalidSessionState) => {
                "Session expired, please try again".to_string()
            }
            Self::Auth(AuthError::Denied(_)) => "Sign-in was cancelled".to_string(),
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            _ => self.to_string(),
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RepositoryError::Database(_)
        | RepositoryError::Serialization(_)
        | RepositoryError::DataCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let message = self.client_message(status);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
