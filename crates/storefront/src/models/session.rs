//! Session-related types.
//!
//! The session doubles as the visitor's local storage: the cart lives here
//! for guests and signed-in customers alike.

use serde::{Deserialize, Serialize};

use pasta_haus_core::UserId;

/// Session-stored customer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    /// Stable identity-provider subject.
    pub uid: UserId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session keys.
pub mod keys {
    /// The signed-in customer.
    pub const CURRENT_USER: &str = "current_user";

    /// Local cart document, stored under the storefront's prefixed key.
    pub const CART: &str = "pasta-haus-cart";

    /// User id whose remote cart was already merged into this session's cart.
    pub const CART_MERGED_FOR: &str = "cart_merged_for";

    /// Set once the admin password has been verified.
    pub const ADMIN_AUTHENTICATED: &str = "admin_authenticated";

    /// Google OAuth state (CSRF protection).
    pub const OAUTH_STATE: &str = "google_oauth_state";

    /// Path to return to after sign-in.
    pub const OAUTH_RETURN_TO: &str = "google_oauth_return_to";
}
