//! Google OAuth 2.0 / `OpenID` Connect client.
//!
//! # Flow
//!
//! 1. Generate an authorization URL with [`GoogleClient::authorization_url`]
//! 2. Redirect the customer to Google's account chooser
//! 3. Google redirects back with an authorization code
//! 4. Exchange the code with [`GoogleClient::exchange_code`]
//! 5. Fetch the profile with [`GoogleClient::userinfo`]

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Deserialize;

use super::AuthError;
use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Profile claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    /// Stable subject identifier.
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Client for Google sign-in.
#[derive(Clone)]
pub struct GoogleClient {
    inner: Arc<GoogleClientInner>,
}

struct GoogleClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GoogleClient {
    #[must_use]
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            inner: Arc::new(GoogleClientInner {
                client: reqwest::Client::new(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
            }),
        }
    }

    /// Authorization URL that always shows the account chooser.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope=openid%20email%20profile&\
            prompt=select_account&\
            state={}",
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if Google rejects the code.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.inner.client.post(TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!("Token exchange failed: {text}")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// Fetch the signed-in account's profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` if the token is rejected.
    pub async fn userinfo(&self, access_token: &str) -> Result<GoogleProfile, AuthError> {
        let response = self
            .inner
            .client
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "Userinfo request failed with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_authorization_url_prompts_for_account() {
        let client = GoogleClient::new(&GoogleConfig {
            client_id: "client id".to_owned(),
            client_secret: SecretString::from("secret"),
        });
        let url = client.authorization_url("https://pastahaus.ph/auth/callback", "xyz");

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fpastahaus.ph%2Fauth%2Fcallback"));
        assert!(url.contains("state=xyz"));
    }
}
