//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_ADMIN_PASSWORD_HASH` - Argon2 PHC hash of the admin password
//! - `GOOGLE_CLIENT_ID` - Google OAuth client ID
//! - `GOOGLE_CLIENT_SECRET` - Google OAuth client secret
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BEST_SELLER_TIMEOUT_MS` - Best-seller load timeout (default: 3000)
//! - `STOREFRONT_CATALOG_CACHE_TTL_SECS` - Menu cache lifetime (default: 60)
//! - `STOREFRONT_UTC_OFFSET_MINUTES` - Business time zone for "today" (default: 480)
//! - `STOREFRONT_TRUST_PROXY_HEADERS` - Rate-limit admin login by proxy IP headers (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Argon2 hash of the shared admin password
    pub admin_password_hash: SecretString,
    /// Google sign-in configuration
    pub google: GoogleConfig,
    /// Upper bound on the best-seller query
    pub best_seller_timeout: Duration,
    /// Lifetime of cached catalog reads
    pub catalog_cache_ttl: Duration,
    /// Business time zone, used for the admin "today" window
    pub utc_offset: FixedOffset,
    /// Key the admin login limiter on proxy headers instead of the peer
    /// address. Only set this behind a proxy that overwrites them.
    pub trust_proxy_headers: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Google OAuth client configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct GoogleConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_base_url("STOREFRONT_BASE_URL")?;
        let admin_password_hash = get_password_hash("STOREFRONT_ADMIN_PASSWORD_HASH")?;
        let google = GoogleConfig::from_env()?;

        let best_seller_timeout = Duration::from_millis(get_parsed_or_default(
            "STOREFRONT_BEST_SELLER_TIMEOUT_MS",
            "3000",
        )?);
        let catalog_cache_ttl = Duration::from_secs(get_parsed_or_default(
            "STOREFRONT_CATALOG_CACHE_TTL_SECS",
            "60",
        )?);
        let utc_offset = parse_utc_offset(get_parsed_or_default::<i32>(
            "STOREFRONT_UTC_OFFSET_MINUTES",
            "480",
        )?)?;
        let trust_proxy_headers =
            get_parsed_or_default::<bool>("STOREFRONT_TRUST_PROXY_HEADERS", "false")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            admin_password_hash,
            google,
            best_seller_timeout,
            catalog_cache_ttl,
            utc_offset,
            trust_proxy_headers,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Google redirect URI for this deployment.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.base_url.trim_end_matches('/'))
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl GoogleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client_id: get_required_env("GOOGLE_CLIENT_ID")?,
            client_secret: get_validated_secret("GOOGLE_CLIENT_SECRET")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// A required absolute `http`/`https` URL.
fn get_base_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    let url = url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(value)
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_utc_offset(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "STOREFRONT_UTC_OFFSET_MINUTES".to_string(),
                format!("{minutes} is not a valid UTC offset"),
            )
        })
}

/// Load the admin password hash and check it is a PHC string.
fn get_password_hash(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    if argon2::password_hash::PasswordHash::new(&value).is_err() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "not an Argon2 PHC string (generate one with `ph-cli admin hash-password`)"
                .to_string(),
        ));
    }
    Ok(SecretString::from(value))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

impl StorefrontConfig {
    /// A configuration for tests and local tooling. Nothing is read from the
    /// environment.
    #[must_use]
    pub fn for_tests(admin_password_hash: &str) -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/pasta_haus_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            admin_password_hash: SecretString::from(admin_password_hash),
            google: GoogleConfig {
                client_id: "test-client.apps.googleusercontent.com".to_string(),
                client_secret: SecretString::from("gQ7#kP2!vX9@mZ4$"),
            },
            best_seller_timeout: Duration::from_secs(3),
            catalog_cache_ttl: Duration::from_secs(60),
            utc_offset: Utc.fix(),
            trust_proxy_headers: false,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        // All same character = 0 entropy
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-client-secret", "GOOGLE_CLIENT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_utc_offset_bounds() {
        assert_eq!(parse_utc_offset(480).unwrap().local_minus_utc(), 8 * 3600);
        assert_eq!(parse_utc_offset(-300).unwrap().local_minus_utc(), -5 * 3600);
        assert!(parse_utc_offset(24 * 60).is_err());
    }

    #[test]
    fn test_socket_addr_and_redirect_uri() {
        let mut config = StorefrontConfig::for_tests("unused");
        config.base_url = "https://pastahaus.ph/".to_string();
        config.port = 8080;

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.oauth_redirect_uri(),
            "https://pastahaus.ph/auth/callback"
        );
        assert!(config.is_https());
    }

    #[test]
    fn test_google_config_debug_redacts_secret() {
        let config = GoogleConfig {
            client_id: "client_id_value".to_string(),
            client_secret: SecretString::from("super_secret_client_secret"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_client_secret"));
    }
}
