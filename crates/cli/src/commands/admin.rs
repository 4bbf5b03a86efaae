//! Admin dashboard commands.
//!
//! # Usage
//!
//! ```bash
//! ph-cli admin hash-password 'correct horse battery staple'
//! ```
//!
//! Put the printed PHC string in `STOREFRONT_ADMIN_PASSWORD_HASH`.

use pasta_haus_storefront::services::admin::{self, AdminError};

/// Shortest admin password accepted.
const MIN_PASSWORD_LEN: usize = 12;

/// Errors from admin commands.
#[derive(Debug, thiserror::Error)]
pub enum AdminCommandError {
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    TooShort,

    #[error(transparent)]
    Hash(#[from] AdminError),
}

/// Hash `password` and print the result.
///
/// # Errors
///
/// Returns `AdminCommandError::TooShort` for short passwords.
pub fn hash_password(password: &str) -> Result<(), AdminCommandError> {
    let hash = hash(password)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{hash}");
    }
    tracing::info!("Set STOREFRONT_ADMIN_PASSWORD_HASH to the value above");
    Ok(())
}

fn hash(password: &str) -> Result<String, AdminCommandError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AdminCommandError::TooShort);
    }
    Ok(admin::hash_password(password)?)
}
