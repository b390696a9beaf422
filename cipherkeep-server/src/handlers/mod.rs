//! HTTP handlers.

pub mod account;
pub mod mutate;
pub mod sync;

use crate::auth::AuthenticatedAccount;
use crate::error::RelayError;
use axum::http::Extensions;

/// Account attached by the auth middleware.
pub(crate) fn current_account(extensions: &Extensions) -> Result<&AuthenticatedAccount, RelayError> {
    extensions
        .get::<AuthenticatedAccount>()
        .ok_or_else(|| RelayError::Auth("Not authenticated".to_string()))
}
