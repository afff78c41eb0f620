//! Bearer token extraction from incoming requests.

use axum_core::extract::Request;
use http::header::AUTHORIZATION;

use crate::error::OidcError;

/// Extracts Bearer token from the Authorization header.
///
/// This function looks for the "Authorization" header and extracts the token
/// from a "Bearer \<token\>" format. Returns an error if the header is missing,
/// doesn't follow the expected format, or carries an empty token.
pub fn extract_bearer_token(req: &Request) -> Result<String, OidcError> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .ok_or(OidcError::MissingToken)
}
