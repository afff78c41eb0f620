//! Token validation against keys served by the discovery cache.

use jsonwebtoken::decode_header;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    config::AuthenticationConfigProvider,
    discovery::DiscoveryCache,
    error::OidcError,
    jwks::{validate_token_with_jwk, TokenExpectations},
};

/// Validates a JWT against the provider described by `config`.
///
/// This is the main validation orchestration function that:
/// 1. Extracts the key ID from the token header
/// 2. Resolves the provider's discovery document and key set through the cache
/// 3. Refreshes the key set once if the key ID is unknown (key rotation),
///    unless the cached set is younger than the provider's minimum refresh interval
/// 4. Validates signature, expiry, issuer and, when configured, audience
///
/// # Errors
///
/// Returns [`OidcError`] if the token is malformed, signed with an unknown
/// key, fails validation, or the provider's metadata cannot be fetched.
pub async fn validate_token<T, C>(
    cache: &DiscoveryCache,
    token: &str,
    config: &C,
) -> Result<T, OidcError>
where
    T: DeserializeOwned,
    C: AuthenticationConfigProvider + ?Sized,
{
    let header = decode_header(token)
        .map_err(|e| OidcError::InvalidToken(format!("Failed to decode JWT header: {e}")))?;
    let kid = header.kid.ok_or(OidcError::MissingKid)?;

    let discovery_uri = config.discovery_uri();
    let ttl = config.get_cache_ttl();

    let document = cache.get_discovery(Some(&discovery_uri), ttl, false).await?;
    let keys = cache.get_discovery_keys(Some(&discovery_uri), ttl, false).await?;

    let jwk = match keys.find(&kid) {
        Some(jwk) => jwk.clone(),
        None => {
            let min_age = config.get_min_keys_refresh_interval();
            if let Some(age) = cache.key_set_age(Some(&discovery_uri)) {
                if age < min_age {
                    warn!(
                        kid = %kid,
                        uri = %discovery_uri,
                        age_ms = age.as_millis() as u64,
                        "Unknown kid, JWKS fetched too recently to refresh"
                    );
                    return Err(OidcError::UnknownKid(kid));
                }
            }
            debug!(kid = %kid, uri = %discovery_uri, "Unknown kid, refreshing JWKS");
            let refreshed = cache.get_discovery_keys(Some(&discovery_uri), ttl, true).await?;
            refreshed.find(&kid).cloned().ok_or_else(|| {
                warn!(kid = %kid, uri = %discovery_uri, "No JWK found after refresh");
                OidcError::UnknownKid(kid.clone())
            })?
        }
    };

    jwk.check_algorithm(header.alg)?;

    let expectations = TokenExpectations {
        issuer: document.issuer.clone(),
        audience: config.get_audience(),
    };
    validate_token_with_jwk(token, &jwk.to_jwk()?, header.alg, &expectations)
}
