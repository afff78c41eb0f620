//! JWK conversion and JWT validation on top of `jsonwebtoken`.
//!
//! All cryptography stays in `jsonwebtoken`; this module only reshapes
//! cached [`JsonWebKey`]s into the library's types and configures validation.

use std::str::FromStr;

use jsonwebtoken::{jwk::Jwk, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;

use crate::{document::JsonWebKey, error::OidcError};

/// Claims checks applied on top of signature and expiry validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenExpectations {
    /// Required `iss` claim. Unchecked when `None`.
    pub issuer: Option<String>,
    /// Required `aud` claim. Unchecked when `None`.
    pub audience: Option<String>,
}

impl JsonWebKey {
    /// Converts the key into the `jsonwebtoken` representation.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::InvalidKey`] if the key type or its parameters are
    /// not supported by `jsonwebtoken`.
    pub fn to_jwk(&self) -> Result<Jwk, OidcError> {
        serde_json::to_value(self)
            .and_then(serde_json::from_value)
            .map_err(|e| OidcError::InvalidKey(format!("Failed to convert JWK: {e}")))
    }

    /// Builds a verification key from the public parameters.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::InvalidKey`] if the key cannot be converted.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, OidcError> {
        let jwk = self.to_jwk()?;
        DecodingKey::from_jwk(&jwk)
            .map_err(|e| OidcError::InvalidKey(format!("Failed to create DecodingKey from JWK: {e}")))
    }

    /// Checks that the key may verify a token signed with `alg`.
    ///
    /// Keys without an `alg` member accept any algorithm of their type.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::ValidationError`] on a mismatch.
    pub fn check_algorithm(&self, alg: Algorithm) -> Result<(), OidcError> {
        match self.alg.as_deref().map(Algorithm::from_str) {
            Some(Ok(key_alg)) if key_alg != alg => Err(OidcError::ValidationError(format!(
                "Token algorithm {alg:?} does not match key algorithm {key_alg:?}"
            ))),
            _ => Ok(()),
        }
    }
}

/// Validates a JWT token using a specific JWK key.
///
/// This function performs the actual cryptographic validation of the JWT
/// using the provided JWK and algorithm. It returns the decoded claims
/// if validation succeeds.
///
/// # Errors
///
/// Returns [`OidcError::InvalidKey`] if the key is unusable and
/// [`OidcError::ValidationError`] if the signature or claims do not check out.
pub fn validate_token_with_jwk<T: DeserializeOwned>(
    token: &str,
    jwk: &Jwk,
    alg: Algorithm,
    expectations: &TokenExpectations,
) -> Result<T, OidcError> {
    let mut validation = Validation::new(alg);
    match &expectations.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = &expectations.issuer {
        validation.set_issuer(&[issuer]);
    }

    let decoding_key = DecodingKey::from_jwk(jwk)
        .map_err(|e| OidcError::InvalidKey(format!("Failed to create DecodingKey from JWK: {e}")))?;

    let token_data = jsonwebtoken::decode::<T>(token, &decoding_key, &validation)
        .map_err(|e| OidcError::ValidationError(format!("JWT validation failed: {e}")))?;

    Ok(token_data.claims)
}
