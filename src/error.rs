//! Error types for discovery caching and OIDC authentication.

use axum_core::{body::Body, response::{IntoResponse, Response}};
use http::StatusCode;

/// Errors raised by the discovery cache.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("No discovery URI given and no default URI configured")]
    Configuration,
    #[error("Discovery endpoint {uri} returned HTTP {status}")]
    DiscoveryFetch { status: u16, uri: String },
    #[error("JWKS endpoint {uri} returned HTTP {status}")]
    KeysFetch { status: u16, uri: String },
    #[error("Failed to decode discovery document from {uri}: {source}")]
    DiscoveryDecode {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode JWKS from {uri}: {source}")]
    KeysDecode {
        uri: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Discovery document at {uri} has no jwks_uri")]
    MissingJwksUri { uri: String },
    #[error("Request to {uri} failed: {message}")]
    Transport { uri: String, message: String },
    #[error("Clock error: {0}")]
    Clock(String),
    #[error("Eviction loop cancelled")]
    Cancelled,
}

impl DiscoveryError {
    /// The HTTP status carried by a fetch error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DiscoveryFetch { status, .. } | Self::KeysFetch { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The URI the failing request was addressed to, if any.
    #[must_use]
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::DiscoveryFetch { uri, .. }
            | Self::KeysFetch { uri, .. }
            | Self::DiscoveryDecode { uri, .. }
            | Self::KeysDecode { uri, .. }
            | Self::MissingJwksUri { uri }
            | Self::Transport { uri, .. } => Some(uri),
            Self::Configuration | Self::Clock(_) | Self::Cancelled => None,
        }
    }
}

/// Errors that can occur during OIDC authentication
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
    #[error("Missing authorization header")]
    MissingToken,
    #[error("JWT header missing 'kid' field")]
    MissingKid,
    #[error("No JWK found for kid: {0}")]
    UnknownKid(String),
    #[error("Unusable JWK: {0}")]
    InvalidKey(String),
    #[error("Token validation error: {0}")]
    ValidationError(String),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidToken(_) | Self::ValidationError(_) | Self::UnknownKid(_) => {
                (StatusCode::UNAUTHORIZED, "Invalid authorization token")
            }
            Self::MissingToken | Self::MissingKid => {
                (StatusCode::UNAUTHORIZED, "Missing or invalid authorization token")
            }
            Self::InvalidKey(_) | Self::Discovery(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Authentication service error")
            }
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = status;
        response
    }
}
