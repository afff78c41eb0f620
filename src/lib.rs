//! OIDC discovery and JWKS caching for relying parties and resource servers.
//!
//! The center of the crate is [`DiscoveryCache`], a concurrent cache of
//! discovery documents and JSON Web Key Sets keyed by discovery URI. Entries
//! expire after a configurable lifetime and a background loop evicts those
//! that are long past expiry. Run the loop either through a
//! [`DiscoveryHandle`], which owns it, or through an [`EvictionService`]
//! driven by your own task supervisor.
//!
//! On top of the cache, [`validate_token`] and [`OidcAuthenticationLayer`]
//! validate bearer tokens with keys published by the provider.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oidc_discovery::{DiscoveryCache, DiscoveryHandle, DiscoveryOptions};
//!
//! # async fn run() -> Result<(), oidc_discovery::DiscoveryError> {
//! let options = DiscoveryOptions::default().with_issuer("https://idp.example");
//! let cache = DiscoveryHandle::start(Arc::new(DiscoveryCache::new(options)?));
//!
//! let keys = cache.get_discovery_keys(None, None, false).await?;
//! println!("{} signing keys", keys.signing_keys().count());
//!
//! cache.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod document;
pub mod error;
pub mod fetch;
pub mod handle;
pub mod jwks;
pub mod layer;
pub mod token;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use cache::{CacheEntry, CacheStats, SweepStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthenticationConfigProvider, DiscoveryOptions};
pub use discovery::DiscoveryCache;
pub use document::{discovery_uri_for_issuer, DiscoveryDocument, JsonWebKey, JsonWebKeySet};
pub use error::{DiscoveryError, OidcError};
pub use fetch::{FetchResponse, HttpFetcher, ReqwestFetcher};
pub use handle::{DiscoveryHandle, EvictionService};
pub use jwks::{validate_token_with_jwk, TokenExpectations};
pub use layer::{OidcAuthenticationLayer, OidcAuthenticationService};
pub use token::extract_bearer_token;
pub use validation::validate_token;
