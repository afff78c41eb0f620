//! Configuration types and traits for discovery caching and OIDC authentication.

use std::time::Duration;

use crate::document::discovery_uri_for_issuer;

/// Default lifetime of a cached discovery document or key set (24 hours)
pub const DEFAULT_DISCOVERY_TTL: Duration = Duration::from_secs(86400);
/// Default pause between eviction sweeps (1 hour)
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(3600);
/// Default time an entry is kept past its expiry before a sweep removes it (1 hour)
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(3600);
/// Default transport timeout for discovery and JWKS requests (10 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default minimum age of a cached key set before an unknown kid may force a refetch (5 seconds)
pub const DEFAULT_MIN_KEYS_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Settings for a [`DiscoveryCache`](crate::DiscoveryCache).
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// URI used when a caller does not name one.
    pub default_uri: Option<String>,
    /// Lifetime of a cache entry when a caller does not override it.
    pub default_ttl: Duration,
    /// Pause between eviction sweeps.
    pub eviction_interval: Duration,
    /// How long past expiry an entry survives a sweep.
    pub eviction_grace: Duration,
    /// Timeout applied by the default HTTP transport.
    pub request_timeout: Duration,
    /// User agent sent by the default HTTP transport.
    pub user_agent: String,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            default_uri: None,
            default_ttl: DEFAULT_DISCOVERY_TTL,
            eviction_interval: DEFAULT_EVICTION_INTERVAL,
            eviction_grace: DEFAULT_EVICTION_GRACE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: format!("oidc-discovery/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DiscoveryOptions {
    #[must_use]
    pub fn with_default_uri(mut self, uri: impl Into<String>) -> Self {
        self.default_uri = Some(uri.into());
        self
    }

    /// Uses the well-known discovery URI of `issuer` as the default.
    #[must_use]
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_default_uri(discovery_uri_for_issuer(issuer))
    }

    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_eviction(mut self, interval: Duration, grace: Duration) -> Self {
        self.eviction_interval = interval;
        self.eviction_grace = grace;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Trait for providing `OIDC` authentication configuration.
pub trait AuthenticationConfigProvider {
    /// Returns the URL of the `OIDC` provider.
    ///
    /// This URL should be the base URL of the `OIDC` provider, such as `https://example.com`.
    fn get_provider_url(&self) -> String;

    /// Returns the URL for the `OpenID` Connect configuration.
    /// If `None`, the default URL will be constructed as `<provider_url>/.well-known/openid-configuration`.
    fn get_openid_configuration_url(&self) -> Option<String> {
        None
    }

    /// Returns the audience tokens must be issued for.
    /// If `None`, the `aud` claim is not checked.
    fn get_audience(&self) -> Option<String> {
        None
    }

    /// Returns the lifetime of cached discovery data for this provider.
    /// If `None`, the cache's default applies.
    fn get_cache_ttl(&self) -> Option<Duration> {
        None
    }

    /// Returns how old the cached key set must be before a token with an
    /// unknown kid may force a refetch.
    fn get_min_keys_refresh_interval(&self) -> Duration {
        DEFAULT_MIN_KEYS_REFRESH_INTERVAL
    }

    /// The discovery URI resolved from the two URL settings above.
    fn discovery_uri(&self) -> String {
        self.get_openid_configuration_url()
            .unwrap_or_else(|| discovery_uri_for_issuer(&self.get_provider_url()))
    }
}
