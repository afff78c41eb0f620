//! Tower layer and service implementation for OIDC authentication.

use std::{future::Future, marker::PhantomData, pin::Pin, sync::Arc};

use axum_core::{extract::Request, response::{IntoResponse, Response}};
use serde::de::DeserializeOwned;
use tower::{BoxError, Layer, Service};

use crate::{
    config::{AuthenticationConfigProvider, DiscoveryOptions},
    discovery::DiscoveryCache,
    error::DiscoveryError,
    token::extract_bearer_token,
    validation::validate_token,
};

/// A layer that provides `OIDC` authentication for tower and Axum services.
///
/// It extracts the Bearer token from the request headers, validates it against
/// the `OIDC` provider's `JWKS` served by a shared [`DiscoveryCache`], and
/// injects the decoded claims into the request extensions.
///
/// This layer is generic over the configuration type `C` and the type of claims `T`.
#[derive(Clone)]
pub struct OidcAuthenticationLayer<C, T> {
    config: C,
    cache: Arc<DiscoveryCache>,
    _ty: PhantomData<fn() -> T>,
}

impl<C, T> OidcAuthenticationLayer<C, T>
where
    C: AuthenticationConfigProvider + Clone + Send + Sync + 'static,
{
    /// Creates a layer that validates through an existing cache.
    #[must_use]
    pub fn new(config: C, cache: Arc<DiscoveryCache>) -> Self {
        Self {
            config,
            cache,
            _ty: PhantomData,
        }
    }

    /// Creates a layer with its own cache, defaulting to the provider's discovery URI.
    ///
    /// The cache's eviction loop is not started; wrap the returned cache in a
    /// [`DiscoveryHandle`](crate::DiscoveryHandle) to run it.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: C) -> Result<Self, DiscoveryError> {
        let mut options = DiscoveryOptions::default().with_default_uri(config.discovery_uri());
        if let Some(ttl) = config.get_cache_ttl() {
            options = options.with_default_ttl(ttl);
        }
        let cache = Arc::new(DiscoveryCache::new(options)?);
        Ok(Self::new(config, cache))
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<DiscoveryCache> {
        &self.cache
    }
}

impl<S, C, T> Layer<S> for OidcAuthenticationLayer<C, T>
where
    C: AuthenticationConfigProvider + Clone + Send + Sync + 'static,
{
    type Service = OidcAuthenticationService<S, C, T>;

    fn layer(&self, inner: S) -> Self::Service {
        OidcAuthenticationService {
            inner,
            config: self.config.clone(),
            cache: Arc::clone(&self.cache),
            _ty: PhantomData,
        }
    }
}

/// A service that implements `OIDC` authentication for requests.
///
/// Requests without a valid token are answered directly with the response of
/// the corresponding [`OidcError`](crate::OidcError); the inner service never
/// sees them.
#[derive(Clone)]
pub struct OidcAuthenticationService<S, C, T> {
    inner: S,
    config: C,
    cache: Arc<DiscoveryCache>,
    _ty: PhantomData<fn() -> T>,
}

impl<S, C, T> Service<Request> for OidcAuthenticationService<S, C, T>
where
    S: Service<Request, Response = Response> + Send + 'static + Clone,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    C: AuthenticationConfigProvider + Clone + Send + Sync + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Extract token early and return error if missing
        let token = match extract_bearer_token(&req) {
            Ok(token) => token,
            Err(err) => {
                return Box::pin(async move { Ok(err.into_response()) });
            }
        };

        let cache = Arc::clone(&self.cache);
        let config = self.config.clone();
        // Keep the instance that was polled ready and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let claims: T = match validate_token(&cache, &token, &config).await {
                Ok(claims) => claims,
                Err(err) => return Ok(err.into_response()),
            };

            req.extensions_mut().insert(claims);
            inner.call(req).await
        })
    }
}
