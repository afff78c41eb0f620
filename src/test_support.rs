//! Scripted transport shared by the unit tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::{
    error::DiscoveryError,
    fetch::{FetchResponse, HttpFetcher},
};

pub const DISCOVERY_URI: &str = "https://idp.example/.well-known/openid-configuration";
pub const JWKS_URI: &str = "https://idp.example/keys";

/// Serves canned responses per URI and records every request.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, (u16, Bytes)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn route_json(&self, uri: &str, status: u16, body: &Value) {
        self.route_raw(uri, status, body.to_string());
    }

    pub fn route_raw(&self, uri: &str, status: u16, body: impl Into<Bytes>) {
        self.routes
            .lock()
            .unwrap()
            .insert(uri.to_string(), (status, body.into()));
    }

    pub fn calls_to(&self, uri: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == uri).count()
    }

    /// Routes the `idp.example` discovery document and a one-key JWKS.
    pub fn with_idp() -> Self {
        let fetcher = Self::default();
        fetcher.route_json(
            DISCOVERY_URI,
            200,
            &serde_json::json!({
                "issuer": "https://idp.example",
                "jwks_uri": JWKS_URI,
                "id_token_signing_alg_values_supported": ["RS256"]
            }),
        );
        fetcher.route_json(
            JWKS_URI,
            200,
            &serde_json::json!({
                "keys": [{ "kty": "RSA", "kid": "k1", "n": "sXch", "e": "AQAB" }]
            }),
        );
        fetcher
    }
}

#[async_trait]
impl HttpFetcher for ScriptedFetcher {
    async fn get(&self, uri: &str) -> Result<FetchResponse, DiscoveryError> {
        self.calls.lock().unwrap().push(uri.to_string());
        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or((404, Bytes::new()));
        Ok(FetchResponse { status, body })
    }
}
