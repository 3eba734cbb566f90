// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching, caching and key resolution.
//!
//! ## Resolution
//!
//! A token's `kid` is looked up in the identity provider's key set. The first
//! certificate of the matching key's `x5c` chain is wrapped in PEM armor and
//! turned into an RSA verification key. Keys published without a chain but
//! with RSA components (`n`, `e`) are accepted through those components.
//!
//! ## Caching
//!
//! - The key set is cached for a configurable TTL
//! - A `kid` miss on a cached set triggers one refetch, rate limited by a
//!   minimum refresh interval, so key rotation at the provider is picked up
//! - Fetch failures are never masked by a stale set

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64ct::{Base64, Encoding};
use jsonwebtoken::DecodingKey;
use pem::{EncodeConfig, LineEnding, Pem};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::AuthError;
use crate::config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_JWKS_CACHE_TTL, DEFAULT_JWKS_MIN_REFRESH};

/// Key type accepted for token verification.
const RSA_KEY_TYPE: &str = "RSA";

/// A single published signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    #[serde(rename = "kid", default)]
    pub key_id: String,
    #[serde(rename = "use", default)]
    pub usage: String,
    #[serde(rename = "kty")]
    pub key_type: String,
    /// Base64 DER certificates; the first entry is the active certificate.
    #[serde(rename = "x5c", default)]
    pub certificate_chain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl SigningKey {
    /// PEM-armored form of the active certificate, if the key has a chain.
    pub fn certificate_pem(&self) -> Result<Option<String>, AuthError> {
        let Some(first) = self.certificate_chain.first() else {
            return Ok(None);
        };
        let der = Base64::decode_vec(first.trim()).map_err(|e| {
            AuthError::InvalidKey(format!("x5c certificate of `{}` is not base64: {e}", self.key_id))
        })?;
        let armored = pem::encode_config(
            &Pem::new("CERTIFICATE", der),
            EncodeConfig::new().set_line_ending(LineEnding::LF),
        );
        Ok(Some(armored))
    }
}

/// The identity provider's published key set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<SigningKey>,
}

impl KeySet {
    /// Find a key by id. The first entry wins when ids repeat.
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.key_id == kid)
    }
}

/// Key material ready for signature verification.
#[derive(Clone)]
pub struct VerificationKey {
    pub key_id: String,
    /// PEM certificate the key was derived from, when the key had a chain.
    pub certificate_pem: Option<String>,
    decoding_key: DecodingKey,
}

impl VerificationKey {
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("key_id", &self.key_id)
            .field("has_certificate", &self.certificate_pem.is_some())
            .finish()
    }
}

/// Key set cache entry.
struct CacheEntry {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Resolves token key ids against the identity provider's key set.
///
/// A resolver is bound to one issuer; its cache slot is therefore keyed by
/// that issuer.
#[derive(Clone)]
pub struct KeyResolver {
    /// JWKS URL (`<issuer>.well-known/jwks.json`)
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Minimum age of the cached set before a `kid` miss may refetch it
    min_refresh_interval: Duration,
    /// Cached key set
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// Collapses concurrent refetches into one request
    fetch_lock: Arc<Mutex<()>>,
    /// HTTP client
    client: reqwest::Client,
}

impl KeyResolver {
    /// Create a resolver with default timings.
    pub fn new(jwks_url: impl Into<String>) -> Result<Self, AuthError> {
        Self::with_timeout(jwks_url, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a resolver whose key-set fetches are bounded by `timeout`.
    pub fn with_timeout(jwks_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeySetUnavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            min_refresh_interval: DEFAULT_JWKS_MIN_REFRESH,
            cache: Arc::new(RwLock::new(None)),
            fetch_lock: Arc::new(Mutex::new(())),
            client,
        })
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Create with a custom minimum interval between miss-triggered refetches.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Resolve a key id to a verification key.
    pub async fn resolve(&self, kid: &str) -> Result<VerificationKey, AuthError> {
        let (keys, fresh) = self.key_set().await?;
        if let Some(key) = keys.find(kid) {
            return to_verification_key(key);
        }

        // Unknown kid on a cached set: the provider may have rotated keys.
        if !fresh && self.may_refetch().await {
            debug!(kid = %kid, "Key id not in cached key set, refetching");
            let keys = self.refetch_on_miss().await?;
            if let Some(key) = keys.find(kid) {
                return to_verification_key(key);
            }
        }

        warn!(kid = %kid, "No signing key matches token key id");
        Err(AuthError::KeyNotFound(kid.to_string()))
    }

    /// Force refresh the key set cache.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let _guard = self.fetch_lock.lock().await;
        let keys = self.fetch_key_set().await?;
        self.store(keys).await;
        Ok(())
    }

    /// Check if a key set is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        self.cached().await.is_some()
    }

    /// Cached set if still within TTL, else a fresh fetch. The flag reports
    /// whether this call fetched.
    async fn key_set(&self) -> Result<(Arc<KeySet>, bool), AuthError> {
        if let Some(keys) = self.cached().await {
            return Ok((keys, false));
        }

        let _guard = self.fetch_lock.lock().await;
        // Another request may have refreshed while we waited.
        if let Some(keys) = self.cached().await {
            return Ok((keys, false));
        }

        let keys = self.fetch_key_set().await?;
        Ok((self.store(keys).await, true))
    }

    /// Fetch a new set for a `kid` miss. The cached set is replaced only on
    /// success.
    async fn refetch_on_miss(&self) -> Result<Arc<KeySet>, AuthError> {
        let _guard = self.fetch_lock.lock().await;
        // A concurrent miss may have refetched while we waited.
        if !self.may_refetch().await {
            if let Some(keys) = self.cached().await {
                return Ok(keys);
            }
        }
        let keys = self.fetch_key_set().await?;
        Ok(self.store(keys).await)
    }

    async fn cached(&self) -> Option<Arc<KeySet>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| Arc::clone(&entry.keys))
    }

    async fn may_refetch(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() >= self.min_refresh_interval,
            None => true,
        }
    }

    async fn store(&self, keys: KeySet) -> Arc<KeySet> {
        let keys = Arc::new(keys);
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        keys
    }

    /// Fetch the key set from the endpoint.
    async fn fetch_key_set(&self) -> Result<KeySet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::KeySetUnavailable(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let keys: KeySet = response
            .json()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(format!("invalid key set: {e}")))?;

        info!(jwks_url = %self.jwks_url, keys = keys.keys.len(), "Fetched signing key set");
        Ok(keys)
    }
}

/// Convert a published key to verification material.
fn to_verification_key(key: &SigningKey) -> Result<VerificationKey, AuthError> {
    if key.key_type != RSA_KEY_TYPE {
        return Err(AuthError::InvalidKey(format!(
            "key `{}` has unsupported key type `{}`",
            key.key_id, key.key_type
        )));
    }

    if let Some(certificate_pem) = key.certificate_pem()? {
        match DecodingKey::from_rsa_pem(certificate_pem.as_bytes()) {
            Ok(decoding_key) => {
                return Ok(VerificationKey {
                    key_id: key.key_id.clone(),
                    certificate_pem: Some(certificate_pem),
                    decoding_key,
                });
            }
            Err(e) if key.n.is_some() && key.e.is_some() => {
                debug!(kid = %key.key_id, error = %e, "Certificate unusable, falling back to RSA components");
            }
            Err(e) => {
                return Err(AuthError::InvalidKey(format!(
                    "certificate of `{}` is not an RSA certificate: {e}",
                    key.key_id
                )));
            }
        }
    }

    match (&key.n, &key.e) {
        (Some(n), Some(e)) => {
            let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
                AuthError::InvalidKey(format!("RSA components of `{}`: {err}", key.key_id))
            })?;
            Ok(VerificationKey {
                key_id: key.key_id.clone(),
                certificate_pem: None,
                decoding_key,
            })
        }
        _ => Err(AuthError::InvalidKey(format!(
            "key `{}` has neither a certificate chain nor RSA components",
            key.key_id
        ))),
    }
}
