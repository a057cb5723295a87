//! Verification of provider-issued access tokens.
//!
//! Tokens are JWTs signed by the wallet auth provider. The signing keys are
//! published as a JSON Web Key Set; [`JwtVerifier`] fetches that set, keeps
//! it for a configurable TTL, and refetches early when a token names a key id
//! the cached set does not contain (key rotation).

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::{AuthError, token_prefix};
use crate::config::{ACCEPTED_ISSUERS, Config};

/// Signature algorithms the provider is known to use.
const ACCEPTED_ALGORITHMS: [Algorithm; 2] = [Algorithm::ES256, Algorithm::RS256];

/// Oldest acceptable `iat`, relative to now.
const MAX_TOKEN_AGE_SECS: i64 = 60 * 60;

/// Tolerated clock skew for an `iat` slightly in the future.
const IAT_LEEWAY_SECS: i64 = 60;

/// Upper bound on one key set request. The cache lock is held while it runs.
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A provider key set.
#[derive(Debug, Clone)]
pub struct KeySet {
    inner: JwkSet,
}

impl KeySet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            inner: serde_json::from_str(json)?,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.keys.is_empty()
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.inner.find(kid).is_some()
    }

    /// Key named by `kid`, or the only key when the token names none.
    fn key_for(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.inner.find(kid),
            None if self.inner.keys.len() == 1 => self.inner.keys.first(),
            None => None,
        }
    }
}

/// Claims of a token that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Provider user id (a DID); becomes the user's primary key.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub wallet_address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
    wallet_address: Option<String>,
    email: Option<String>,
}

enum KeySource {
    Remote { client: reqwest::Client, url: String },
    Static(Arc<KeySet>),
}

struct CachedKeys {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Verifies bearer tokens against the provider key set.
pub struct JwtVerifier {
    audience: String,
    issuers: Vec<String>,
    source: KeySource,
    ttl: Duration,
    min_refresh_interval: Duration,
    fetch_timeout: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            KeySource::Remote { url, .. } => url.as_str(),
            KeySource::Static(_) => "static",
        };
        f.debug_struct("JwtVerifier")
            .field("audience", &self.audience)
            .field("source", &source)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl JwtVerifier {
    /// Verifier that fetches keys from `url` and caches them for `ttl`.
    pub fn remote(
        client: reqwest::Client,
        url: impl Into<String>,
        audience: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            audience: audience.into(),
            issuers: ACCEPTED_ISSUERS.iter().map(|s| s.to_string()).collect(),
            source: KeySource::Remote {
                client,
                url: url.into(),
            },
            ttl,
            min_refresh_interval: Duration::from_secs(10),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache: RwLock::new(None),
        }
    }

    /// Verifier over a fixed key set; never touches the network.
    pub fn from_key_set(keys: KeySet, audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            issuers: ACCEPTED_ISSUERS.iter().map(|s| s.to_string()).collect(),
            source: KeySource::Static(Arc::new(keys)),
            ttl: Duration::MAX,
            min_refresh_interval: Duration::MAX,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            cache: RwLock::new(None),
        }
    }

    pub fn from_config(cfg: &Config, client: reqwest::Client) -> Self {
        Self::remote(
            client,
            cfg.jwks_url.clone(),
            cfg.privy_app_id.clone(),
            cfg.jwks_cache_ttl,
        )
    }

    /// Lower bound between two refreshes triggered by unknown key ids.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Retrieve the provider key set.
    ///
    /// Fails with [`AuthError::KeySetFetch`] on any transport error, timeout
    /// or non-2xx status.
    pub async fn fetch_key_set(&self) -> Result<KeySet, AuthError> {
        let (client, url) = match &self.source {
            KeySource::Static(keys) => return Ok(keys.as_ref().clone()),
            KeySource::Remote { client, url } => (client, url),
        };

        debug!(%url, "fetching key set");
        let resp = client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| {
                error!(%url, error = %e, "key set request failed");
                AuthError::KeySetFetch(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            error!(%url, status = status.as_u16(), "key set fetch returned an error status");
            return Err(AuthError::KeySetFetch(format!("HTTP {status}")));
        }

        let inner: JwkSet = resp
            .json()
            .await
            .map_err(|e| AuthError::KeySetFetch(format!("invalid key set body: {e}")))?;
        info!(keys = inner.keys.len(), "key set fetched");
        Ok(KeySet { inner })
    }

    /// Check `token` against `keys`.
    ///
    /// Returns `None` on any failure: bad signature, wrong issuer or
    /// audience, expired, older than one hour, or missing `iat`/`exp`/`sub`.
    pub fn verify(&self, token: &str, keys: &KeySet) -> Option<VerifiedClaims> {
        self.verify_at(token, keys, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, keys: &KeySet, now: i64) -> Option<VerifiedClaims> {
        let prefix = token_prefix(token);

        let header = match decode_header(token) {
            Ok(h) => h,
            Err(e) => {
                debug!(token = %prefix, error = %e, "token header is not decodable");
                return None;
            }
        };
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            warn!(token = %prefix, alg = ?header.alg, "token signed with an unaccepted algorithm");
            return None;
        }
        let Some(jwk) = keys.key_for(header.kid.as_deref()) else {
            debug!(token = %prefix, kid = ?header.kid, "no matching key in key set");
            return None;
        };
        let key = match DecodingKey::from_jwk(jwk) {
            Ok(k) => k,
            Err(e) => {
                warn!(kid = ?header.kid, error = %e, "unusable key in key set");
                return None;
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(self.issuers.as_slice());
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let claims = match decode::<RawClaims>(token, &key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(token = %prefix, error = %e, "token rejected");
                return None;
            }
        };

        let RawClaims {
            sub: Some(sub),
            iat: Some(iat),
            exp: Some(exp),
            wallet_address,
            email,
        } = claims
        else {
            debug!(token = %prefix, "token lacks iat, exp or sub");
            return None;
        };

        if now - iat > MAX_TOKEN_AGE_SECS || iat - now > IAT_LEEWAY_SECS {
            debug!(token = %prefix, iat, now, "token issued outside the accepted window");
            return None;
        }

        debug!(sub = %sub, "token verified");
        Some(VerifiedClaims {
            sub,
            iat,
            exp,
            wallet_address,
            email,
        })
    }

    /// Verify `token` with the cached key set, refreshing it when stale or
    /// when the token names an unknown key id.
    pub async fn authenticate(&self, token: &str) -> Result<VerifiedClaims, AuthError> {
        let kid = decode_header(token)
            .map_err(|_| AuthError::InvalidToken)?
            .kid;

        let mut keys = self.current_keys(false).await?;
        if let Some(kid) = kid.as_deref() {
            if !keys.contains(kid) {
                debug!(kid, "unknown key id; refreshing key set");
                keys = self.current_keys(true).await?;
            }
        }

        self.verify(token, &keys).ok_or(AuthError::InvalidToken)
    }

    async fn current_keys(&self, force_refresh: bool) -> Result<Arc<KeySet>, AuthError> {
        if let KeySource::Static(keys) = &self.source {
            return Ok(Arc::clone(keys));
        }

        let usable = |cached: &CachedKeys| {
            let age = cached.fetched_at.elapsed();
            if force_refresh {
                age < self.min_refresh_interval
            } else {
                age < self.ttl
            }
        };

        {
            let guard = self.cache.read().await;
            if let Some(cached) = guard.as_ref().filter(|c| usable(c)) {
                return Ok(Arc::clone(&cached.keys));
            }
        }

        let mut guard = self.cache.write().await;
        // Another request may have refreshed while this one waited.
        if let Some(cached) = guard.as_ref().filter(|c| usable(c)) {
            return Ok(Arc::clone(&cached.keys));
        }
        let keys = Arc::new(self.fetch_key_set().await?);
        *guard = Some(CachedKeys {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok(keys)
    }
}
