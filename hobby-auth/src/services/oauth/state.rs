//! Signed, expiring, single-use CSRF nonces for the OAuth redirect.
//!
//! A nonce has the form `<provider>.<expires_unix>.<random hex>.<hmac hex>`.
//! The same value travels in the `oauth_state` cookie and the provider's
//! `state` query parameter; the callback must present both.

use chrono::Utc;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::services::error::ServiceError;

type HmacSha256 = Hmac<Sha256>;

const KEY_CONTEXT: &[u8] = b"hobby-auth/oauth-state/v1";
const NONCE_BYTES: usize = 16;

#[derive(Clone)]
pub struct OAuthStateStore {
    key: Arc<[u8]>,
    ttl_seconds: i64,
    /// Consumed nonces mapped to their expiry, kept until they would have
    /// expired anyway.
    consumed: Arc<DashMap<String, i64>>,
}

impl OAuthStateStore {
    /// `secret` is the session signing secret; a separate key is derived from
    /// it so state signatures can never be replayed as anything else.
    pub fn new(secret: &[u8], ttl_seconds: u64) -> Result<Self, anyhow::Error> {
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("Invalid OAuth state secret: {}", e))?;
        mac.update(KEY_CONTEXT);
        let key: Vec<u8> = mac.finalize().into_bytes().to_vec();

        Ok(Self {
            key: key.into(),
            ttl_seconds: i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
            consumed: Arc::new(DashMap::new()),
        })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn issue(&self, provider: &str) -> Result<String, ServiceError> {
        self.issue_at(provider, Utc::now().timestamp())
    }

    /// Verify the cookie and query copies of a nonce and burn it.
    pub fn consume(
        &self,
        provider: &str,
        cookie_value: Option<&str>,
        query_value: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.consume_at(provider, cookie_value, query_value, Utc::now().timestamp())
    }

    fn sign(&self, payload: &str) -> Result<HmacSha256, ServiceError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Invalid OAuth state key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub(crate) fn issue_at(&self, provider: &str, now: i64) -> Result<String, ServiceError> {
        let mut random = [0u8; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut random);

        let payload = format!(
            "{}.{}.{}",
            provider,
            now.saturating_add(self.ttl_seconds),
            hex::encode(random)
        );
        let signature = hex::encode(self.sign(&payload)?.finalize().into_bytes());

        Ok(format!("{}.{}", payload, signature))
    }

    pub(crate) fn consume_at(
        &self,
        provider: &str,
        cookie_value: Option<&str>,
        query_value: Option<&str>,
        now: i64,
    ) -> Result<(), ServiceError> {
        let (Some(cookie), Some(query)) = (cookie_value, query_value) else {
            return Err(ServiceError::InvalidState);
        };
        if cookie.is_empty() || !bool::from(cookie.as_bytes().ct_eq(query.as_bytes())) {
            return Err(ServiceError::InvalidState);
        }

        let (payload, signature) = cookie.rsplit_once('.').ok_or(ServiceError::InvalidState)?;
        let signature = hex::decode(signature).map_err(|_| ServiceError::InvalidState)?;
        self.sign(payload)?
            .verify_slice(&signature)
            .map_err(|_| ServiceError::InvalidState)?;

        let mut parts = payload.splitn(3, '.');
        let (Some(nonce_provider), Some(expires), Some(_random)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ServiceError::InvalidState);
        };
        let expires: i64 = expires.parse().map_err(|_| ServiceError::InvalidState)?;

        if nonce_provider != provider || expires <= now {
            return Err(ServiceError::InvalidState);
        }

        self.consumed.retain(|_, exp| *exp > now);
        if self.consumed.insert(payload.to_string(), expires).is_some() {
            tracing::warn!(provider = %provider, "OAuth state replayed");
            return Err(ServiceError::InvalidState);
        }

        Ok(())
    }
}
