//! `client_credentials` token provider with caching and single-flight exchanges
//!
//! Tokens are cached per (registration id, principal name). Each key has its own
//! async mutex: concurrent callers queue on it and re-check the cache once they
//! hold it, so an absent or expired token triggers one exchange at a time.
//! Dropping a caller's future releases the mutex and aborts its HTTP exchange.

use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::endpoint::{self, GrantRequest};
use super::{AccessToken, AuthorizationContext, TokenProvider};
use crate::error::AuthError;
use crate::registration::GrantType;

type CacheKey = (String, String);

pub struct ClientCredentialsTokenProvider {
    http: Client,
    clock_skew: Duration,
    tokens: RwLock<HashMap<CacheKey, AccessToken>>,
    flights: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(http: Client, clock_skew: std::time::Duration) -> Self {
        Self {
            http,
            clock_skew: Duration::from_std(clock_skew).unwrap_or_else(|_| Duration::seconds(60)),
            tokens: RwLock::new(HashMap::new()),
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Drop cached tokens for a registration
    pub async fn evict(&self, registration_id: &str) {
        let mut tokens = self.tokens.write().await;
        tokens.retain(|(id, _), _| id != registration_id);
    }

    async fn cached(&self, key: &CacheKey) -> Option<AccessToken> {
        let tokens = self.tokens.read().await;
        tokens
            .get(key)
            .filter(|token| !token.is_expired(self.clock_skew))
            .cloned()
    }

    async fn flight_guard(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        flights.entry(key.clone()).or_default().clone()
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn authorize(&self, context: &AuthorizationContext) -> Result<AccessToken, AuthError> {
        let registration = &context.registration;
        if registration.grant_type != GrantType::ClientCredentials {
            return Err(AuthError::InvalidRegistration {
                registration_id: registration.registration_id.clone(),
                reason: format!(
                    "expected grant type client_credentials, found {}",
                    registration.grant_type.as_str()
                ),
            });
        }

        let key = (
            registration.registration_id.clone(),
            context.principal.name.clone(),
        );

        if let Some(token) = self.cached(&key).await {
            debug!("Reusing cached token for registration {}", key.0);
            return Ok(token);
        }

        let guard = self.flight_guard(&key).await;
        let _flight = guard.lock().await;

        // Another caller may have finished the exchange while we waited
        if let Some(token) = self.cached(&key).await {
            debug!("Token for registration {} obtained by concurrent exchange", key.0);
            return Ok(token);
        }

        let grant = endpoint::request_token(&self.http, registration, GrantRequest::ClientCredentials).await?;
        let token = grant.access_token;

        info!(
            "Obtained client_credentials token for registration {} (expires: {})",
            key.0,
            token
                .expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );

        self.tokens.write().await.insert(key, token.clone());
        Ok(token)
    }
}
