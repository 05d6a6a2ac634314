use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::Arc;

use crate::error::AuthError;
use crate::registration::ClientRegistration;

pub mod client_credentials;
pub mod endpoint;

pub use client_credentials::ClientCredentialsTokenProvider;

const ANONYMOUS_CLIENT_PRINCIPAL: &str = "client-credentials-client";
const ROLE_ANONYMOUS: &str = "ROLE_ANONYMOUS";

/// Bearer token issued by an authorization server
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl AccessToken {
    pub fn bearer(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
            expires_at: None,
            scopes: Vec::new(),
        }
    }

    pub fn expires_in(mut self, lifetime: Duration) -> Self {
        self.expires_at = Some(self.issued_at + lifetime);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expired, or expiring within `clock_skew` of `now`. Tokens without an
    /// expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>, clock_skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at - clock_skew,
            None => false,
        }
    }

    pub fn is_expired(&self, clock_skew: Duration) -> bool {
        self.is_expired_at(Utc::now(), clock_skew)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[redacted]")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Identity a token is requested for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub authorities: Vec<String>,
    pub authenticated: bool,
}

impl Principal {
    /// Synthetic identity used for the machine-to-machine grant.
    pub fn anonymous_client() -> Self {
        Self {
            name: ANONYMOUS_CLIENT_PRINCIPAL.to_string(),
            authorities: vec![ROLE_ANONYMOUS.to_string()],
            authenticated: false,
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: Vec::new(),
            authenticated: true,
        }
    }
}

/// A request to obtain a token for a registration and principal
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub registration: Arc<ClientRegistration>,
    pub principal: Principal,
}

impl AuthorizationContext {
    pub fn new(registration: Arc<ClientRegistration>, principal: Principal) -> Self {
        Self {
            registration,
            principal,
        }
    }

    pub fn registration_id(&self) -> &str {
        &self.registration.registration_id
    }
}

/// Obtains access tokens, caching and refreshing them as it sees fit.
///
/// Implementations are shared across concurrent requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn authorize(&self, context: &AuthorizationContext) -> Result<AccessToken, AuthError>;
}
