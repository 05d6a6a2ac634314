//! User-delegated tokens for requests made inside a user request
//!
//! The login flow stores an [`AuthorizedClient`] per (registration, principal)
//! once the user has completed the `authorization_code` grant. This attacher
//! reuses it, refreshes it silently when it has expired, and fails with
//! [`AuthError::InteractiveAuthRequired`] when neither is possible.
//!
//! Refreshes are single flight per (registration, principal): callers that
//! queue behind a refresh re-read the store and reuse its result.

use async_trait::async_trait;
use chrono::Duration;
use http::Extensions;
use reqwest::{Client, Request, Response};
use reqwest_middleware::Next;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::context::UserSession;
use crate::error::AuthError;
use crate::injector::{stamp_bearer, InteractiveTokenAttacher};
use crate::registration::RegistrationRepository;
use crate::token::endpoint::{self, GrantRequest};
use crate::token::AccessToken;

/// Tokens a user has authorized this client to use
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    pub registration_id: String,
    pub principal: String,
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
}

type ClientKey = (String, String);

#[derive(Default)]
pub struct AuthorizedClientStore {
    clients: RwLock<HashMap<ClientKey, AuthorizedClient>>,
}

impl AuthorizedClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, client: AuthorizedClient) {
        let key = (client.registration_id.clone(), client.principal.clone());
        self.clients.write().await.insert(key, client);
    }

    pub async fn load(&self, registration_id: &str, principal: &str) -> Option<AuthorizedClient> {
        let clients = self.clients.read().await;
        clients
            .get(&(registration_id.to_string(), principal.to_string()))
            .cloned()
    }

    pub async fn remove(&self, registration_id: &str, principal: &str) {
        self.clients
            .write()
            .await
            .remove(&(registration_id.to_string(), principal.to_string()));
    }

    /// Remove the client only while it still holds `refresh_token`.
    ///
    /// Returns whether a client was removed. A client saved in the meantime
    /// (a new login or a concurrent refresh) is left alone.
    pub async fn remove_if_refresh_token(
        &self,
        registration_id: &str,
        principal: &str,
        refresh_token: Option<&str>,
    ) -> bool {
        let mut clients = self.clients.write().await;
        let key = (registration_id.to_string(), principal.to_string());
        match clients.get(&key) {
            Some(client) if client.refresh_token.as_deref() == refresh_token => {
                clients.remove(&key);
                true
            }
            _ => false,
        }
    }
}

pub struct SessionTokenAttacher {
    registrations: Arc<dyn RegistrationRepository>,
    store: Arc<AuthorizedClientStore>,
    http: Client,
    registration_id: String,
    clock_skew: Duration,
    refreshes: Mutex<HashMap<ClientKey, Arc<Mutex<()>>>>,
}

impl SessionTokenAttacher {
    pub fn new(
        registrations: Arc<dyn RegistrationRepository>,
        store: Arc<AuthorizedClientStore>,
        http: Client,
        registration_id: impl Into<String>,
        clock_skew: std::time::Duration,
    ) -> Self {
        Self {
            registrations,
            store,
            http,
            registration_id: registration_id.into(),
            clock_skew: Duration::from_std(clock_skew).unwrap_or_else(|_| Duration::seconds(60)),
            refreshes: Mutex::new(HashMap::new()),
        }
    }

    async fn refresh_guard(&self, principal: &str) -> Arc<Mutex<()>> {
        let mut refreshes = self.refreshes.lock().await;
        refreshes
            .entry((self.registration_id.clone(), principal.to_string()))
            .or_default()
            .clone()
    }

    async fn load_client(&self, principal: &str) -> Result<AuthorizedClient, AuthError> {
        self.store
            .load(&self.registration_id, principal)
            .await
            .ok_or_else(|| {
                AuthError::interactive_required(
                    &self.registration_id,
                    format!("no authorized client for {}", principal),
                )
            })
    }

    /// Current access token for the session's user, refreshed if needed
    pub async fn authorized_token(&self, session: &UserSession) -> Result<AccessToken, AuthError> {
        let registration = self
            .registrations
            .find_by_registration_id(&self.registration_id)
            .ok_or_else(|| AuthError::RegistrationNotFound {
                registration_id: self.registration_id.clone(),
            })?;

        let client = self.load_client(&session.principal).await?;
        if !client.access_token.is_expired(self.clock_skew) {
            return Ok(client.access_token);
        }

        let guard = self.refresh_guard(&session.principal).await;
        let _refresh = guard.lock().await;

        // A concurrent request may have refreshed or dropped the client while we waited
        let client = self.load_client(&session.principal).await?;
        if !client.access_token.is_expired(self.clock_skew) {
            debug!("Access token for {} refreshed by concurrent request", session.principal);
            return Ok(client.access_token);
        }

        let Some(refresh_token) = client.refresh_token.as_deref() else {
            self.store
                .remove_if_refresh_token(&self.registration_id, &session.principal, None)
                .await;
            return Err(AuthError::interactive_required(
                &self.registration_id,
                "access token expired and no refresh token is available",
            ));
        };

        debug!("Refreshing access token for {}", session.principal);
        let grant = match endpoint::request_token(
            &self.http,
            &registration,
            GrantRequest::RefreshToken(refresh_token),
        )
        .await
        {
            Ok(grant) => grant,
            Err(e) if e.is_grant_rejected() => {
                warn!("Token refresh for {} rejected: {}", session.principal, e);
                self.store
                    .remove_if_refresh_token(
                        &self.registration_id,
                        &session.principal,
                        Some(refresh_token),
                    )
                    .await;
                return Err(AuthError::interactive_required(
                    &self.registration_id,
                    format!("token refresh failed: {}", e),
                ));
            }
            Err(e) => {
                // Not a rejection: the client keeps its refresh token
                warn!("Token refresh for {} failed: {}", session.principal, e);
                return Err(e);
            }
        };

        info!("Refreshed access token for {}", session.principal);
        let refreshed = AuthorizedClient {
            registration_id: self.registration_id.clone(),
            principal: session.principal.clone(),
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token.or(client.refresh_token),
        };
        self.store.save(refreshed).await;

        Ok(grant.access_token)
    }
}

#[async_trait]
impl InteractiveTokenAttacher for SessionTokenAttacher {
    async fn filter(
        &self,
        session: &UserSession,
        request: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.authorized_token(session).await?;
        let request = stamp_bearer(request, &self.registration_id, &token)?;
        next.run(request, extensions).await
    }
}
