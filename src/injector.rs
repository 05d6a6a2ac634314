//! Credential injection for requests sent to the MCP server
//!
//! Every outbound request passes through [`CredentialInjector`] once. Requests
//! made inside a user request are handed, untouched, to the
//! [`InteractiveTokenAttacher`]. Everything else gets a machine-to-machine
//! token from the `client_credentials` registration. If that token cannot be
//! obtained the request is never sent.

use async_trait::async_trait;
use http::Extensions;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::sync::Arc;
use tracing::debug;

use crate::context::{CallContext, UserSession};
use crate::error::AuthError;
use crate::registration::RegistrationRepository;
use crate::token::{AccessToken, AuthorizationContext, Principal, TokenProvider};

/// Attaches a user-delegated token to a request and forwards it.
///
/// Implementations decide whether a cached token exists, whether it needs a
/// silent refresh, or whether the call fails because no session exists.
#[async_trait]
pub trait InteractiveTokenAttacher: Send + Sync + 'static {
    async fn filter(
        &self,
        session: &UserSession,
        request: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response>;
}

pub struct CredentialInjector {
    registrations: Arc<dyn RegistrationRepository>,
    token_provider: Arc<dyn TokenProvider>,
    interactive: Arc<dyn InteractiveTokenAttacher>,
    machine_registration_id: String,
}

impl CredentialInjector {
    pub fn new(
        registrations: Arc<dyn RegistrationRepository>,
        token_provider: Arc<dyn TokenProvider>,
        interactive: Arc<dyn InteractiveTokenAttacher>,
        machine_registration_id: impl Into<String>,
    ) -> Self {
        Self {
            registrations,
            token_provider,
            interactive,
            machine_registration_id: machine_registration_id.into(),
        }
    }

    pub fn machine_registration_id(&self) -> &str {
        &self.machine_registration_id
    }

    /// Obtain a token on behalf of the application itself.
    pub async fn acquire_machine_token(&self) -> Result<AccessToken, AuthError> {
        let registration = self
            .registrations
            .find_by_registration_id(&self.machine_registration_id)
            .ok_or_else(|| AuthError::RegistrationNotFound {
                registration_id: self.machine_registration_id.clone(),
            })?;

        let context = AuthorizationContext::new(registration, Principal::anonymous_client());
        self.token_provider.authorize(&context).await
    }

    /// Install the injector in front of `client`.
    pub fn install(self, client: reqwest::Client) -> reqwest_middleware::ClientWithMiddleware {
        reqwest_middleware::ClientBuilder::new(client).with(self).build()
    }
}

/// Set `Authorization: Bearer <token>`, replacing any previous value.
pub fn stamp_bearer(mut request: Request, registration_id: &str, token: &AccessToken) -> Result<Request, AuthError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.value())).map_err(|_| {
        AuthError::exchange_failed(registration_id, "access token is not a valid header value")
    })?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

#[async_trait]
impl Middleware for CredentialInjector {
    async fn handle(
        &self,
        request: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        match CallContext::from_extensions(extensions) {
            CallContext::Interactive(session) => {
                debug!(
                    "Interactive call by {} to {}, delegating token attachment",
                    session.principal,
                    request.url()
                );
                self.interactive.filter(&session, request, extensions, next).await
            }
            CallContext::Background => {
                debug!("Background call to {}, using client credentials", request.url());
                let token = self.acquire_machine_token().await?;
                let request = stamp_bearer(request, &self.machine_registration_id, &token)?;
                next.run(request, extensions).await
            }
        }
    }
}
