//! MCP Auth Client - context-aware OAuth2 credential injection
//!
//! Requests to an MCP server made on behalf of a logged-in user carry that
//! user's token; requests the application makes on its own (startup,
//! background work) carry a `client_credentials` token.

pub mod config;
pub mod context;
pub mod error;
pub mod injector;
pub mod interactive;
pub mod mcp_types;
pub mod registration;
pub mod token;
pub mod transport;

pub use config::ClientConfig;
pub use context::{CallContext, UserSession};
pub use error::{AuthError, Error};
pub use injector::{CredentialInjector, InteractiveTokenAttacher};
pub use interactive::{AuthorizedClient, AuthorizedClientStore, SessionTokenAttacher};
pub use registration::{ClientRegistration, GrantType, InMemoryRegistrationRepository, RegistrationRepository};
pub use token::{AccessToken, AuthorizationContext, ClientCredentialsTokenProvider, Principal, TokenProvider};
pub use transport::McpClient;

use std::sync::Arc;

/// Components built once from a configuration snapshot and shared by reference
#[derive(Clone)]
pub struct AuthClientContext {
    pub config: Arc<ClientConfig>,
    pub registrations: Arc<InMemoryRegistrationRepository>,
    pub token_provider: Arc<ClientCredentialsTokenProvider>,
    pub authorized_clients: Arc<AuthorizedClientStore>,
    http: reqwest::Client,
}

impl AuthClientContext {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        config.validate().map_err(Error::ConfigError)?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let registrations = InMemoryRegistrationRepository::new(config.registrations.clone())
            .map_err(Error::ConfigError)?;

        let token_provider = ClientCredentialsTokenProvider::new(http.clone(), config.clock_skew());

        Ok(Self {
            config: Arc::new(config),
            registrations: Arc::new(registrations),
            token_provider: Arc::new(token_provider),
            authorized_clients: Arc::new(AuthorizedClientStore::new()),
            http,
        })
    }

    /// Injector wired with the session-backed interactive flow
    pub fn credential_injector(&self) -> CredentialInjector {
        let interactive = SessionTokenAttacher::new(
            self.registrations.clone(),
            self.authorized_clients.clone(),
            self.http.clone(),
            self.config.interactive_registration_id.clone(),
            self.config.clock_skew(),
        );

        CredentialInjector::new(
            self.registrations.clone(),
            self.token_provider.clone(),
            Arc::new(interactive),
            self.config.machine_registration_id.clone(),
        )
    }

    pub fn mcp_client(&self) -> McpClient {
        McpClient::new(
            self.config.mcp_server_url.clone(),
            self.http.clone(),
            self.credential_injector(),
        )
    }
}
