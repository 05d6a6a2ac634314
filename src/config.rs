//! Configuration for the MCP auth client

use crate::registration::{ClientRegistration, GrantType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_INTERACTIVE_REGISTRATION_ID: &str = "authserver";
pub const DEFAULT_MACHINE_REGISTRATION_ID: &str = "authserver-client-credentials";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Application name, sent as MCP client info
    pub app_name: String,

    /// MCP server endpoint
    pub mcp_server_url: String,

    /// Registration used on behalf of a logged-in user (`authorization_code`)
    pub interactive_registration_id: String,

    /// Registration used on behalf of the application (`client_credentials`)
    pub machine_registration_id: String,

    /// Tokens expiring within this window are treated as expired
    pub clock_skew_secs: u64,

    /// Timeout for MCP and token endpoint requests
    pub request_timeout_ms: u64,

    /// Registrations known to this client
    pub registrations: Vec<ClientRegistration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: "MCP Client".to_string(),
            mcp_server_url: "http://localhost:8081/mcp".to_string(),
            interactive_registration_id: DEFAULT_INTERACTIVE_REGISTRATION_ID.to_string(),
            machine_registration_id: DEFAULT_MACHINE_REGISTRATION_ID.to_string(),
            clock_skew_secs: 60,
            request_timeout_ms: 30_000,
            registrations: Vec::new(),
        }
    }
}

pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig::default(),
        }
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check the registration ids and grant types are consistent.
    ///
    /// Registrations are resolved lazily, so a configured id with no
    /// registration is not an error here. Duplicate ids are rejected when the
    /// registry is built from this config.
    pub fn validate(&self) -> Result<(), String> {
        if self.interactive_registration_id == self.machine_registration_id {
            return Err(format!(
                "Interactive and machine registration ids must differ (both '{}')",
                self.machine_registration_id
            ));
        }

        for registration in &self.registrations {
            url::Url::parse(&registration.token_uri).map_err(|e| {
                format!(
                    "Invalid token_uri for '{}': {}",
                    registration.registration_id, e
                )
            })?;

            let expected = if registration.registration_id == self.machine_registration_id {
                Some(GrantType::ClientCredentials)
            } else if registration.registration_id == self.interactive_registration_id {
                Some(GrantType::AuthorizationCode)
            } else {
                None
            };
            if let Some(expected) = expected {
                if registration.grant_type != expected {
                    return Err(format!(
                        "Registration '{}' must use grant type {}, found {}",
                        registration.registration_id,
                        expected.as_str(),
                        registration.grant_type.as_str()
                    ));
                }
            }
        }

        url::Url::parse(&self.mcp_server_url)
            .map_err(|e| format!("Invalid mcp_server_url: {}", e))?;

        Ok(())
    }

    /// Load configuration from environment and files
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Load configuration, reading `path` instead of `mcp-auth.toml` when given
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut config = config::Config::builder();

        // Start with default
        config = config.add_source(config::Config::try_from(&ClientConfig::default())?);

        // Layer on config file
        match path {
            Some(path) => {
                config = config.add_source(config::File::from(path));
            }
            None => {
                config = config.add_source(config::File::with_name("mcp-auth").required(false));
            }
        }

        // Layer on environment, including a .env file if present
        dotenvy::dotenv().ok();
        config = config.add_source(config::Environment::with_prefix("MCPAUTH"));

        config.build()?.try_deserialize()
    }
}

impl ClientConfigBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    pub fn mcp_server_url(mut self, url: impl Into<String>) -> Self {
        self.config.mcp_server_url = url.into();
        self
    }

    pub fn interactive_registration_id(mut self, id: impl Into<String>) -> Self {
        self.config.interactive_registration_id = id.into();
        self
    }

    pub fn machine_registration_id(mut self, id: impl Into<String>) -> Self {
        self.config.machine_registration_id = id.into();
        self
    }

    pub fn clock_skew(mut self, skew: Duration) -> Self {
        self.config.clock_skew_secs = skew.as_secs();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn registration(mut self, registration: ClientRegistration) -> Self {
        self.config.registrations.push(registration);
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
