//! Client registrations and the read-only registry that resolves them

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// OAuth2 grant a registration is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
        }
    }
}

/// How the client authenticates itself at the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
}

/// One trust relationship with an authorization server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub registration_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_uri: Option<String>,
    pub grant_type: GrantType,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub client_auth_method: ClientAuthMethod,
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("registration_id", &self.registration_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .field("authorization_uri", &self.authorization_uri)
            .field("grant_type", &self.grant_type)
            .field("scopes", &self.scopes)
            .field("client_auth_method", &self.client_auth_method)
            .finish()
    }
}

/// Resolves a registration id to its registration.
pub trait RegistrationRepository: Send + Sync {
    fn find_by_registration_id(&self, registration_id: &str) -> Option<Arc<ClientRegistration>>;
}

/// Immutable registry populated once from configuration
#[derive(Debug, Default)]
pub struct InMemoryRegistrationRepository {
    registrations: HashMap<String, Arc<ClientRegistration>>,
}

impl InMemoryRegistrationRepository {
    /// Build the registry, rejecting duplicate registration ids.
    pub fn new(registrations: Vec<ClientRegistration>) -> Result<Self, String> {
        let mut map = HashMap::with_capacity(registrations.len());
        for registration in registrations {
            let id = registration.registration_id.clone();
            if map.insert(id.clone(), Arc::new(registration)).is_some() {
                return Err(format!("Duplicate client registration id: {}", id));
            }
        }
        Ok(Self { registrations: map })
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl RegistrationRepository for InMemoryRegistrationRepository {
    fn find_by_registration_id(&self, registration_id: &str) -> Option<Arc<ClientRegistration>> {
        self.registrations.get(registration_id).cloned()
    }
}
