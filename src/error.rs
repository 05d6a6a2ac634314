//! Error types for credential injection and MCP calls

use thiserror::Error;

/// Failures raised while attaching credentials to an outbound request.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Client registration not found: {registration_id}")]
    RegistrationNotFound { registration_id: String },

    #[error("Invalid client registration '{registration_id}': {reason}")]
    InvalidRegistration {
        registration_id: String,
        reason: String,
    },

    #[error("Token exchange failed for '{registration_id}': {reason}")]
    TokenExchangeFailed {
        registration_id: String,
        reason: String,
        /// OAuth `error` code when the endpoint answered with an error response
        oauth_error: Option<String>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Interactive authentication required for '{registration_id}': {reason}")]
    InteractiveAuthRequired {
        registration_id: String,
        reason: String,
    },
}

impl AuthError {
    pub(crate) fn exchange_failed(registration_id: &str, reason: impl Into<String>) -> Self {
        AuthError::TokenExchangeFailed {
            registration_id: registration_id.to_string(),
            reason: reason.into(),
            oauth_error: None,
            source: None,
        }
    }

    pub(crate) fn interactive_required(registration_id: &str, reason: impl Into<String>) -> Self {
        AuthError::InteractiveAuthRequired {
            registration_id: registration_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Missing or misnamed registration, or a registration unusable for its role.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::RegistrationNotFound { .. } | AuthError::InvalidRegistration { .. }
        )
    }

    /// The end user has to log in again.
    pub fn is_reauthentication(&self) -> bool {
        matches!(self, AuthError::InteractiveAuthRequired { .. })
    }

    /// The authorization server rejected the exchange or could not be reached.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::TokenExchangeFailed { .. })
    }

    /// The authorization server answered with an OAuth error response, so
    /// repeating the same grant cannot succeed.
    pub fn is_grant_rejected(&self) -> bool {
        matches!(
            self,
            AuthError::TokenExchangeFailed {
                oauth_error: Some(_),
                ..
            }
        )
    }

    /// Recover an `AuthError` that travelled through the middleware pipeline.
    pub fn from_middleware(err: &reqwest_middleware::Error) -> Option<&AuthError> {
        match err {
            reqwest_middleware::Error::Middleware(inner) => inner.downcast_ref::<AuthError>(),
            reqwest_middleware::Error::Reqwest(_) => None,
        }
    }
}

impl From<AuthError> for reqwest_middleware::Error {
    fn from(err: AuthError) -> Self {
        reqwest_middleware::Error::Middleware(anyhow::Error::new(err))
    }
}

/// Errors surfaced by the MCP client.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(inner) => match inner.downcast::<AuthError>() {
                Ok(auth) => Error::Auth(auth),
                Err(other) => Error::NetworkError(format!("{:#}", other)),
            },
            reqwest_middleware::Error::Reqwest(e) => {
                Error::NetworkError(format!("Request failed: {}", e))
            }
        }
    }
}
