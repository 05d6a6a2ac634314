//! Token endpoint exchange (RFC 6749 sections 4.4, 5 and 6)

use base64::{engine::general_purpose, Engine as _};
use chrono::Duration;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::AccessToken;
use crate::error::AuthError;
use crate::registration::{ClientAuthMethod, ClientRegistration};

/// Grant submitted to the token endpoint
#[derive(Debug, Clone, Copy)]
pub enum GrantRequest<'a> {
    ClientCredentials,
    RefreshToken(&'a str),
}

impl GrantRequest<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            GrantRequest::ClientCredentials => "client_credentials",
            GrantRequest::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Successful token response
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// POST a grant to the registration's token endpoint.
pub async fn request_token(
    http: &Client,
    registration: &ClientRegistration,
    grant: GrantRequest<'_>,
) -> Result<TokenGrant, AuthError> {
    let registration_id = registration.registration_id.as_str();

    let mut form: Vec<(&str, String)> = vec![("grant_type", grant.grant_type().to_string())];
    match grant {
        GrantRequest::ClientCredentials => {
            if !registration.scopes.is_empty() {
                form.push(("scope", registration.scopes.join(" ")));
            }
        }
        GrantRequest::RefreshToken(refresh_token) => {
            form.push(("refresh_token", refresh_token.to_string()));
        }
    }

    let mut request = http
        .post(&registration.token_uri)
        .header(ACCEPT, HeaderValue::from_static("application/json"));

    match registration.client_auth_method {
        ClientAuthMethod::ClientSecretBasic => {
            request = request.header(AUTHORIZATION, basic_credentials(registration)?);
        }
        ClientAuthMethod::ClientSecretPost => {
            form.push(("client_id", registration.client_id.clone()));
            form.push(("client_secret", registration.client_secret.clone()));
        }
    }

    debug!(
        "Requesting {} token for registration {}",
        grant.grant_type(),
        registration_id
    );

    let response = request
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::TokenExchangeFailed {
            registration_id: registration_id.to_string(),
            reason: "token endpoint unreachable".to_string(),
            oauth_error: None,
            source: Some(e),
        })?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| AuthError::TokenExchangeFailed {
            registration_id: registration_id.to_string(),
            reason: "failed to read token response".to_string(),
            oauth_error: None,
            source: Some(e),
        })?;

    if !status.is_success() {
        let error_response = serde_json::from_slice::<ErrorResponse>(&body).ok();
        let reason = match &error_response {
            Some(ErrorResponse {
                error,
                error_description: Some(description),
            }) => format!("HTTP {}: {} ({})", status, error, description),
            Some(ErrorResponse { error, .. }) => format!("HTTP {}: {}", status, error),
            None => format!("HTTP {}", status),
        };
        // RFC 6749 section 5.2 error responses are 400 or 401
        let oauth_error = error_response
            .filter(|_| status.is_client_error())
            .map(|response| response.error);
        return Err(AuthError::TokenExchangeFailed {
            registration_id: registration_id.to_string(),
            reason,
            oauth_error,
            source: None,
        });
    }

    let parsed: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
        AuthError::exchange_failed(registration_id, format!("invalid token response: {}", e))
    })?;

    if !parsed.token_type.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::exchange_failed(
            registration_id,
            format!("unsupported token type: {}", parsed.token_type),
        ));
    }

    let scopes = match parsed.scope {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => registration.scopes.clone(),
    };

    let mut access_token = AccessToken::bearer(parsed.access_token).with_scopes(scopes);
    if let Some(expires_in) = parsed.expires_in {
        let expires_in = expires_in.clamp(0, i64::from(i32::MAX));
        access_token = access_token.expires_in(Duration::seconds(expires_in));
    }

    Ok(TokenGrant {
        access_token,
        refresh_token: parsed.refresh_token,
    })
}

/// `client_secret_basic`: credentials are form-urlencoded before base64.
fn basic_credentials(registration: &ClientRegistration) -> Result<HeaderValue, AuthError> {
    let id: String = url::form_urlencoded::byte_serialize(registration.client_id.as_bytes()).collect();
    let secret: String =
        url::form_urlencoded::byte_serialize(registration.client_secret.as_bytes()).collect();
    let credentials = general_purpose::STANDARD.encode(format!("{}:{}", id, secret));

    let mut value = HeaderValue::from_str(&format!("Basic {}", credentials)).map_err(|_| {
        AuthError::InvalidRegistration {
            registration_id: registration.registration_id.clone(),
            reason: "client credentials are not a valid header value".to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}
