//! Code-for-token exchange collaborator.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::token::TokenSet;
use crate::config::SignInConfiguration;
use crate::error::SignInError;

/// Authorization code plus the PKCE verifier that proves this client asked for it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: String,
}

impl std::fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("code", &"..")
            .field("code_verifier", &"..")
            .finish()
    }
}

/// Failure reported by a [`TokenExchange`].
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The request never got a usable answer (connect, TLS, 5xx, ...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// The provider refused the grant.
    #[error("Grant rejected: {0}")]
    Rejected(String),
    /// The provider answered with something that is not a token bundle.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<ExchangeError> for SignInError {
    fn from(error: ExchangeError) -> Self {
        match error {
            ExchangeError::Transport(detail) => SignInError::NetworkFailure(detail),
            ExchangeError::Rejected(detail) => SignInError::ProviderDenied(detail),
            ExchangeError::InvalidResponse(detail) => SignInError::Unknown(detail),
        }
    }
}

/// Turns an authorization code into tokens, usually over the network.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(
        &self,
        grant: &AuthorizationGrant,
        configuration: &SignInConfiguration,
    ) -> Result<TokenSet, ExchangeError>;
}

/// RFC 6749 authorization-code exchange against a token endpoint.
///
/// # Example
/// ```no_run
/// use oidc_signin::auth::HttpTokenExchange;
///
/// let exchange = HttpTokenExchange::new("https://oauth2.example.com/token");
/// ```
pub struct HttpTokenExchange {
    client: reqwest::Client,
    token_url: String,
    client_secret: Option<String>,
}

impl HttpTokenExchange {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: token_url.into(),
            client_secret: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Confidential clients only; installed apps should rely on PKCE alone.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl std::fmt::Debug for HttpTokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenExchange")
            .field("token_url", &self.token_url)
            .field("client_secret", &self.client_secret.as_ref().map(|_| ".."))
            .finish()
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(
        &self,
        grant: &AuthorizationGrant,
        configuration: &SignInConfiguration,
    ) -> Result<TokenSet, ExchangeError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", configuration.client_id.as_str()),
            ("code", grant.code.as_str()),
            ("redirect_uri", configuration.redirect_uri.as_str()),
            ("code_verifier", grant.code_verifier.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let resp = self
            .client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let payload: TokenResponse = resp.json().await.map_err(|err| {
                ExchangeError::InvalidResponse(format!("token response is not valid JSON: {err}"))
            })?;
            return TokenSet::new(payload.id_token, payload.access_token).map_err(|err| {
                ExchangeError::InvalidResponse(err.detail().unwrap_or_default().to_string())
            });
        }
        if status.is_server_error() {
            return Err(ExchangeError::Transport(format!(
                "token endpoint returned status {status}"
            )));
        }

        let body = resp.text().await?;
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(payload) if status.is_client_error() => {
                tracing::debug!(status = %status, error = %payload.error, "token exchange rejected");
                Err(ExchangeError::Rejected(match payload.error_description {
                    Some(description) => format!("{}: {description}", payload.error),
                    None => payload.error,
                }))
            }
            _ => Err(ExchangeError::InvalidResponse(format!(
                "token endpoint returned status {status}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}
