use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SignInError;

/// Credentials obtained by a successful sign-in.
///
/// At least one of the ID token and access token is always present; empty
/// strings count as absent. The coordinator hands the value to the caller and
/// keeps no copy.
///
/// # Example
/// ```
/// use oidc_signin::auth::TokenSet;
///
/// let tokens = TokenSet::new(Some("eyJhbGciOi...".to_string()), None)?;
/// assert!(tokens.id_token().is_some());
/// assert!(TokenSet::new(None, Some(String::new())).is_err());
/// # Ok::<(), oidc_signin::error::SignInError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSet {
    id_token: Option<String>,
    access_token: Option<String>,
    obtained_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn new(
        id_token: Option<String>,
        access_token: Option<String>,
    ) -> Result<Self, SignInError> {
        Self::with_obtained_at(id_token, access_token, Utc::now())
    }

    pub fn with_obtained_at(
        id_token: Option<String>,
        access_token: Option<String>,
        obtained_at: DateTime<Utc>,
    ) -> Result<Self, SignInError> {
        let id_token = id_token.filter(|t| !t.trim().is_empty());
        let access_token = access_token.filter(|t| !t.trim().is_empty());
        if id_token.is_none() && access_token.is_none() {
            return Err(SignInError::Unknown(
                "token bundle contains neither an ID token nor an access token".to_string(),
            ));
        }
        Ok(Self {
            id_token,
            access_token,
            obtained_at,
        })
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    /// Split into `(id_token, access_token, obtained_at)`.
    pub fn into_parts(self) -> (Option<String>, Option<String>, DateTime<Utc>) {
        (self.id_token, self.access_token, self.obtained_at)
    }
}
