use std::collections::HashMap;

use url::Url;

use crate::error::SignInError;

/// What the consent surface yields before final tokens are known.
///
/// Depending on the provider's flow this is an authorization code to be
/// exchanged, an already-issued token bundle, or an explicit refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationArtifact {
    /// Authorization code (code flow). `state` is whatever came back with it.
    Code { code: String, state: Option<String> },
    /// Tokens issued directly by the surface (native SDKs, implicit/hybrid flows).
    Tokens {
        id_token: Option<String>,
        access_token: Option<String>,
    },
    /// The provider or the user refused consent.
    Denied {
        error: String,
        description: Option<String>,
    },
}

impl AuthorizationArtifact {
    pub fn code(code: impl Into<String>, state: Option<String>) -> Self {
        Self::Code {
            code: code.into(),
            state,
        }
    }

    pub fn tokens(id_token: Option<String>, access_token: Option<String>) -> Self {
        Self::Tokens {
            id_token,
            access_token,
        }
    }

    pub fn denied(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Denied {
            error: error.into(),
            description,
        }
    }

    /// Parse the redirect URL the provider sent back to `redirect_uri`.
    ///
    /// Parameters are read from the query and the fragment. An `error`
    /// parameter wins over everything else, then `code`, then
    /// `id_token`/`access_token`.
    ///
    /// # Example
    /// ```
    /// use oidc_signin::auth::AuthorizationArtifact;
    ///
    /// let artifact = AuthorizationArtifact::from_redirect(
    ///     "com.example.app:/oauth2redirect?code=4%2F0Ab&state=xyz",
    /// )?;
    /// assert_eq!(
    ///     artifact,
    ///     AuthorizationArtifact::code("4/0Ab", Some("xyz".to_string()))
    /// );
    /// # Ok::<(), oidc_signin::error::SignInError>(())
    /// ```
    pub fn from_redirect(redirect: &str) -> Result<Self, SignInError> {
        let url = Url::parse(redirect)
            .map_err(|err| SignInError::Unknown(format!("malformed redirect URL: {err}")))?;

        let mut params: HashMap<String, String> = HashMap::new();
        for (key, value) in url.query_pairs() {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        if let Some(fragment) = url.fragment() {
            for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
                params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
            }
        }

        if let Some(error) = params.remove("error") {
            return Ok(Self::Denied {
                error,
                description: params.remove("error_description"),
            });
        }
        if let Some(code) = params.remove("code") {
            return Ok(Self::Code {
                code,
                state: params.remove("state"),
            });
        }
        let id_token = params.remove("id_token");
        let access_token = params.remove("access_token");
        if id_token.is_some() || access_token.is_some() {
            return Ok(Self::Tokens {
                id_token,
                access_token,
            });
        }
        Err(SignInError::Unknown(
            "redirect carries no authorization response".to_string(),
        ))
    }
}
