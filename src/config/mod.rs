//! Per-request sign-in configuration and coordinator settings.
//!
//! Values can be built in code or read from the environment (a `.env` file
//! is honored, as are explicit env files for tests and tooling).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, SignInError};

/// Scopes requested when a configuration leaves `scopes` empty.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

const ENV_CLIENT_ID: &str = "SIGNIN_CLIENT_ID";
const ENV_REDIRECT_URI: &str = "SIGNIN_REDIRECT_URI";
const ENV_SCOPES: &str = "SIGNIN_SCOPES";
const ENV_REQUIRE_ID_TOKEN: &str = "SIGNIN_REQUIRE_ID_TOKEN";
const ENV_LOGIN_HINT: &str = "SIGNIN_LOGIN_HINT";
const ENV_OVERLAP_POLICY: &str = "SIGNIN_OVERLAP_POLICY";
const ENV_TIMEOUT_SECS: &str = "SIGNIN_TIMEOUT_SECS";

/// What the identity provider needs to run one sign-in.
///
/// Supplied fresh on every call; the coordinator never mutates it.
///
/// # Example
/// ```
/// use oidc_signin::config::SignInConfiguration;
///
/// let config = SignInConfiguration::builder()
///     .client_id("1234.apps.example.com")
///     .redirect_uri("com.example.app:/oauth2redirect")
///     .scopes(vec!["openid".to_string(), "email".to_string()])
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct SignInConfiguration {
    /// Provider-issued client identifier. Must be non-empty.
    #[builder(into)]
    pub client_id: String,
    /// Scheme or URI the provider uses to hand control back.
    #[builder(into)]
    pub redirect_uri: String,
    /// Requested scopes, in order. Empty means [`DEFAULT_SCOPES`].
    #[builder(default)]
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Fail the session when the provider returns no ID token.
    #[builder(default)]
    #[serde(default)]
    pub require_id_token: bool,
    /// Account hint forwarded to the consent surface.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
}

impl SignInConfiguration {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: Vec::new(),
            require_id_token: false,
            login_hint: None,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_require_id_token(mut self, required: bool) -> Self {
        self.require_id_token = required;
        self
    }

    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    /// Scopes to request, falling back to [`DEFAULT_SCOPES`].
    pub fn effective_scopes(&self) -> Vec<String> {
        if self.scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            self.scopes.clone()
        }
    }

    /// Check the constraints that must hold before anything is presented.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(SignInError::InvalidConfiguration(
                "client identifier must not be empty".to_string(),
            ));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(SignInError::InvalidConfiguration(
                "redirect target must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from environment variables (`SIGNIN_CLIENT_ID`, `SIGNIN_REDIRECT_URI`, ...).
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(env_lookup)
    }

    /// Load from a dotenv-formatted file without touching the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let vars = read_env_file(path.as_ref())?;
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = lookup(ENV_CLIENT_ID).ok_or_else(|| {
            SignInError::InvalidConfiguration(format!("{ENV_CLIENT_ID} is not set"))
        })?;
        let redirect_uri = lookup(ENV_REDIRECT_URI).ok_or_else(|| {
            SignInError::InvalidConfiguration(format!("{ENV_REDIRECT_URI} is not set"))
        })?;
        let scopes = lookup(ENV_SCOPES)
            .map(|raw| parse_scopes(&raw))
            .unwrap_or_default();
        let require_id_token = match lookup(ENV_REQUIRE_ID_TOKEN) {
            Some(raw) => parse_flag(ENV_REQUIRE_ID_TOKEN, &raw)?,
            None => false,
        };
        let login_hint = lookup(ENV_LOGIN_HINT).filter(|hint| !hint.trim().is_empty());

        let config = Self {
            client_id,
            redirect_uri,
            scopes,
            require_id_token,
            login_hint,
        };
        config.validate()?;
        Ok(config)
    }
}

/// What the coordinator does when `sign_in` arrives while a session is active.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverlapPolicy {
    /// Fail the new request with `PresentationFailed("already in progress")`.
    #[default]
    RejectNew,
    /// Cancel the active session (its caller gets `UserCancelled`) and start the new one.
    Supersede,
}

/// Behavior shared by every session a coordinator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub overlap_policy: OverlapPolicy,
    /// Upper bound on a session's lifetime. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl CoordinatorSettings {
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load from `SIGNIN_OVERLAP_POLICY` and `SIGNIN_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overlap_policy = match lookup(ENV_OVERLAP_POLICY) {
            Some(raw) => raw.trim().parse::<OverlapPolicy>().map_err(|_| {
                SignInError::InvalidConfiguration(format!(
                    "{ENV_OVERLAP_POLICY} must be reject_new or supersede, got {raw:?}"
                ))
            })?,
            None => OverlapPolicy::default(),
        };
        let timeout = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    SignInError::InvalidConfiguration(format!(
                        "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got {raw:?}"
                    ))
                })?;
                // 0 disables the timeout
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };
        Ok(Self {
            overlap_policy,
            timeout,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|err| {
        SignInError::InvalidConfiguration(format!("cannot read {}: {err}", path.display()))
    })?;
    iter.map(|item| {
        item.map_err(|err| {
            SignInError::InvalidConfiguration(format!("cannot parse {}: {err}", path.display()))
        })
    })
    .collect()
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|scope| !scope.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(SignInError::InvalidConfiguration(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}
