//! Error types for sign-in sessions.

use thiserror::Error;

/// Normalized sign-in failure delivered to the caller's completion.
///
/// This is a closed set: collaborator-specific errors are folded into one of
/// these tags, keeping only their message as the `detail` payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignInError {
    #[error("Sign-in cancelled by user")]
    UserCancelled,

    #[error("Presentation failed: {0}")]
    PresentationFailed(String),

    #[error("Network failure: {0}")]
    NetworkFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Provider denied sign-in: {0}")]
    ProviderDenied(String),

    #[error("Sign-in failed: {0}")]
    Unknown(String),
}

/// Suggested follow-up for the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Offer the user another sign-in attempt.
    RetrySignIn,
    /// Check network connectivity, then retry.
    CheckConnectivity,
    /// Fix the client registration or configuration values.
    CheckConfiguration,
    /// Nothing to do; the user chose to stop.
    None,
}

impl SignInError {
    /// Opaque detail attached to the tag, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::UserCancelled => None,
            Self::PresentationFailed(detail)
            | Self::NetworkFailure(detail)
            | Self::InvalidConfiguration(detail)
            | Self::ProviderDenied(detail)
            | Self::Unknown(detail) => Some(detail),
        }
    }

    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Whether trying again without changes could plausibly succeed.
    ///
    /// The coordinator never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkFailure(_))
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            Self::UserCancelled => RecoverySuggestion::None,
            Self::NetworkFailure(_) => RecoverySuggestion::CheckConnectivity,
            Self::InvalidConfiguration(_) => RecoverySuggestion::CheckConfiguration,
            Self::PresentationFailed(_) | Self::ProviderDenied(_) | Self::Unknown(_) => {
                RecoverySuggestion::RetrySignIn
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SignInError>;
