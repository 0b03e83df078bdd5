//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthorizationArtifact, ChannelPresenter, ExternalAuthPresenter, HttpTokenExchange,
    PresentationReply, PresentationRequest, PresenterCommand, PresenterOutcome, SessionId,
    SessionState, SignInCoordinator, SignInResult, TokenExchange, TokenSet,
};
pub use crate::config::{CoordinatorSettings, OverlapPolicy, SignInConfiguration};
pub use crate::error::{Result, SignInError};
