//! OAuth2/OIDC sign-in: sessions, consent presenters and token exchange.

pub mod artifact;
pub mod coordinator;
pub mod exchange;
pub mod pkce;
pub mod presenter;
pub mod session;
pub mod token;

pub use artifact::AuthorizationArtifact;
pub use coordinator::{sign_in, CoordinatorBuilder, SignInCoordinator};
pub use exchange::{AuthorizationGrant, ExchangeError, HttpTokenExchange, TokenExchange};
pub use presenter::{
    ChannelPresenter, ExternalAuthPresenter, PresentationReply, PresentationRequest,
    PresenterCommand, PresenterOutcome,
};
pub use session::{SessionId, SessionState, SignInResult};
pub use token::TokenSet;
