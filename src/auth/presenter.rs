//! Contract for the component that shows the consent surface.
//!
//! The coordinator never renders anything. It hands a [`PresentationRequest`]
//! and a [`PresentationReply`] to an [`ExternalAuthPresenter`], and the
//! presenter reports back exactly one [`PresenterOutcome`] through the reply,
//! from whatever thread or task it likes.

use std::sync::Weak;

use tokio::sync::mpsc;
use url::Url;

use super::artifact::AuthorizationArtifact;
use super::pkce::CODE_CHALLENGE_METHOD;
use super::session::SessionId;
use crate::config::SignInConfiguration;
use crate::error::SignInError;

/// Everything a presenter needs to open a consent surface for one session.
#[derive(Debug, Clone)]
pub struct PresentationRequest {
    pub session_id: SessionId,
    pub configuration: SignInConfiguration,
    /// Effective scopes (defaults applied).
    pub scopes: Vec<String>,
    /// Anti-forgery value the provider must echo back with a code.
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: &'static str,
}

impl PresentationRequest {
    /// Build a standard OAuth2 authorization-endpoint URL for browser-based surfaces.
    ///
    /// # Example
    /// ```ignore
    /// let url = request.authorize_url("https://accounts.example.com/o/oauth2/v2/auth")?;
    /// open_browser(&url);
    /// ```
    pub fn authorize_url(&self, authorization_endpoint: &str) -> Result<String, SignInError> {
        let scope = self.scopes.join(" ");
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.configuration.client_id.as_str()),
            ("redirect_uri", self.configuration.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", self.state.as_str()),
            ("code_challenge", self.code_challenge.as_str()),
            ("code_challenge_method", self.code_challenge_method),
        ];
        if let Some(hint) = self.configuration.login_hint.as_deref() {
            params.push(("login_hint", hint));
        }
        let url = Url::parse_with_params(authorization_endpoint, &params).map_err(|err| {
            SignInError::InvalidConfiguration(format!(
                "invalid authorization endpoint {authorization_endpoint}: {err}"
            ))
        })?;
        Ok(url.into())
    }
}

/// The single report a presenter makes for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterOutcome {
    /// The surface completed and produced an artifact (which may itself be a denial).
    Authorized(AuthorizationArtifact),
    /// The user dismissed the surface.
    UserCancelled,
    /// The surface could not be opened at all.
    PresentationError(String),
    /// The surface opened but failed on the network.
    TransportError(String),
}

pub(crate) trait OutcomeSink: Send + Sync {
    fn presenter_outcome(&self, session_id: SessionId, outcome: PresenterOutcome) -> bool;
}

/// Return path from a presenter to the session that asked for it.
///
/// Cheap to clone and safe to use from any thread. Only the first outcome
/// that reaches a live session has any effect; later or duplicate calls, and
/// calls after the coordinator is gone, are dropped.
#[derive(Clone)]
pub struct PresentationReply {
    session_id: SessionId,
    sink: Weak<dyn OutcomeSink>,
}

impl PresentationReply {
    pub(crate) fn new(session_id: SessionId, sink: Weak<dyn OutcomeSink>) -> Self {
        Self { session_id, sink }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Report an outcome. Returns `true` if it advanced the session.
    pub fn send(&self, outcome: PresenterOutcome) -> bool {
        match self.sink.upgrade() {
            Some(sink) => sink.presenter_outcome(self.session_id, outcome),
            None => {
                tracing::debug!(session_id = %self.session_id, "presenter reply after coordinator shutdown");
                false
            }
        }
    }

    pub fn authorized(&self, artifact: AuthorizationArtifact) -> bool {
        self.send(PresenterOutcome::Authorized(artifact))
    }

    pub fn cancelled(&self) -> bool {
        self.send(PresenterOutcome::UserCancelled)
    }

    pub fn presentation_error(&self, detail: impl Into<String>) -> bool {
        self.send(PresenterOutcome::PresentationError(detail.into()))
    }

    pub fn transport_error(&self, detail: impl Into<String>) -> bool {
        self.send(PresenterOutcome::TransportError(detail.into()))
    }
}

impl std::fmt::Debug for PresentationReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationReply")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Shows the consent surface (browser tab, webview, native SDK, ...).
///
/// `present` must not block: it starts the surface and returns, reporting
/// later through `reply`. It may also report synchronously before returning.
pub trait ExternalAuthPresenter: Send + Sync {
    fn present(&self, request: PresentationRequest, reply: PresentationReply);

    /// Best-effort request to close the surface for `session_id`, if still open.
    fn dismiss(&self, session_id: SessionId);
}

/// Command forwarded by [`ChannelPresenter`].
#[derive(Debug)]
pub enum PresenterCommand {
    Present {
        request: PresentationRequest,
        reply: PresentationReply,
    },
    Dismiss {
        session_id: SessionId,
    },
}

/// Presenter that forwards requests to async host code over a channel.
///
/// # Example
/// ```ignore
/// let (presenter, mut commands) = ChannelPresenter::new();
/// let coordinator = SignInCoordinator::new(Arc::new(presenter));
/// tokio::spawn(async move {
///     while let Some(command) = commands.recv().await {
///         if let PresenterCommand::Present { request, reply } = command {
///             let redirect = show_browser(&request).await;
///             match AuthorizationArtifact::from_redirect(&redirect) {
///                 Ok(artifact) => reply.authorized(artifact),
///                 Err(err) => reply.presentation_error(err.to_string()),
///             };
///         }
///     }
/// });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    commands: mpsc::UnboundedSender<PresenterCommand>,
}

impl ChannelPresenter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PresenterCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }
}

impl ExternalAuthPresenter for ChannelPresenter {
    fn present(&self, request: PresentationRequest, reply: PresentationReply) {
        let command = PresenterCommand::Present {
            request,
            reply: reply.clone(),
        };
        if self.commands.send(command).is_err() {
            reply.presentation_error("no consent surface is listening");
        }
    }

    fn dismiss(&self, session_id: SessionId) {
        let _ = self.commands.send(PresenterCommand::Dismiss { session_id });
    }
}

pub(crate) fn presentation_request(
    session_id: SessionId,
    configuration: &SignInConfiguration,
    state: &str,
    code_challenge: &str,
) -> PresentationRequest {
    PresentationRequest {
        session_id,
        configuration: configuration.clone(),
        scopes: configuration.effective_scopes(),
        state: state.to_string(),
        code_challenge: code_challenge.to_string(),
        code_challenge_method: CODE_CHALLENGE_METHOD,
    }
}
