//! One in-flight sign-in attempt and its state machine.
//!
//! ```text
//! Idle ──present──▶ Presenting ──code──▶ Exchanging ──tokens──▶ Completed
//!                       │                    │
//!                       ├──tokens────────────┘ (normalized in place)
//!                       └──error / cancel / timeout ──▶ Failed | Cancelled
//! ```
//!
//! A session does no I/O. The coordinator feeds it [`SessionEvent`]s and acts
//! on the returned [`Step`]. Once a terminal state is reached every further
//! event is ignored and the completion has been handed out exactly once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::artifact::AuthorizationArtifact;
use super::exchange::{AuthorizationGrant, ExchangeError};
use super::pkce::AuthorizationSecrets;
use super::presenter::{presentation_request, PresentationRequest, PresenterOutcome};
use super::token::TokenSet;
use crate::config::SignInConfiguration;
use crate::error::SignInError;

/// Unique sign-in attempt identifier.
pub type SessionId = Uuid;

/// Outcome delivered to the caller.
pub type SignInResult = Result<TokenSet, SignInError>;

/// One-shot completion callback owned by a session.
pub type Completion = Box<dyn FnOnce(SignInResult) + Send + 'static>;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Idle,
    Presenting,
    Exchanging,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn settled_by(outcome: &SignInResult) -> Self {
        match outcome {
            Ok(_) => Self::Completed,
            Err(SignInError::UserCancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

/// Input fed to a session by the coordinator.
#[derive(Debug)]
pub enum SessionEvent {
    Presenter(PresenterOutcome),
    Exchange(Result<TokenSet, ExchangeError>),
    Cancel,
    TimedOut,
}

impl SessionEvent {
    /// Whether settling on this event should ask the presenter to close its surface.
    pub fn dismisses_surface(&self) -> bool {
        matches!(self, Self::Cancel | Self::TimedOut)
    }
}

/// What the coordinator must do after feeding an event.
#[derive(Debug)]
pub enum Step {
    /// The event did not apply to the current state.
    Ignore,
    /// Run the code-for-token exchange; the session is now `Exchanging`.
    Exchange(AuthorizationGrant),
    /// Deliver this outcome and discard the session.
    Settle(SignInResult),
}

/// Completion paired with the outcome it must receive.
pub struct Delivery {
    completion: Completion,
    outcome: SignInResult,
}

impl Delivery {
    pub fn outcome(&self) -> &SignInResult {
        &self.outcome
    }

    pub fn deliver(self) {
        (self.completion)(self.outcome);
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of one sign-in attempt.
pub struct SignInSession {
    id: SessionId,
    state: SessionState,
    configuration: SignInConfiguration,
    secrets: AuthorizationSecrets,
    completion: Option<Completion>,
    tasks: Vec<AbortHandle>,
    started_at: DateTime<Utc>,
}

impl SignInSession {
    pub fn new(configuration: SignInConfiguration, completion: Completion) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            configuration,
            secrets: AuthorizationSecrets::generate(),
            completion: Some(completion),
            tasks: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn configuration(&self) -> &SignInConfiguration {
        &self.configuration
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `Idle → Presenting`. Returns the request to hand to the presenter.
    pub fn begin_presenting(&mut self) -> Option<PresentationRequest> {
        if self.state != SessionState::Idle {
            return None;
        }
        self.state = SessionState::Presenting;
        tracing::debug!(session_id = %self.id, "sign-in session presenting");
        Some(presentation_request(
            self.id,
            &self.configuration,
            &self.secrets.state,
            &self.secrets.code_challenge,
        ))
    }

    /// Attach a background task (exchange, watchdog) that dies with the session.
    pub fn track_task(&mut self, handle: AbortHandle) {
        if self.state.is_terminal() {
            handle.abort();
        } else {
            self.tasks.push(handle);
        }
    }

    /// Feed one event and get the next action.
    pub fn apply(&mut self, event: SessionEvent) -> Step {
        if self.state.is_terminal() {
            tracing::debug!(session_id = %self.id, state = %self.state, "ignoring event for settled session");
            return Step::Ignore;
        }
        match event {
            SessionEvent::Cancel => Step::Settle(Err(SignInError::UserCancelled)),
            SessionEvent::TimedOut => {
                tracing::warn!(session_id = %self.id, state = %self.state, "sign-in session timed out");
                Step::Settle(Err(SignInError::NetworkFailure("timeout".to_string())))
            }
            SessionEvent::Presenter(outcome) => self.on_presenter_outcome(outcome),
            SessionEvent::Exchange(result) => self.on_exchange_result(result),
        }
    }

    fn on_presenter_outcome(&mut self, outcome: PresenterOutcome) -> Step {
        if self.state != SessionState::Presenting {
            tracing::debug!(session_id = %self.id, state = %self.state, "ignoring duplicate presenter callback");
            return Step::Ignore;
        }
        match outcome {
            PresenterOutcome::UserCancelled => Step::Settle(Err(SignInError::UserCancelled)),
            PresenterOutcome::PresentationError(detail) => {
                Step::Settle(Err(SignInError::PresentationFailed(detail)))
            }
            PresenterOutcome::TransportError(detail) => {
                Step::Settle(Err(SignInError::NetworkFailure(detail)))
            }
            PresenterOutcome::Authorized(artifact) => {
                self.state = SessionState::Exchanging;
                tracing::debug!(session_id = %self.id, "sign-in session exchanging");
                self.normalize_artifact(artifact)
            }
        }
    }

    fn normalize_artifact(&self, artifact: AuthorizationArtifact) -> Step {
        match artifact {
            AuthorizationArtifact::Denied { error, description } => {
                let detail = match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                };
                Step::Settle(Err(SignInError::ProviderDenied(detail)))
            }
            AuthorizationArtifact::Tokens {
                id_token,
                access_token,
            } => Step::Settle(
                TokenSet::new(id_token, access_token).and_then(|tokens| self.check_tokens(tokens)),
            ),
            AuthorizationArtifact::Code { code, state } => {
                if code.trim().is_empty() {
                    return Step::Settle(Err(SignInError::Unknown(
                        "authorization code is empty".to_string(),
                    )));
                }
                if let Some(returned) = state {
                    if returned != self.secrets.state {
                        tracing::warn!(session_id = %self.id, "authorization response state mismatch");
                        return Step::Settle(Err(SignInError::Unknown(
                            "state mismatch".to_string(),
                        )));
                    }
                }
                Step::Exchange(AuthorizationGrant {
                    code,
                    code_verifier: self.secrets.code_verifier.clone(),
                })
            }
        }
    }

    fn on_exchange_result(&mut self, result: Result<TokenSet, ExchangeError>) -> Step {
        if self.state != SessionState::Exchanging {
            tracing::debug!(session_id = %self.id, state = %self.state, "ignoring unexpected exchange result");
            return Step::Ignore;
        }
        let outcome = result
            .map_err(SignInError::from)
            .and_then(|tokens| self.check_tokens(tokens));
        Step::Settle(outcome)
    }

    fn check_tokens(&self, tokens: TokenSet) -> SignInResult {
        if self.configuration.require_id_token && tokens.id_token().is_none() {
            return Err(SignInError::Unknown("no ID token received".to_string()));
        }
        Ok(tokens)
    }

    /// Enter the terminal state matching `outcome` and release the completion.
    ///
    /// Returns `None` if the session had already settled.
    pub fn settle(&mut self, outcome: SignInResult) -> Option<Delivery> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = SessionState::settled_by(&outcome);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::debug!(session_id = %self.id, state = %self.state, "sign-in session settled");
        self.completion
            .take()
            .map(|completion| Delivery { completion, outcome })
    }
}

impl Drop for SignInSession {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(completion) = self.completion.take() {
            tracing::warn!(session_id = %self.id, "sign-in session discarded before completion");
            completion(Err(SignInError::Unknown(
                "sign-in session discarded".to_string(),
            )));
        }
    }
}

impl std::fmt::Debug for SignInSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("configuration", &self.configuration)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
