//! Public entry point: accepts sign-in requests and runs at most one session.
//!
//! Concurrency contract:
//! - At most one session is active per coordinator. Overlapping requests are
//!   handled by [`OverlapPolicy`]: `RejectNew` (default) fails the newcomer
//!   with `PresentationFailed("already in progress")`; `Supersede` cancels the
//!   active session with `UserCancelled` first.
//! - Every event (presenter reply, exchange result, cancel, timeout) is
//!   applied under one lock, so callbacks arriving from different threads are
//!   serialized and only the first one that settles a session counts.
//! - The active session is cleared before its completion runs, so a
//!   completion may start another sign-in right away.
//! - State changes are published under the same lock, so `state()` always
//!   describes the session `active_session()` reports.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

use super::exchange::TokenExchange;
use super::presenter::{ExternalAuthPresenter, OutcomeSink, PresentationReply, PresenterOutcome};
use super::session::{
    Completion, Delivery, SessionEvent, SessionId, SessionState, SignInResult, SignInSession,
    Step,
};
use crate::config::{CoordinatorSettings, OverlapPolicy, SignInConfiguration};
use crate::error::SignInError;
use crate::util::timeout::spawn_deadline;

/// Process-wide coordinator (lazy; see [`SignInCoordinator::global_or_init`]).
static GLOBAL: OnceLock<SignInCoordinator> = OnceLock::new();

/// Sign in through the process-wide coordinator.
///
/// Resolves with `InvalidConfiguration` if no coordinator was installed.
pub async fn sign_in(configuration: SignInConfiguration) -> SignInResult {
    match SignInCoordinator::global() {
        Some(coordinator) => coordinator.sign_in(configuration).await,
        None => Err(SignInError::InvalidConfiguration(
            "no sign-in coordinator installed".to_string(),
        )),
    }
}

/// Builder for [`SignInCoordinator`].
pub struct CoordinatorBuilder {
    presenter: Arc<dyn ExternalAuthPresenter>,
    exchange: Option<Arc<dyn TokenExchange>>,
    settings: CoordinatorSettings,
}

impl CoordinatorBuilder {
    /// Collaborator for flows that return an authorization code.
    pub fn with_token_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.settings.overlap_policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> SignInCoordinator {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            presenter: self.presenter,
            exchange: self.exchange,
            settings: self.settings,
            active: Mutex::new(None),
            state_tx,
            state_rx,
        });
        SignInCoordinator { inner }
    }
}

/// Accepts sign-in requests and resolves each into a [`TokenSet`](super::TokenSet)
/// or a [`SignInError`], exactly once.
///
/// Cloning yields another handle to the same coordinator.
///
/// # Example
/// ```ignore
/// let (presenter, commands) = ChannelPresenter::new();
/// let coordinator = SignInCoordinator::builder(Arc::new(presenter))
///     .with_token_exchange(Arc::new(HttpTokenExchange::new(TOKEN_URL)))
///     .build();
/// let tokens = coordinator
///     .sign_in(SignInConfiguration::new(CLIENT_ID, REDIRECT_URI))
///     .await?;
/// ```
#[derive(Clone)]
pub struct SignInCoordinator {
    inner: Arc<Inner>,
}

impl SignInCoordinator {
    /// Coordinator with default settings and no token exchange.
    pub fn new(presenter: Arc<dyn ExternalAuthPresenter>) -> Self {
        Self::builder(presenter).build()
    }

    pub fn builder(presenter: Arc<dyn ExternalAuthPresenter>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            presenter,
            exchange: None,
            settings: CoordinatorSettings::default(),
        }
    }

    /// The installed process-wide coordinator, if any.
    pub fn global() -> Option<&'static SignInCoordinator> {
        GLOBAL.get()
    }

    /// Get the process-wide coordinator, creating it with `init` on first use.
    pub fn global_or_init<F>(init: F) -> &'static SignInCoordinator
    where
        F: FnOnce() -> SignInCoordinator,
    {
        GLOBAL.get_or_init(init)
    }

    /// Install this coordinator process-wide. Hands it back if one is already installed.
    pub fn install_global(self) -> Result<(), SignInCoordinator> {
        GLOBAL.set(self)
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.inner.settings
    }

    /// Start a sign-in and report through `completion`.
    ///
    /// `completion` runs exactly once: synchronously for invalid
    /// configurations and rejected overlaps, otherwise when the session
    /// settles. Returns the new session's id when one was started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sign_in_with<F>(
        &self,
        configuration: SignInConfiguration,
        completion: F,
    ) -> Option<SessionId>
    where
        F: FnOnce(SignInResult) + Send + 'static,
    {
        self.inner.start(configuration, Box::new(completion))
    }

    /// Start a sign-in and wait for its outcome.
    ///
    /// Dropping the returned future does not cancel the session; use
    /// [`cancel`](Self::cancel) for that.
    pub async fn sign_in(&self, configuration: SignInConfiguration) -> SignInResult {
        let (tx, rx) = oneshot::channel();
        self.sign_in_with(configuration, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await
            .unwrap_or_else(|_| Err(SignInError::Unknown("sign-in completion dropped".to_string())))
    }

    /// Cancel the active session, if any. Its caller receives `UserCancelled`
    /// immediately and the presenter is asked to dismiss.
    pub fn cancel(&self) -> bool {
        match self.active_session() {
            Some(session_id) => self.cancel_session(session_id),
            None => false,
        }
    }

    /// Cancel `session_id` only if it is still the active session.
    pub fn cancel_session(&self, session_id: SessionId) -> bool {
        self.inner.dispatch(session_id, SessionEvent::Cancel)
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.inner
            .lock_active()
            .as_ref()
            .map(|entry| entry.session.id())
    }

    pub fn is_active(&self) -> bool {
        self.active_session().is_some()
    }

    /// State of the most recent session (`Idle` before the first one).
    pub fn state(&self) -> SessionState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to session state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_rx.clone()
    }
}

impl std::fmt::Debug for SignInCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignInCoordinator")
            .field("settings", &self.inner.settings)
            .field("exchange", &self.inner.exchange.as_ref().map(|_| ".."))
            .field("active_session", &self.active_session())
            .finish()
    }
}

struct ActiveSession {
    session: SignInSession,
    runtime: Handle,
}

struct Inner {
    me: Weak<Inner>,
    presenter: Arc<dyn ExternalAuthPresenter>,
    exchange: Option<Arc<dyn TokenExchange>>,
    settings: CoordinatorSettings,
    active: Mutex<Option<ActiveSession>>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
}

impl Inner {
    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: SessionState) {
        let _ = self.state_tx.send(state);
    }

    fn start(&self, configuration: SignInConfiguration, completion: Completion) -> Option<SessionId> {
        if let Err(err) = configuration.validate() {
            tracing::warn!(error = %err, "rejecting sign-in request");
            completion(Err(err));
            return None;
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("sign-in requested outside a Tokio runtime");
            completion(Err(SignInError::Unknown(
                "sign-in requires a Tokio runtime".to_string(),
            )));
            return None;
        };

        let mut active = self.lock_active();
        let current_id = active.as_ref().map(|entry| entry.session.id());
        if let (Some(current_id), OverlapPolicy::RejectNew) =
            (current_id, self.settings.overlap_policy)
        {
            drop(active);
            tracing::debug!(active_session = %current_id, "sign-in already in progress");
            completion(Err(SignInError::PresentationFailed(
                "already in progress".to_string(),
            )));
            return None;
        }

        let mut session = SignInSession::new(configuration, completion);
        let session_id = session.id();
        let Some(request) = session.begin_presenting() else {
            // Unreachable for a fresh session; the session completes its caller on drop.
            drop(active);
            return None;
        };

        let mut superseded: Option<(SessionId, Option<Delivery>)> = None;
        if let Some(mut previous) = active.take() {
            tracing::debug!(session_id = %previous.session.id(), superseded_by = %session_id, "superseding sign-in session");
            let delivery = previous.session.settle(Err(SignInError::UserCancelled));
            superseded = Some((previous.session.id(), delivery));
        }

        let entry = active.insert(ActiveSession { session, runtime });
        if let Some(timeout) = self.settings.timeout {
            let me = self.me.clone();
            let watchdog = spawn_deadline(&entry.runtime, timeout, move || {
                if let Some(inner) = me.upgrade() {
                    inner.dispatch(session_id, SessionEvent::TimedOut);
                }
            });
            entry.session.track_task(watchdog);
        }
        self.publish(SessionState::Presenting);
        drop(active);
        tracing::debug!(session_id = %session_id, "sign-in session started");

        if let Some((previous_id, delivery)) = superseded {
            self.presenter.dismiss(previous_id);
            if let Some(delivery) = delivery {
                delivery.deliver();
            }
        }

        let sink: Weak<dyn OutcomeSink> = self.me.clone();
        self.presenter
            .present(request, PresentationReply::new(session_id, sink));
        Some(session_id)
    }

    /// Apply `event` to `session_id` if it is still active. Returns whether it had any effect.
    fn dispatch(&self, session_id: SessionId, event: SessionEvent) -> bool {
        let dismiss = event.dismisses_surface();
        let mut active = self.lock_active();
        let Some(entry) = active
            .as_mut()
            .filter(|entry| entry.session.id() == session_id)
        else {
            tracing::debug!(session_id = %session_id, "ignoring event for inactive sign-in session");
            return false;
        };

        let outcome = match entry.session.apply(event) {
            Step::Ignore => return false,
            Step::Exchange(grant) => {
                let Some(exchange) = self.exchange.clone() else {
                    tracing::warn!(session_id = %session_id, "authorization code returned without a token exchange");
                    return self.settle_active(
                        active,
                        Err(SignInError::Unknown(
                            "authorization code returned but no token exchange is configured"
                                .to_string(),
                        )),
                        false,
                    );
                };
                let me = self.me.clone();
                let configuration = entry.session.configuration().clone();
                let task = entry.runtime.spawn(async move {
                    let result = exchange.exchange(&grant, &configuration).await;
                    if let Some(inner) = me.upgrade() {
                        inner.dispatch(session_id, SessionEvent::Exchange(result));
                    }
                });
                entry.session.track_task(task.abort_handle());
                self.publish(SessionState::Exchanging);
                return true;
            }
            Step::Settle(outcome) => outcome,
        };
        self.settle_active(active, outcome, dismiss)
    }

    /// Settle the active session and publish its state under the lock, then
    /// dismiss/deliver outside it.
    fn settle_active(
        &self,
        mut active: MutexGuard<'_, Option<ActiveSession>>,
        outcome: SignInResult,
        dismiss: bool,
    ) -> bool {
        let Some(mut entry) = active.take() else {
            return false;
        };
        let session_id = entry.session.id();
        let delivery = entry.session.settle(outcome);
        let state = entry.session.state();
        self.publish(state);
        drop(active);
        drop(entry);

        if dismiss {
            self.presenter.dismiss(session_id);
        }
        match delivery {
            Some(delivery) => {
                tracing::debug!(session_id = %session_id, state = %state, "delivering sign-in outcome");
                delivery.deliver();
                true
            }
            None => false,
        }
    }
}

impl OutcomeSink for Inner {
    fn presenter_outcome(&self, session_id: SessionId, outcome: PresenterOutcome) -> bool {
        self.dispatch(session_id, SessionEvent::Presenter(outcome))
    }
}
