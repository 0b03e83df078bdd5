#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use oidc_signin::auth::{
    AuthorizationGrant, ExchangeError, ExternalAuthPresenter, PresentationReply,
    PresentationRequest, SessionId, SignInResult, TokenExchange, TokenSet,
};
use oidc_signin::config::SignInConfiguration;
use tokio::sync::Notify;

pub fn config() -> SignInConfiguration {
    SignInConfiguration::new("client-123", "com.example.app:/oauth2redirect")
}

pub fn tokens(id_token: &str) -> TokenSet {
    TokenSet::new(Some(id_token.to_string()), Some("access".to_string())).expect("tokens")
}

/// Completion that records every outcome it receives.
#[derive(Clone, Default)]
pub struct Outcomes {
    inner: Arc<Mutex<Vec<SignInResult>>>,
}

impl Outcomes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completion(&self) -> impl FnOnce(SignInResult) + Send + 'static {
        let inner = self.inner.clone();
        move |outcome| inner.lock().unwrap().push(outcome)
    }

    pub fn all(&self) -> Vec<SignInResult> {
        self.inner.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// The single outcome delivered so far.
    pub fn single(&self) -> SignInResult {
        let all = self.all();
        assert_eq!(all.len(), 1, "expected exactly one outcome, got {all:?}");
        all.into_iter().next().unwrap()
    }
}

/// Presenter that records calls and lets the test reply later.
#[derive(Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<(PresentationRequest, PresentationReply)>>,
    dismissed: Mutex<Vec<SessionId>>,
    on_present: Mutex<Option<Arc<dyn Fn(&PresentationReply) + Send + Sync>>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Presenter that replies synchronously from inside `present`.
    pub fn replying<F>(reply: F) -> Arc<Self>
    where
        F: Fn(&PresentationReply) + Send + Sync + 'static,
    {
        let presenter = Self::default();
        *presenter.on_present.lock().unwrap() = Some(Arc::new(reply));
        Arc::new(presenter)
    }

    pub fn present_count(&self) -> usize {
        self.presented.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> PresentationRequest {
        self.presented.lock().unwrap()[index].0.clone()
    }

    pub fn reply(&self, index: usize) -> PresentationReply {
        self.presented.lock().unwrap()[index].1.clone()
    }

    pub fn last_reply(&self) -> PresentationReply {
        let presented = self.presented.lock().unwrap();
        presented.last().expect("nothing presented").1.clone()
    }

    pub fn dismissed(&self) -> Vec<SessionId> {
        self.dismissed.lock().unwrap().clone()
    }
}

impl ExternalAuthPresenter for RecordingPresenter {
    fn present(&self, request: PresentationRequest, reply: PresentationReply) {
        self.presented
            .lock()
            .unwrap()
            .push((request, reply.clone()));
        let on_present = self.on_present.lock().unwrap().clone();
        if let Some(on_present) = on_present {
            on_present(&reply);
        }
    }

    fn dismiss(&self, session_id: SessionId) {
        self.dismissed.lock().unwrap().push(session_id);
    }
}

/// Token exchange with a canned answer, optionally held until released.
pub struct ScriptedExchange {
    result: Mutex<Option<Result<TokenSet, ExchangeError>>>,
    gate: Option<Arc<Notify>>,
    grants: Mutex<Vec<AuthorizationGrant>>,
}

impl ScriptedExchange {
    pub fn returning(result: Result<TokenSet, ExchangeError>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
            gate: None,
            grants: Mutex::new(Vec::new()),
        })
    }

    /// Exchange that waits for `gate.notify_one()` before answering.
    pub fn gated(result: Result<TokenSet, ExchangeError>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
            gate: Some(gate),
            grants: Mutex::new(Vec::new()),
        })
    }

    pub fn grants(&self) -> Vec<AuthorizationGrant> {
        self.grants.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenExchange for ScriptedExchange {
    async fn exchange(
        &self,
        grant: &AuthorizationGrant,
        _configuration: &SignInConfiguration,
    ) -> Result<TokenSet, ExchangeError> {
        self.grants.lock().unwrap().push(grant.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ExchangeError::InvalidResponse("already used".into())))
    }
}

/// Let spawned tasks run to their next await point.
pub async fn settle_tasks() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
