//! Gate orchestration.
//!
//! `VerificationGate` owns the state machine together with the provider
//! handle, the pending continuation, and the cooldown timer, and drives one
//! verification cycle end to end. The machine itself stays synchronous; this
//! layer is where the two suspension points live (awaiting the challenge and
//! awaiting the verdict).

mod cooldown;
mod machine;

pub use cooldown::CooldownTimer;
pub use machine::{GateMachine, Step, VerifyCall};

use std::sync::Arc;

use futures::future::BoxFuture;
use rand::Rng;

use wicket_common::constants::SECRET_PLACEHOLDER;
use wicket_common::{
    Challenge, ChallengeKind, CooldownState, GateError, GatePhase, ProofToken, VerifyOutcome,
};

use crate::config::GateConfig;
use crate::provider::{ChallengeProvider, ChallengeRequest};
use crate::widget::{self, ProofRules, WidgetSurface};

/// The guarded action, captured at start time and invoked exactly once on a
/// confirmed success.
pub type Continuation<A> = Box<dyn FnOnce(A) -> BoxFuture<'static, ()> + Send>;

/// Receives the single user-visible notification each failure produces.
pub trait GateNotifier: Send + Sync {
    fn error(&self, error: &GateError);
}

/// Default notifier: structured log only
pub struct LogNotifier;

impl GateNotifier for LogNotifier {
    fn error(&self, error: &GateError) {
        tracing::warn!(error = %error, "verification gate error");
    }
}

struct Pending<A> {
    args: A,
    continuation: Continuation<A>,
}

/// One verification gate guarding one action.
///
/// `A` is the guarded action's argument type, handed back to the
/// continuation on success. Gates are fully independent; create one per
/// visible trigger.
pub struct VerificationGate<A> {
    /// Instance id for log correlation
    id: String,
    machine: GateMachine,
    provider: Arc<dyn ChallengeProvider>,
    cooldown: CooldownTimer,
    request: ChallengeRequest,
    rules: ProofRules,
    cooldown_secs: u32,
    preview: bool,
    configured_secret: Option<String>,
    pending: Option<Pending<A>>,
    notifier: Arc<dyn GateNotifier>,
}

impl<A: Send + 'static> VerificationGate<A> {
    pub fn new(config: &GateConfig, provider: Arc<dyn ChallengeProvider>) -> Self {
        Self::with_notifier(config, provider, Arc::new(LogNotifier))
    }

    pub fn with_notifier(
        config: &GateConfig,
        provider: Arc<dyn ChallengeProvider>,
        notifier: Arc<dyn GateNotifier>,
    ) -> Self {
        Self {
            id: generate_gate_id(),
            machine: GateMachine::new(config.proof_rules(), !config.preview),
            provider,
            cooldown: CooldownTimer::new(),
            request: config.challenge_request(),
            rules: config.proof_rules(),
            cooldown_secs: config.cooldown_secs,
            preview: config.preview,
            configured_secret: config.provider.client_secret.clone(),
            pending: None,
            notifier,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.machine.phase()
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.machine.challenge()
    }

    pub fn cooldown(&self) -> CooldownState {
        self.cooldown.state()
    }

    /// May the trigger fire? False while the resend cooldown runs.
    pub fn is_ready(&self) -> bool {
        self.cooldown.is_ready()
    }

    /// The widget surface for the challenge currently held, if any
    pub fn surface(&self) -> Result<Option<WidgetSurface>, GateError> {
        match self.machine.challenge() {
            Some(challenge) => widget::surface_for(challenge, &self.rules),
            None => Ok(None),
        }
    }

    /// Surface an error to the user through the gate's notifier.
    pub fn notify(&self, error: &GateError) {
        self.notifier.error(error);
    }

    /// Begin a verification cycle for the guarded action.
    ///
    /// No-op (returning the current phase) when a cycle is already running;
    /// an error when the cooldown has not elapsed. On kind `None` the cycle
    /// completes within this call.
    pub async fn start(
        &mut self,
        args: A,
        continuation: Continuation<A>,
    ) -> Result<GatePhase, GateError> {
        if !self.cooldown.is_ready() {
            let error = GateError::Cooldown(self.cooldown.remaining_secs());
            self.notifier.error(&error);
            return Err(error);
        }

        let Some(attempt) = self.machine.start() else {
            return Ok(self.phase());
        };
        self.pending = Some(Pending { args, continuation });

        tracing::debug!(gate = %self.id, attempt = %attempt, "requesting challenge");

        // Preview mode persists an edited secret before the challenge is
        // requested, so the provider issues against the new value
        if self.preview {
            if let Some(secret) = self.configured_secret.clone() {
                if secret != SECRET_PLACEHOLDER {
                    if let Err(error) = self.provider.persist_secret(&secret).await {
                        let step = self.machine.challenge_failed(attempt, error);
                        return self.apply(step).await;
                    }
                }
            }
        }

        let step = match self.provider.request_challenge(&self.request).await {
            Ok(challenge) => self.machine.challenge_ready(attempt, challenge),
            Err(error) => self.machine.challenge_failed(attempt, error),
        };
        self.apply(step).await
    }

    /// Submit the user's proof for the challenge on display.
    pub async fn submit_proof(
        &mut self,
        token: impl Into<ProofToken>,
    ) -> Result<GatePhase, GateError> {
        let call = match self.machine.submit_proof(token.into()) {
            Ok(call) => call,
            Err(error) => {
                self.notifier.error(&error);
                return Err(error);
            }
        };
        self.verify(call).await
    }

    /// Discard the current cycle without invoking the continuation.
    pub fn cancel(&mut self) {
        if self.machine.cancel() {
            self.pending = None;
            tracing::debug!(gate = %self.id, "cycle canceled");
        }
    }

    /// Tear down the gate when its trigger leaves the page.
    pub fn teardown(&mut self) {
        self.cancel();
        self.cooldown.cancel();
    }

    async fn verify(&mut self, call: VerifyCall) -> Result<GatePhase, GateError> {
        tracing::debug!(
            gate = %self.id,
            attempt = %call.attempt,
            token = %call.token.fingerprint(),
            "verifying proof"
        );

        // Verification disabled server-side: there is nothing to ask the
        // provider about
        let result = if call.kind == ChallengeKind::None {
            Ok(VerifyOutcome::passed())
        } else {
            self.provider
                .verify_challenge(call.kind, &call.token, &call.secret)
                .await
        };

        let step = self.machine.verdict(call.attempt, result);
        self.apply(step).await
    }

    async fn apply(&mut self, step: Step) -> Result<GatePhase, GateError> {
        match step {
            Step::Ignored | Step::AwaitProof => Ok(self.phase()),
            Step::Verify(call) => Box::pin(self.verify(call)).await,
            Step::Complete => {
                if let Some(Pending { args, continuation }) = self.pending.take() {
                    // Dispatch, don't await: the success transition never
                    // waits on the guarded action's own completion
                    tokio::spawn(continuation(args));
                }
                self.cooldown.start(self.cooldown_secs);
                self.machine.reset();
                tracing::info!(gate = %self.id, "verification succeeded, action dispatched");
                Ok(GatePhase::Succeeded)
            }
            Step::Rejected(error) => {
                self.notifier.error(&error);
                Err(error)
            }
            Step::Fault(error) => {
                self.notifier.error(&error);
                if !error.needs_cancel() {
                    // Transport failures recover to idle; retry is manual
                    self.machine.cancel();
                    self.pending = None;
                }
                Err(error)
            }
        }
    }
}

fn generate_gate_id() -> String {
    let mut rng = rand::rng();
    format!("gate-{:08x}", rng.random::<u32>())
}
