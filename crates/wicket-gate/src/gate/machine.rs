//! The verification gate state machine.
//!
//! A plain owned value with synchronous transitions; the async orchestration
//! around it lives in `gate::VerificationGate`. Every provider response is
//! fed back tagged with the attempt id it was issued for, and a mismatched
//! id falls out as `Step::Ignored` with no state change.

use wicket_common::{
    AttemptId, Challenge, ChallengeKind, GateError, GatePhase, ProofToken, VerifyOutcome,
};

use crate::widget::ProofRules;

/// Internal state, holding the data owned in each phase
enum State {
    Idle,
    ChallengeRequested,
    AwaitingProof { challenge: Challenge },
    Verifying { challenge: Challenge, proof: ProofToken },
    Succeeded,
    Failed { error: GateError },
}

/// A verify request the orchestrator should issue against the provider.
///
/// The secret is the handle of the challenge that produced the proof; pairing
/// them here is what keeps stale tokens from ever being submitted.
#[derive(Debug, Clone)]
pub struct VerifyCall {
    pub attempt: AttemptId,
    pub kind: ChallengeKind,
    pub token: ProofToken,
    pub secret: String,
}

/// What a transition asks the orchestrator to do next
#[derive(Debug)]
pub enum Step {
    /// Stale or out-of-order response; nothing changed
    Ignored,
    /// Challenge held; the widget should be rendered
    AwaitProof,
    /// Proof ready; verify it against the provider
    Verify(VerifyCall),
    /// Verification confirmed; dispatch the continuation and start cooldown
    Complete,
    /// Proof refused; the widget stays up for retry
    Rejected(GateError),
    /// Cycle failed; surface the error once
    Fault(GateError),
}

/// The gate state machine.
///
/// One instance per guarded trigger; instances share nothing.
pub struct GateMachine {
    state: State,
    attempt: AttemptId,
    rules: ProofRules,
    /// False in preview mode: a rejection still completes the cycle
    require_server_confirmation: bool,
}

impl GateMachine {
    pub fn new(rules: ProofRules, require_server_confirmation: bool) -> Self {
        Self {
            state: State::Idle,
            attempt: AttemptId::ZERO,
            rules,
            require_server_confirmation,
        }
    }

    pub fn phase(&self) -> GatePhase {
        match &self.state {
            State::Idle => GatePhase::Idle,
            State::ChallengeRequested => GatePhase::ChallengeRequested,
            State::AwaitingProof { .. } => GatePhase::AwaitingProof,
            State::Verifying { .. } => GatePhase::Verifying,
            State::Succeeded => GatePhase::Succeeded,
            State::Failed { .. } => GatePhase::Failed,
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// The challenge currently held, if any
    pub fn challenge(&self) -> Option<&Challenge> {
        match &self.state {
            State::AwaitingProof { challenge } | State::Verifying { challenge, .. } => {
                Some(challenge)
            }
            _ => None,
        }
    }

    /// The error that failed the current cycle, if any
    pub fn last_error(&self) -> Option<&GateError> {
        match &self.state {
            State::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Begin a cycle. Returns the new attempt id, or None when the gate is
    /// not idle (rapid double-clicks fire no duplicate challenge request).
    pub fn start(&mut self) -> Option<AttemptId> {
        if !matches!(self.state, State::Idle) {
            tracing::debug!(phase = ?self.phase(), "start ignored: gate not idle");
            return None;
        }
        self.attempt = self.attempt.next();
        self.state = State::ChallengeRequested;
        Some(self.attempt)
    }

    /// Provider answered the challenge request for `attempt`.
    pub fn challenge_ready(&mut self, attempt: AttemptId, challenge: Challenge) -> Step {
        if attempt != self.attempt || !matches!(self.state, State::ChallengeRequested) {
            tracing::debug!(response = %attempt, current = %self.attempt, "stale challenge discarded");
            return Step::Ignored;
        }

        match challenge.kind {
            ChallengeKind::None => {
                // Verification disabled: skip straight to verifying with an
                // empty proof
                let call = VerifyCall {
                    attempt,
                    kind: ChallengeKind::None,
                    token: ProofToken::empty(),
                    secret: challenge.id.clone(),
                };
                self.state = State::Verifying {
                    challenge,
                    proof: ProofToken::empty(),
                };
                Step::Verify(call)
            }
            _ => {
                self.state = State::AwaitingProof { challenge };
                Step::AwaitProof
            }
        }
    }

    /// The challenge request for `attempt` failed.
    pub fn challenge_failed(&mut self, attempt: AttemptId, error: GateError) -> Step {
        if attempt != self.attempt || !matches!(self.state, State::ChallengeRequested) {
            return Step::Ignored;
        }
        self.state = State::Failed { error: error.clone() };
        Step::Fault(error)
    }

    /// User submitted a proof. Validates client-side first; only a valid
    /// proof in `AwaitingProof` produces a verify call.
    pub fn submit_proof(&mut self, token: ProofToken) -> Result<VerifyCall, GateError> {
        if !matches!(self.state, State::AwaitingProof { .. }) {
            return Err(GateError::OutOfTurn(
                "no challenge awaiting proof".to_string(),
            ));
        }

        self.rules.validate(&token)?;

        let State::AwaitingProof { challenge } = std::mem::replace(&mut self.state, State::Idle)
        else {
            unreachable!("state checked above");
        };

        let call = VerifyCall {
            attempt: self.attempt,
            kind: challenge.kind,
            token: token.clone(),
            secret: challenge.id.clone(),
        };
        self.state = State::Verifying {
            challenge,
            proof: token,
        };
        Ok(call)
    }

    /// Provider verdict (or transport failure) for `attempt`.
    pub fn verdict(&mut self, attempt: AttemptId, result: Result<VerifyOutcome, GateError>) -> Step {
        if attempt != self.attempt || !matches!(self.state, State::Verifying { .. }) {
            tracing::debug!(response = %attempt, current = %self.attempt, "stale verdict discarded");
            return Step::Ignored;
        }

        match result {
            Ok(outcome) if outcome.passed || !self.require_server_confirmation => {
                // Challenge and proof are dropped with the old state
                self.state = State::Succeeded;
                Step::Complete
            }
            Ok(outcome) => {
                let State::Verifying { challenge, .. } =
                    std::mem::replace(&mut self.state, State::Idle)
                else {
                    unreachable!("state checked above");
                };
                // Same challenge stays up for retry; the proof is cleared
                self.state = State::AwaitingProof { challenge };
                Step::Rejected(GateError::Rejected(
                    outcome.message.unwrap_or_else(|| "incorrect answer".to_string()),
                ))
            }
            Err(error) => {
                self.state = State::Failed { error: error.clone() };
                Step::Fault(error)
            }
        }
    }

    /// Discard the current cycle without invoking anything.
    ///
    /// Valid from every non-idle phase; returns false when there was nothing
    /// to cancel. Challenge and proof are dropped; a response still in
    /// flight will no longer match the state it needs and is discarded.
    pub fn cancel(&mut self) -> bool {
        if matches!(self.state, State::Idle) {
            return false;
        }
        self.state = State::Idle;
        true
    }

    /// Acknowledge a completed cycle, returning the gate to idle.
    pub fn reset(&mut self) {
        if matches!(self.state, State::Succeeded) {
            self.state = State::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wicket_common::ExternalWidgetKind;

    fn machine() -> GateMachine {
        GateMachine::new(ProofRules { expected_length: Some(5) }, true)
    }

    fn image_challenge() -> Challenge {
        Challenge {
            kind: ChallengeKind::ImageCaptcha,
            id: "captcha-1".to_string(),
            image_data: Some("aW1n".to_string()),
            site_params: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_start_is_noop_outside_idle() {
        let mut gate = machine();
        let first = gate.start().unwrap();
        assert!(gate.start().is_none());
        assert_eq!(gate.attempt(), first);

        gate.challenge_ready(first, image_challenge());
        assert!(gate.start().is_none());
    }

    #[test]
    fn test_happy_path_image_captcha() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();

        let step = gate.challenge_ready(attempt, image_challenge());
        assert!(matches!(step, Step::AwaitProof));
        assert_eq!(gate.phase(), GatePhase::AwaitingProof);

        let call = gate.submit_proof(ProofToken::new("a1b2c")).unwrap();
        assert_eq!(call.secret, "captcha-1");
        assert_eq!(call.kind, ChallengeKind::ImageCaptcha);
        assert_eq!(gate.phase(), GatePhase::Verifying);

        let step = gate.verdict(call.attempt, Ok(VerifyOutcome::passed()));
        assert!(matches!(step, Step::Complete));
        assert_eq!(gate.phase(), GatePhase::Succeeded);
        assert!(gate.challenge().is_none());

        gate.reset();
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn test_none_kind_skips_to_verifying() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();

        let step = gate.challenge_ready(attempt, Challenge::none());
        let Step::Verify(call) = step else {
            panic!("expected auto-pass verify, got {step:?}");
        };
        assert!(call.token.is_empty());
        assert_eq!(gate.phase(), GatePhase::Verifying);

        let step = gate.verdict(call.attempt, Ok(VerifyOutcome::passed()));
        assert!(matches!(step, Step::Complete));
    }

    #[test]
    fn test_rejection_returns_to_awaiting_proof() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();
        gate.challenge_ready(attempt, image_challenge());

        let call = gate.submit_proof(ProofToken::new("wrong")).unwrap();
        let step = gate.verdict(call.attempt, Ok(VerifyOutcome::rejected("incorrect answer")));
        assert!(matches!(step, Step::Rejected(GateError::Rejected(_))));

        // Same challenge stays up for retry
        assert_eq!(gate.phase(), GatePhase::AwaitingProof);
        assert_eq!(gate.challenge().unwrap().id, "captcha-1");

        let call = gate.submit_proof(ProofToken::new("a1b2c")).unwrap();
        assert!(matches!(
            gate.verdict(call.attempt, Ok(VerifyOutcome::passed())),
            Step::Complete
        ));
    }

    #[test]
    fn test_preview_completes_despite_rejection() {
        let mut gate = GateMachine::new(ProofRules::default(), false);
        let attempt = gate.start().unwrap();
        gate.challenge_ready(attempt, image_challenge());

        let call = gate.submit_proof(ProofToken::new("wrong")).unwrap();
        let step = gate.verdict(call.attempt, Ok(VerifyOutcome::rejected("nope")));
        assert!(matches!(step, Step::Complete));
    }

    #[test]
    fn test_preview_transport_error_still_fails() {
        let mut gate = GateMachine::new(ProofRules::default(), false);
        let attempt = gate.start().unwrap();
        gate.challenge_ready(attempt, image_challenge());

        let call = gate.submit_proof(ProofToken::new("token")).unwrap();
        let step = gate.verdict(
            call.attempt,
            Err(GateError::Transport("connection reset".to_string())),
        );
        assert!(matches!(step, Step::Fault(GateError::Transport(_))));
        assert_eq!(gate.phase(), GatePhase::Failed);
    }

    #[test]
    fn test_validation_blocks_before_any_transition() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();
        gate.challenge_ready(attempt, image_challenge());

        assert!(matches!(
            gate.submit_proof(ProofToken::empty()),
            Err(GateError::Validation(_))
        ));
        assert!(matches!(
            gate.submit_proof(ProofToken::new("toolong")),
            Err(GateError::Validation(_))
        ));
        // Still awaiting proof, no remote call was produced
        assert_eq!(gate.phase(), GatePhase::AwaitingProof);
    }

    #[test]
    fn test_submit_without_challenge_has_no_effect() {
        let mut gate = machine();
        assert!(matches!(
            gate.submit_proof(ProofToken::new("a1b2c")),
            Err(GateError::OutOfTurn(_))
        ));
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn test_cancel_clears_challenge_and_proof() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();
        gate.challenge_ready(attempt, image_challenge());

        assert!(gate.cancel());
        assert_eq!(gate.phase(), GatePhase::Idle);
        assert!(gate.challenge().is_none());

        // submit_proof after cancel, without a new start, has no effect
        assert!(gate.submit_proof(ProofToken::new("a1b2c")).is_err());
    }

    #[test]
    fn test_stale_verdict_after_cancel_and_restart() {
        let mut gate = machine();

        // Attempt #1 reaches verifying, then is canceled
        let first = gate.start().unwrap();
        gate.challenge_ready(first, image_challenge());
        let stale_call = gate.submit_proof(ProofToken::new("a1b2c")).unwrap();
        gate.cancel();

        // Attempt #2 is in flight
        let second = gate.start().unwrap();
        assert_ne!(first, second);

        // Attempt #1's verdict resolves late: discarded, no state change
        let step = gate.verdict(stale_call.attempt, Ok(VerifyOutcome::passed()));
        assert!(matches!(step, Step::Ignored));
        assert_eq!(gate.phase(), GatePhase::ChallengeRequested);

        // And a stale challenge response for #1 is equally ignored
        let step = gate.challenge_ready(first, image_challenge());
        assert!(matches!(step, Step::Ignored));
        assert_eq!(gate.phase(), GatePhase::ChallengeRequested);
    }

    #[test]
    fn test_challenge_failure_faults_the_cycle() {
        let mut gate = machine();
        let attempt = gate.start().unwrap();
        let step = gate.challenge_failed(
            attempt,
            GateError::Transport("connection refused".to_string()),
        );
        assert!(matches!(step, Step::Fault(_)));
        assert_eq!(gate.phase(), GatePhase::Failed);
        assert!(gate.last_error().is_some());

        // Failed is left via cancel
        assert!(gate.cancel());
        assert_eq!(gate.phase(), GatePhase::Idle);
    }

    #[test]
    fn test_external_widget_verify_call_carries_client_secret() {
        let mut gate = GateMachine::new(ProofRules::default(), true);
        let attempt = gate.start().unwrap();
        let challenge = Challenge {
            kind: ChallengeKind::External(ExternalWidgetKind::Recaptcha),
            id: "per-attempt-secret".to_string(),
            image_data: None,
            site_params: None,
            expires_at: None,
        };
        gate.challenge_ready(attempt, challenge);

        let call = gate.submit_proof(ProofToken::new("widget-token")).unwrap();
        assert_eq!(call.secret, "per-attempt-secret");
        assert_eq!(call.kind, ChallengeKind::External(ExternalWidgetKind::Recaptcha));
    }
}
