//! Challenge provider abstraction.
//!
//! The provider is the remote service that issues challenges and validates
//! submitted proofs. Gates talk to it through the `ChallengeProvider` trait
//! so tests can substitute in-memory implementations; production uses
//! `HttpChallengeProvider`.

mod http;

pub use http::HttpChallengeProvider;

use async_trait::async_trait;

use wicket_common::{Challenge, ChallengeKind, GateError, ProofToken, VerifyOutcome};

/// Parameters sent with a challenge request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeRequest {
    /// Organization scope, if any
    pub owner: Option<String>,

    /// The action being guarded (e.g. "signup", "forget")
    pub action: String,

    /// True when issued by a verification gate (vs a plain login form)
    pub verification_gate: bool,
}

/// Remote service capable of issuing a challenge and validating a proof.
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    /// Ask the provider for a challenge for this deployment.
    ///
    /// A deployment with verification disabled answers with kind
    /// `None`; an unrecognized kind surfaces as a configuration error.
    async fn request_challenge(&self, request: &ChallengeRequest) -> Result<Challenge, GateError>;

    /// Submit a proof with the secret of the challenge that produced it.
    ///
    /// Ok(rejected) means the provider looked at the proof and refused it;
    /// transport failures are errors.
    async fn verify_challenge(
        &self,
        kind: ChallengeKind,
        token: &ProofToken,
        secret: &str,
    ) -> Result<VerifyOutcome, GateError>;

    /// Persist a configured secret ahead of a preview-mode cycle.
    ///
    /// Providers without admin access keep the default no-op.
    async fn persist_secret(&self, secret: &str) -> Result<(), GateError> {
        let _ = secret;
        Ok(())
    }
}
