//! # Wicket Gate
//!
//! The human-verification gate of the admin console. Guards a sensitive
//! remote action (sending a verification code, confirming an identity-proof
//! step) behind an optional challenge, enforces a client-side resend
//! cooldown, and only invokes the guarded action after the provider confirms
//! the challenge was passed.
//!
//! ## Flow
//! ```text
//! ActionTrigger → VerificationGate.start()
//!                      ↓
//!             ChallengeProvider.request_challenge
//!                      ↓
//!             ChallengeWidget renders → user submits proof
//!                      ↓
//!             ChallengeProvider.verify_challenge
//!                      ↓
//!      success: continuation dispatched, CooldownTimer starts
//! ```
//!
//! Each gate instance is independent; several may coexist on one page with
//! no shared mutable state.

pub mod config;
pub mod gate;
pub mod provider;
pub mod trigger;
pub mod widget;

pub use config::{GateConfig, ProviderConfig};
pub use gate::{Continuation, CooldownTimer, GateNotifier, LogNotifier, VerificationGate};
pub use provider::{ChallengeProvider, ChallengeRequest, HttpChallengeProvider};
pub use trigger::{ActionTrigger, CodeSender, SendCodeRequest, TriggerLabel};
pub use widget::{ProofInput, ProofRules, WidgetSurface};
