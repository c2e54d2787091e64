//! Core types shared across Wicket components.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::challenge_types;

/// Third-party captcha widget families the console can embed.
///
/// The gate treats these as opaque beyond the token callback contract; the
/// variant only selects which widget the host UI mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalWidgetKind {
    Recaptcha,
    Hcaptcha,
    Turnstile,
    Geetest,
    Aliyun,
}

impl ExternalWidgetKind {
    /// Provider type string as configured in the console
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Recaptcha => challenge_types::RECAPTCHA,
            Self::Hcaptcha => challenge_types::HCAPTCHA,
            Self::Turnstile => challenge_types::TURNSTILE,
            Self::Geetest => challenge_types::GEETEST,
            Self::Aliyun => challenge_types::ALIYUN,
        }
    }

    /// Parse a provider type string, returning None for unknown widgets
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            challenge_types::RECAPTCHA => Some(Self::Recaptcha),
            challenge_types::HCAPTCHA => Some(Self::Hcaptcha),
            challenge_types::TURNSTILE => Some(Self::Turnstile),
            challenge_types::GEETEST => Some(Self::Geetest),
            challenge_types::ALIYUN => Some(Self::Aliyun),
            _ => None,
        }
    }
}

impl fmt::Display for ExternalWidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// The kind of challenge a deployment requires before a guarded action.
///
/// Determines which input surface is rendered and which verification payload
/// shape is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChallengeKind {
    /// Verification disabled; the gate auto-passes
    None,
    /// Built-in image captcha with a text answer
    ImageCaptcha,
    /// Embedded third-party widget
    External(ExternalWidgetKind),
}

impl ChallengeKind {
    /// Wire name as reported by the provider
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::None => challenge_types::NONE,
            Self::ImageCaptcha => challenge_types::CAPTCHA,
            Self::External(kind) => kind.wire_name(),
        }
    }

    /// Parse a provider type string.
    ///
    /// Both the runtime name (`"captcha"`) and the configured provider name
    /// (`"Default"`) map to the image captcha. Unknown strings return None so
    /// the gate can fail the cycle with a configuration error instead of
    /// rendering a surface it does not understand.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            challenge_types::NONE => Some(Self::None),
            challenge_types::CAPTCHA | challenge_types::DEFAULT => Some(Self::ImageCaptcha),
            other => ExternalWidgetKind::parse(other).map(Self::External),
        }
    }

    /// Does this kind require a rendered widget?
    pub fn needs_widget(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl From<ChallengeKind> for String {
    fn from(kind: ChallengeKind) -> Self {
        kind.wire_name().to_string()
    }
}

impl TryFrom<String> for ChallengeKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown challenge kind: {value}"))
    }
}

/// Opaque configuration for an embedded third-party widget.
///
/// Passed through to the widget untouched; the gate never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteParams {
    /// Public site key the widget mounts with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_key: Option<String>,

    /// Server-issued client secret for this attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Secondary secret (widgets with a two-key scheme)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret2: Option<String>,

    /// Widget sub-type selector (e.g. invisible vs checkbox)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
}

/// A server-issued challenge, owned by the gate for one verification attempt.
///
/// Discarded on success and on cancel; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Which surface/payload shape this challenge uses
    pub kind: ChallengeKind,

    /// Opaque secret/session handle pairing proofs to this challenge
    pub id: String,

    /// Base64-encoded PNG (image captcha only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,

    /// Opaque external-widget configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_params: Option<SiteParams>,

    /// Challenge expiry timestamp (Unix epoch seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Challenge {
    /// A challenge for deployments with verification disabled
    pub fn none() -> Self {
        Self {
            kind: ChallengeKind::None,
            id: String::new(),
            image_data: None,
            site_params: None,
            expires_at: None,
        }
    }

    /// Has this challenge passed its expiry timestamp?
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires) => chrono::Utc::now().timestamp() > expires,
            None => false,
        }
    }
}

/// The user's proof: captcha text or a third-party widget token.
///
/// Ephemeral, held only in gate state. The Debug representation is a digest
/// so tokens never reach logs verbatim.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofToken(String);

impl ProofToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The empty proof used on the auto-pass path
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short digest for log correlation
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofToken({})", self.fingerprint())
    }
}

impl From<&str> for ProofToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for ProofToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Monotonic counter distinguishing verification cycles.
///
/// Every provider response is tagged with the attempt that issued it;
/// responses whose id no longer matches are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(u64);

impl AttemptId {
    pub const ZERO: AttemptId = AttemptId(0);

    /// The next attempt in the cycle
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observable phase of a verification gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    /// No challenge held; the trigger may start a cycle
    Idle,
    /// Awaiting the provider's challenge response
    ChallengeRequested,
    /// Widget rendered, waiting for the user's proof
    AwaitingProof,
    /// Awaiting the provider's verdict
    Verifying,
    /// Verification confirmed; continuation dispatched
    Succeeded,
    /// Cycle failed; cancel or re-trigger to retry
    Failed,
}

impl GatePhase {
    /// Is a provider call outstanding in this phase?
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::ChallengeRequested | Self::Verifying)
    }
}

/// Client-side cooldown snapshot.
///
/// Purely time-driven; resets to not-running on reload. The authoritative
/// rate limit, if any, lives server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownState {
    /// Seconds until the trigger re-enables
    pub remaining_secs: u32,

    /// Is the countdown ticking?
    pub running: bool,
}

impl CooldownState {
    pub fn ready(&self) -> bool {
        !self.running
    }
}

/// Provider verdict on a submitted proof.
///
/// A rejection (passed = false) is distinct from transport failure, which is
/// reported as an error instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyOutcome {
    pub fn passed() -> Self {
        Self { passed: true, message: None }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { passed: false, message: Some(message.into()) }
    }
}
