//! Action trigger integration.
//!
//! The trigger is the "send code" button: it owns one gate + cooldown pair,
//! validates the destination before the gate ever starts, and exposes the
//! enabled/label state the host UI renders. The bundled guarded action sends
//! a verification code over the channel inferred from the destination.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use wicket_common::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, api_paths, channels};
use wicket_common::{GateError, GatePhase};

use crate::config::GateConfig;
use crate::gate::VerificationGate;
use crate::provider::{ChallengeProvider, HttpChallengeProvider};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern")
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9]{6,16}$").expect("phone pattern")
});

/// Infer the delivery channel for a destination.
///
/// An email address selects the email channel, a phone number the phone
/// channel; anything else is a validation error surfaced before any remote
/// call.
pub fn classify_destination(dest: &str) -> Result<&'static str, GateError> {
    if EMAIL_RE.is_match(dest) {
        Ok(channels::EMAIL)
    } else if PHONE_RE.is_match(dest) {
        Ok(channels::PHONE)
    } else {
        Err(GateError::Validation(
            "destination is neither an email address nor a phone number".to_string(),
        ))
    }
}

/// Arguments of the bundled guarded action
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    /// Where the code goes
    pub dest: String,

    /// "email" or "phone"
    pub channel: String,

    /// The action the code belongs to (e.g. "signup")
    pub method: String,
}

/// Guarded-action client: asks the console to send a verification code.
///
/// Opaque to the gate beyond success/failure; runs only after the gate
/// confirmed the challenge.
pub struct CodeSender {
    client: reqwest::Client,
    base_url: String,
}

impl CodeSender {
    pub fn new(endpoint: &str) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GateError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Share the provider's session so the code request carries the same
    /// cookies the verification did
    pub fn from_provider(provider: &HttpChallengeProvider) -> Self {
        Self {
            client: provider.http_client(),
            base_url: provider.base_url().to_string(),
        }
    }

    pub async fn send_code(&self, request: &SendCodeRequest) -> Result<bool, GateError> {
        let url = format!("{}{}", self.base_url, api_paths::SEND_VERIFICATION_CODE);

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("send-code: {e}")))?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "send-code: HTTP {}",
                response.status()
            )));
        }

        #[derive(serde::Deserialize)]
        struct Envelope {
            status: String,
            #[serde(default)]
            msg: String,
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("send-code body: {e}")))?;

        if envelope.status == "ok" {
            tracing::info!(channel = %request.channel, "verification code dispatched");
            Ok(true)
        } else {
            tracing::warn!(msg = %envelope.msg, "verification code refused");
            Ok(false)
        }
    }
}

/// What the trigger button should display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerLabel {
    /// Ready to fire
    SendCode,
    /// A cycle is running
    Sending,
    /// Cooldown: seconds until re-enable
    Wait(u32),
}

/// One "send code" trigger bound to one gate.
pub struct ActionTrigger {
    gate: VerificationGate<SendCodeRequest>,
    sender: Arc<CodeSender>,
    method: String,
}

impl ActionTrigger {
    pub fn new(
        config: &GateConfig,
        provider: Arc<dyn ChallengeProvider>,
        sender: Arc<CodeSender>,
    ) -> Self {
        Self {
            gate: VerificationGate::new(config, provider),
            sender,
            method: config.action.clone(),
        }
    }

    /// May the button be pressed?
    pub fn is_enabled(&self) -> bool {
        self.gate.is_ready() && self.gate.phase() == GatePhase::Idle
    }

    pub fn label(&self) -> TriggerLabel {
        if !self.gate.is_ready() {
            TriggerLabel::Wait(self.gate.cooldown().remaining_secs)
        } else if self.gate.phase().in_flight() {
            TriggerLabel::Sending
        } else {
            TriggerLabel::SendCode
        }
    }

    /// Press the button: validate the destination, then run the gate; the
    /// code is sent only after a confirmed verification.
    pub async fn press(&mut self, dest: &str) -> Result<GatePhase, GateError> {
        let channel = match classify_destination(dest) {
            Ok(channel) => channel,
            Err(error) => {
                self.gate.notify(&error);
                return Err(error);
            }
        };

        let request = SendCodeRequest {
            dest: dest.to_string(),
            channel: channel.to_string(),
            method: self.method.clone(),
        };
        let sender = self.sender.clone();

        self.gate
            .start(
                request,
                Box::new(move |request| {
                    Box::pin(async move {
                        if let Err(error) = sender.send_code(&request).await {
                            tracing::error!(error = %error, "guarded action failed");
                        }
                    })
                }),
            )
            .await
    }

    /// Forward the user's proof to the gate
    pub async fn submit_proof(&mut self, token: &str) -> Result<GatePhase, GateError> {
        self.gate.submit_proof(token).await
    }

    /// Close the challenge modal without sending anything
    pub fn cancel(&mut self) {
        self.gate.cancel();
    }

    pub fn gate(&self) -> &VerificationGate<SendCodeRequest> {
        &self.gate
    }

    /// Tear down when the trigger leaves the page
    pub fn teardown(&mut self) {
        self.gate.teardown();
    }
}
