//! Configuration for verification gates.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use wicket_common::constants::{
    DEFAULT_COOLDOWN_SECS, DEFAULT_PROOF_LENGTH, DEFAULT_REQUEST_TIMEOUT_SECS,
};

use crate::provider::ChallengeRequest;
use crate::widget::ProofRules;

/// Gate configuration.
///
/// One value per guarded trigger; deployments typically load it once and
/// clone it for every gate on the page.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Challenge provider connection settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Resend cooldown after a successful cycle (seconds)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u32,

    /// Exact answer length for the image captcha; None disables the check
    #[serde(default = "default_proof_length")]
    pub proof_length: Option<usize>,

    /// Preview mode: admin is testing a provider, a rejection still
    /// completes the cycle and the configured secret is persisted first
    #[serde(default)]
    pub preview: bool,

    /// Action name sent with the challenge request (e.g. "signup")
    #[serde(default = "default_action")]
    pub action: String,
}

/// Challenge provider connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the console API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Organization owning the provider, if scoped
    #[serde(default)]
    pub owner: Option<String>,

    /// Provider object name (used by preview-mode persistence)
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Configured client secret; "***" placeholder means "unchanged"
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Provider HTTP timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            owner: None,
            name: default_provider_name(),
            client_secret: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// Default value functions
fn default_cooldown_secs() -> u32 {
    DEFAULT_COOLDOWN_SECS
}
fn default_proof_length() -> Option<usize> {
    Some(DEFAULT_PROOF_LENGTH)
}
fn default_action() -> String {
    "signup".to_string()
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_provider_name() -> String {
    "provider_captcha_default".to_string()
}
fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl GateConfig {
    /// Load configuration from file, with environment overrides (WICKET_*)
    pub fn load(config_path: &str) -> Result<Self> {
        if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .add_source(config::Environment::with_prefix("WICKET").separator("__"))
                .build()
                .context("Failed to load config file")?;

            settings.try_deserialize().context("Failed to parse config")
        } else {
            tracing::warn!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// The challenge request this gate issues on start
    pub fn challenge_request(&self) -> ChallengeRequest {
        ChallengeRequest {
            owner: self.provider.owner.clone(),
            action: self.action.clone(),
            verification_gate: true,
        }
    }

    /// Client-side proof validation rules
    pub fn proof_rules(&self) -> ProofRules {
        ProofRules {
            expected_length: self.proof_length,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            cooldown_secs: default_cooldown_secs(),
            proof_length: default_proof_length(),
            preview: false,
            action: default_action(),
        }
    }
}
