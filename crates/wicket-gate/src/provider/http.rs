//! HTTP challenge provider.
//!
//! Talks to the console API over JSON with a session-cookie-authenticated
//! client. Responses arrive in the console envelope
//! `{status: "ok"|"error", msg, data, data2}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use wicket_common::constants::{DEFAULT_CHALLENGE_TTL_SECS, api_paths};
use wicket_common::{
    Challenge, ChallengeKind, GateError, ProofToken, SiteParams, VerifyOutcome,
};

use super::{ChallengeProvider, ChallengeRequest};
use crate::config::ProviderConfig;

/// Console response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Challenge issuance payload
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptchaPayload {
    #[serde(rename = "type")]
    kind: String,
    captcha_id: Option<String>,
    captcha_image: Option<String>,
    client_secret: Option<String>,
    client_secret2: Option<String>,
    sub_type: Option<String>,
}

impl CaptchaPayload {
    /// Map the wire payload into an owned Challenge.
    ///
    /// The secret handle is the captcha id for the image captcha and the
    /// per-attempt client secret for external widgets; a payload missing its
    /// handle cannot pair proofs and is a configuration error.
    fn into_challenge(self) -> Result<Challenge, GateError> {
        let kind = ChallengeKind::parse(&self.kind)
            .ok_or_else(|| GateError::Configuration(format!("unknown challenge kind: {}", self.kind)))?;

        match kind {
            ChallengeKind::None => Ok(Challenge::none()),
            ChallengeKind::ImageCaptcha => {
                let id = self.captcha_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    GateError::Configuration("image captcha without a captcha id".to_string())
                })?;
                Ok(Challenge {
                    kind,
                    id,
                    image_data: self.captcha_image,
                    site_params: None,
                    expires_at: Some(chrono::Utc::now().timestamp() + DEFAULT_CHALLENGE_TTL_SECS),
                })
            }
            ChallengeKind::External(_) => {
                let secret = self.client_secret.filter(|s| !s.is_empty()).ok_or_else(|| {
                    GateError::Configuration("external widget without a client secret".to_string())
                })?;
                Ok(Challenge {
                    kind,
                    id: secret.clone(),
                    image_data: None,
                    site_params: Some(SiteParams {
                        site_key: None,
                        client_secret: Some(secret),
                        client_secret2: self.client_secret2,
                        sub_type: self.sub_type,
                    }),
                    expires_at: Some(chrono::Utc::now().timestamp() + DEFAULT_CHALLENGE_TTL_SECS),
                })
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody<'a> {
    captcha_type: &'a str,
    captcha_token: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProviderBody<'a> {
    owner: &'a str,
    name: &'a str,
    client_secret: &'a str,
}

/// Production challenge provider over the console HTTP API.
pub struct HttpChallengeProvider {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    provider_name: String,
}

impl HttpChallengeProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, GateError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GateError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            owner: config.owner.clone().unwrap_or_else(|| "admin".to_string()),
            provider_name: config.name.clone(),
        })
    }

    /// Session-sharing client handle, for guarded-action senders
    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChallengeProvider for HttpChallengeProvider {
    async fn request_challenge(&self, request: &ChallengeRequest) -> Result<Challenge, GateError> {
        let mut query: Vec<(&str, String)> = vec![
            ("action", request.action.clone()),
            ("isVerificationGate", request.verification_gate.to_string()),
        ];
        if let Some(owner) = &request.owner {
            query.push(("owner", owner.clone()));
        }

        let response = self
            .client
            .get(self.url(api_paths::GET_CAPTCHA))
            .query(&query)
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("get-captcha: {e}")))?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "get-captcha: HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<CaptchaPayload> = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("get-captcha body: {e}")))?;

        if !envelope.is_ok() {
            return Err(GateError::Transport(format!("get-captcha: {}", envelope.msg)));
        }

        let payload = envelope
            .data
            .ok_or_else(|| GateError::Transport("get-captcha: empty payload".to_string()))?;

        let challenge = payload.into_challenge()?;
        tracing::debug!(kind = %challenge.kind, "challenge issued");

        Ok(challenge)
    }

    async fn verify_challenge(
        &self,
        kind: ChallengeKind,
        token: &ProofToken,
        secret: &str,
    ) -> Result<VerifyOutcome, GateError> {
        let body = VerifyBody {
            captcha_type: kind.wire_name(),
            captcha_token: token.as_str(),
            client_secret: secret,
        };

        let response = self
            .client
            .post(self.url(api_paths::VERIFY_CAPTCHA))
            .json(&body)
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("verify-captcha: {e}")))?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "verify-captcha: HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<bool> = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("verify-captcha body: {e}")))?;

        tracing::debug!(
            kind = %kind,
            token = %token.fingerprint(),
            status = %envelope.status,
            "proof verified"
        );

        if envelope.is_ok() {
            match envelope.data {
                Some(true) => Ok(VerifyOutcome::passed()),
                _ => Ok(VerifyOutcome::rejected("incorrect answer")),
            }
        } else {
            // The provider looked at the proof and refused it
            Ok(VerifyOutcome::rejected(envelope.msg))
        }
    }

    async fn persist_secret(&self, secret: &str) -> Result<(), GateError> {
        let body = UpdateProviderBody {
            owner: &self.owner,
            name: &self.provider_name,
            client_secret: secret,
        };

        let response = self
            .client
            .post(self.url(api_paths::UPDATE_PROVIDER))
            .json(&body)
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("update-provider: {e}")))?;

        if !response.status().is_success() {
            return Err(GateError::Transport(format!(
                "update-provider: HTTP {}",
                response.status()
            )));
        }

        let envelope: Envelope<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| GateError::Transport(format!("update-provider body: {e}")))?;

        if !envelope.is_ok() {
            return Err(GateError::Configuration(format!(
                "update-provider: {}",
                envelope.msg
            )));
        }

        tracing::debug!(provider = %self.provider_name, "provider secret persisted");
        Ok(())
    }
}
