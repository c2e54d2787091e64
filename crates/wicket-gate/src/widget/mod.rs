//! Challenge widget dispatch.
//!
//! Pure selection and validation: given a challenge, pick the input surface
//! the host UI should mount and enforce the client-side proof rules before
//! anything is sent to the provider. No rendering happens here; the host UI
//! owns pixels, the gate owns the token contract.

use base64::{Engine, engine::general_purpose::STANDARD};

use wicket_common::{Challenge, ChallengeKind, ExternalWidgetKind, GateError, ProofToken, SiteParams};

/// Client-side proof validation rules.
///
/// Non-empty is always required; the exact expected length is deployment
/// configuration, never hardcoded in the machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProofRules {
    /// Exact answer length, when the platform enforces one
    pub expected_length: Option<usize>,
}

impl ProofRules {
    pub fn validate(&self, token: &ProofToken) -> Result<(), GateError> {
        if token.is_empty() {
            return Err(GateError::Validation("proof must not be empty".to_string()));
        }
        if let Some(expected) = self.expected_length {
            if token.len() != expected {
                return Err(GateError::Validation(format!(
                    "proof must be exactly {expected} characters"
                )));
            }
        }
        Ok(())
    }
}

/// Image captcha surface: decoded PNG plus a single-line text input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSurface {
    /// Decoded captcha image bytes
    pub png: Vec<u8>,

    /// Length hint for the input field
    pub expected_length: Option<usize>,
}

/// Third-party widget surface; parameters are opaque to the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSurface {
    pub kind: ExternalWidgetKind,
    pub params: SiteParams,
}

/// The input surface selected for a challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetSurface {
    Image(ImageSurface),
    External(ExternalSurface),
}

/// Select the surface for a challenge.
///
/// Kind `None` needs no surface (the gate auto-advances). A challenge whose
/// payload cannot back its declared kind is a configuration error rather
/// than a broken render.
pub fn surface_for(
    challenge: &Challenge,
    rules: &ProofRules,
) -> Result<Option<WidgetSurface>, GateError> {
    match challenge.kind {
        ChallengeKind::None => Ok(None),
        ChallengeKind::ImageCaptcha => {
            let encoded = challenge.image_data.as_deref().ok_or_else(|| {
                GateError::Configuration("image captcha without image data".to_string())
            })?;
            let png = STANDARD
                .decode(encoded)
                .map_err(|e| GateError::Configuration(format!("captcha image: {e}")))?;
            Ok(Some(WidgetSurface::Image(ImageSurface {
                png,
                expected_length: rules.expected_length,
            })))
        }
        ChallengeKind::External(kind) => Ok(Some(WidgetSurface::External(ExternalSurface {
            kind,
            params: challenge.site_params.clone().unwrap_or_default(),
        }))),
    }
}

/// Proof collection buffer shared by both surfaces.
///
/// Image captcha: the host UI feeds keystrokes via `set` and confirms on OK
/// or Enter. External widgets: their token callback lands in `on_change`,
/// which is the whole contract the gate relies on.
#[derive(Debug, Clone, Default)]
pub struct ProofInput {
    buffer: String,
    rules: ProofRules,
}

impl ProofInput {
    pub fn new(rules: ProofRules) -> Self {
        Self {
            buffer: String::new(),
            rules,
        }
    }

    /// Replace the buffered text (text input edits)
    pub fn set(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    /// Token callback contract for external widgets
    pub fn on_change(&mut self, token: &str) {
        self.buffer = token.to_string();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// May the confirm button be enabled?
    pub fn confirm_ready(&self) -> bool {
        self.rules.validate(&ProofToken::new(self.buffer.clone())).is_ok()
    }

    /// Enter pressed: yields the proof only for non-empty input
    pub fn on_enter(&mut self) -> Option<ProofToken> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.take())
    }

    /// Take the buffered proof, clearing the buffer
    pub fn take(&mut self) -> ProofToken {
        ProofToken::new(std::mem::take(&mut self.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_challenge(data: &str) -> Challenge {
        Challenge {
            kind: ChallengeKind::ImageCaptcha,
            id: "captcha-1".to_string(),
            image_data: Some(data.to_string()),
            site_params: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_rules_reject_empty_and_wrong_length() {
        let rules = ProofRules {
            expected_length: Some(5),
        };
        assert!(rules.validate(&ProofToken::empty()).is_err());
        assert!(rules.validate(&ProofToken::new("abcd")).is_err());
        assert!(rules.validate(&ProofToken::new("abcde")).is_ok());

        let lax = ProofRules::default();
        assert!(lax.validate(&ProofToken::new("x")).is_ok());
        assert!(lax.validate(&ProofToken::empty()).is_err());
    }

    #[test]
    fn test_surface_none_kind_has_no_widget() {
        let surface = surface_for(&Challenge::none(), &ProofRules::default()).unwrap();
        assert!(surface.is_none());
    }

    #[test]
    fn test_surface_decodes_image() {
        let encoded = STANDARD.encode(b"png-bytes");
        let surface = surface_for(&image_challenge(&encoded), &ProofRules::default())
            .unwrap()
            .unwrap();
        match surface {
            WidgetSurface::Image(image) => assert_eq!(image.png, b"png-bytes"),
            other => panic!("expected image surface, got {other:?}"),
        }
    }

    #[test]
    fn test_surface_rejects_missing_or_bad_image() {
        let mut challenge = image_challenge("not base64!!");
        assert!(surface_for(&challenge, &ProofRules::default()).is_err());

        challenge.image_data = None;
        assert!(surface_for(&challenge, &ProofRules::default()).is_err());
    }

    #[test]
    fn test_surface_external_passes_params_through() {
        let challenge = Challenge {
            kind: ChallengeKind::External(ExternalWidgetKind::Turnstile),
            id: "secret-1".to_string(),
            image_data: None,
            site_params: Some(SiteParams {
                site_key: Some("site-key".to_string()),
                client_secret: Some("secret-1".to_string()),
                client_secret2: None,
                sub_type: None,
            }),
            expires_at: None,
        };
        let surface = surface_for(&challenge, &ProofRules::default()).unwrap().unwrap();
        match surface {
            WidgetSurface::External(external) => {
                assert_eq!(external.kind, ExternalWidgetKind::Turnstile);
                assert_eq!(external.params.site_key.as_deref(), Some("site-key"));
            }
            other => panic!("expected external surface, got {other:?}"),
        }
    }

    #[test]
    fn test_proof_input_enter_and_confirm() {
        let mut input = ProofInput::new(ProofRules {
            expected_length: Some(5),
        });

        assert!(input.on_enter().is_none());
        assert!(!input.confirm_ready());

        input.set("ab3");
        assert!(!input.confirm_ready());

        input.set("ab3de");
        assert!(input.confirm_ready());
        assert_eq!(input.on_enter().unwrap().as_str(), "ab3de");

        // Buffer is consumed on take
        assert!(input.on_enter().is_none());
    }

    #[test]
    fn test_external_token_callback() {
        let mut input = ProofInput::new(ProofRules::default());
        input.on_change("widget-token");
        assert!(input.confirm_ready());
        assert_eq!(input.take().as_str(), "widget-token");
    }
}
