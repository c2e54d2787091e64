//! Shared constants for Wicket components.

/// Default resend cooldown after a guarded action is dispatched (seconds)
pub const DEFAULT_COOLDOWN_SECS: u32 = 60;

/// Expected answer length for the built-in image captcha
pub const DEFAULT_PROOF_LENGTH: usize = 5;

/// Placeholder the console substitutes for a stored provider secret
pub const SECRET_PLACEHOLDER: &str = "***";

/// Default timeout for provider HTTP calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Challenge expiry when the provider does not send one (5 minutes)
pub const DEFAULT_CHALLENGE_TTL_SECS: i64 = 300;

/// Wire names for challenge kinds as reported by the provider
pub mod challenge_types {
    /// Verification disabled for this deployment
    pub const NONE: &str = "none";

    /// Built-in image captcha
    pub const CAPTCHA: &str = "captcha";

    /// Image captcha as named in provider configuration
    pub const DEFAULT: &str = "Default";

    /// Google reCAPTCHA widget
    pub const RECAPTCHA: &str = "reCAPTCHA";

    /// hCaptcha widget
    pub const HCAPTCHA: &str = "hCaptcha";

    /// Cloudflare Turnstile widget
    pub const TURNSTILE: &str = "Cloudflare Turnstile";

    /// GeeTest widget
    pub const GEETEST: &str = "GeeTest";

    /// Aliyun captcha widget
    pub const ALIYUN: &str = "Aliyun Captcha";
}

/// Provider API paths
pub mod api_paths {
    /// Challenge issuance: get-captcha?owner={owner}
    pub const GET_CAPTCHA: &str = "/api/get-captcha";

    /// Proof verification
    pub const VERIFY_CAPTCHA: &str = "/api/verify-captcha";

    /// Guarded action: send a verification code
    pub const SEND_VERIFICATION_CODE: &str = "/api/send-verification-code";

    /// Provider update (preview mode secret persistence)
    pub const UPDATE_PROVIDER: &str = "/api/update-provider";
}

/// Delivery channels for the send-code guarded action
pub mod channels {
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
}
