use std::net::IpAddr;

use log::debug;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Google's reCAPTCHA verification endpoint.
pub const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Minimum reCAPTCHA v3 score for a request to count as human.
pub const SCORE_THRESHOLD: f64 = 0.7;

#[cfg(test)]
pub const TEST_CAPTCHA_RESPONSE: &str = "this response will succeed in test mode";

#[cfg(test)]
pub const TEST_CAPTCHA_UNAVAILABLE: &str = "this response cannot be checked in test mode";

/// Decides whether a request was made by a human, before anything is
/// written on its behalf.
#[rocket::async_trait]
pub trait VerificationGate: Send + Sync {
    /// Returns `Ok(false)` if the token was checked and rejected, and an
    /// error if it could not be checked at all.
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<bool>;
}

/// Body of a reCAPTCHA verification response.
#[derive(Debug, Clone, Deserialize)]
pub struct RecaptchaResponse {
    #[serde(default)]
    pub success: bool,
    pub challenge_ts: Option<String>,
    pub hostname: Option<String>,
    pub score: Option<f64>,
    pub action: Option<String>,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

impl RecaptchaResponse {
    pub fn is_human(&self) -> bool {
        self.success && self.score.unwrap_or(0.0) >= SCORE_THRESHOLD
    }
}

/// Checks tokens against the reCAPTCHA v3 API.
pub struct Recaptcha {
    client: reqwest::Client,
    secret: String,
    url: String,
}

impl Recaptcha {
    pub fn new(secret: String) -> Self {
        Self::with_url(secret, RECAPTCHA_VERIFY_URL.to_string())
    }

    pub fn with_url(secret: String, url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret,
            url,
        }
    }
}

fn unavailable(err: reqwest::Error) -> Error {
    Error::VerificationFailed(format!("reCAPTCHA unavailable: {err}"))
}

#[rocket::async_trait]
impl VerificationGate for Recaptcha {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<bool> {
        let remote_ip = remote_ip.map(|ip| ip.to_string());
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip.as_deref() {
            form.push(("remoteip", ip));
        }

        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(unavailable)?
            .json::<RecaptchaResponse>()
            .await
            .map_err(unavailable)?;

        if !response.error_codes.is_empty() {
            debug!("reCAPTCHA reported {:?}", response.error_codes);
        }
        debug!(
            "reCAPTCHA success={} score={:?} action={:?}",
            response.success, response.score, response.action
        );
        Ok(response.is_human())
    }
}

/// Accepts exactly [`TEST_CAPTCHA_RESPONSE`], fails to check
/// [`TEST_CAPTCHA_UNAVAILABLE`], and rejects everything else.
#[cfg(test)]
pub struct TestGate;

#[cfg(test)]
#[rocket::async_trait]
impl VerificationGate for TestGate {
    async fn verify(&self, token: &str, _remote_ip: Option<IpAddr>) -> Result<bool> {
        if token == TEST_CAPTCHA_UNAVAILABLE {
            return Err(Error::VerificationFailed(
                "reCAPTCHA unavailable in test mode".to_string(),
            ));
        }
        Ok(token == TEST_CAPTCHA_RESPONSE)
    }
}
