use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Deserialize};


pub const FIELD_RESPONSE: &str = "response";
pub const FIELD_SECRET: &str = "secret";
pub const FIELD_REMOTE_IP: &str = "remoteip";
pub const TEST_SITE_KEY: &str = "6LeIxAcTAAAAAJcZVRqyHh71UMIEGNQ_MXjiZKhI";
pub const TEST_SECRET_KEY: &str = "6LeIxAcTAAAAAGG-vFI1TnRWxMZNFuojJ4WifJWe";
pub const VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "missing-input-secret")]
    MissingSecret,
    #[serde(rename = "invalid-input-secret")]
    InvalidSecret,
    #[serde(rename = "missing-input-response")]
    MissingResponse,
    #[serde(rename = "invalid-input-response")]
    InvalidResponse,
    #[serde(rename = "bad-request")]
    BadRequest,
    #[serde(rename = "timeout-or-duplicate")]
    TimeoutOrDuplicate,
}

#[derive(Debug)]
pub enum Error {
    /// The request never produced a usable HTTP response: connection failure,
    /// timeout, or a non-2xx status.
    Transport(reqwest::Error),
    /// The body could not be decoded as a verification response.
    Decode(reqwest::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err)
        } else {
            Self::Transport(err)
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "verification request failed: {}", err),
            Self::Decode(err) => write!(f, "verification response could not be decoded: {}", err),
        }
    }
}

impl std::error::Error for Error {}

/// A parsed `siteverify` response. The v3 fields are only present when the
/// provider reports `success`, so they are optional here; interpreting them
/// is left to the caller.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Response {
    pub success: bool,
    pub score: Option<f64>,
    pub action: Option<String>,
    pub challenge_ts: Option<DateTime<FixedOffset>>,
    pub hostname: Option<String>,
    #[serde(default, rename = "error-codes")]
    pub error_codes: Vec<ErrorCode>,
}

#[derive(Debug)]
pub struct ReCaptcha {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl ReCaptcha {
    pub fn new(secret: String) -> Result<ReCaptcha, Error> {
        Self::with_timeout(secret, DEFAULT_TIMEOUT)
    }

    /// The timeout bounds the whole exchange; a provider that does not answer
    /// in time surfaces as `Error::Transport`.
    pub fn with_timeout(secret: String, timeout: Duration) -> Result<ReCaptcha, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            secret,
            verify_url: VERIFY_URL.to_string(),
        })
    }

    /// Replace the endpoint the token is posted to.
    pub fn verify_url(mut self, url: String) -> Self {
        self.verify_url = url;
        self
    }

    pub async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<Response, Error> {
        let mut params = vec![(FIELD_SECRET, self.secret.as_str()), (FIELD_RESPONSE, token)];
        if let Some(ip) = remote_ip {
            params.push((FIELD_REMOTE_IP, ip));
        }

        let response = self.client.post(self.verify_url.as_str())
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json::<Response>()
            .await?;

        Ok(response)
    }
}

pub async fn verify(secret: &str, token: &str, remote_ip: Option<&str>) -> Result<Response, Error> {
    let captcha = ReCaptcha::new(secret.to_string())?;
    captcha.verify(token, remote_ip).await
}
