#![warn(clippy::all)]
#![warn(clippy::correctness)]
#![warn(clippy::style)]
#![warn(clippy::complexity)]
#![warn(clippy::perf)]
#![warn(clippy::pedantic)]

use ::async_trait::async_trait;
use log::{debug, warn};
use recaptcha::{ErrorCode, ReCaptcha, Response};
use std::error::Error;
use std::fmt;
use std::net::IpAddr;


pub mod config;

/// The one message shown to end users, whatever the reason.
pub const USER_MESSAGE: &str = "Google reCAPTCHA verification failed";
pub const DEFAULT_ACTION: &str = "homepage";
pub const DEFAULT_MIN_SCORE: f64 = 0.5;

/// Which predicate of the acceptance policy a response failed.
#[derive(Debug)]
pub enum PolicyFailure {
    NotSuccessful(Vec<ErrorCode>),
    Hostname { expected: String, actual: String },
    Action { expected: String, actual: String },
    Score { minimum: f64, actual: f64 },
}

impl fmt::Display for PolicyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSuccessful(codes) => write!(f, "provider reported failure: {:?}", codes),
            Self::Hostname { expected, actual } => {
                write!(f, "hostname {} does not match expected {}", actual, expected)
            },
            Self::Action { expected, actual } => {
                write!(f, "action {} does not match expected {}", actual, expected)
            },
            Self::Score { minimum, actual } => {
                write!(f, "score {} is below minimum {}", actual, minimum)
            },
        }
    }
}

/// Why a token was not accepted. `Display` carries the diagnostic detail and
/// belongs in logs; anything shown to the submitting user goes through
/// [`RejectionReason::user_message`] instead.
#[derive(Debug)]
pub enum RejectionReason {
    Transport(String),
    MalformedResponse(String),
    Policy(PolicyFailure),
}

impl RejectionReason {
    /// Identical for every reason so a rejection never tells the client which
    /// predicate it failed.
    pub fn user_message(&self) -> &'static str {
        USER_MESSAGE
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "verification request failed: {}", msg),
            Self::MalformedResponse(msg) => write!(f, "unexpected verification response: {}", msg),
            Self::Policy(failure) => write!(f, "{}", failure),
        }
    }
}

impl Error for RejectionReason {}

impl From<PolicyFailure> for RejectionReason {
    fn from(failure: PolicyFailure) -> Self {
        Self::Policy(failure)
    }
}

impl From<recaptcha::Error> for RejectionReason {
    fn from(err: recaptcha::Error) -> Self {
        match err {
            recaptcha::Error::Transport(err) => Self::Transport(err.to_string()),
            recaptcha::Error::Decode(err) => Self::MalformedResponse(err.to_string()),
        }
    }
}

/// What a provider response must satisfy for the token to be accepted.
pub struct Policy {
    pub action: String,
    pub min_score: f64,
    pub hostname: String,
}

impl Policy {
    pub fn new(action: String, min_score: f64, hostname: String) -> Policy {
        Self { action, min_score, hostname }
    }

    /// Decide whether a parsed provider response satisfies this policy.
    ///
    /// A response claiming success but missing any of the v3 fields is
    /// treated as malformed rather than as a policy failure.
    pub fn evaluate(&self, response: &Response) -> Result<(), RejectionReason> {
        if !response.success {
            return Err(PolicyFailure::NotSuccessful(response.error_codes.clone()).into());
        }

        let hostname = response.hostname.as_deref().ok_or_else(|| {
            RejectionReason::MalformedResponse("hostname missing from successful response".to_string())
        })?;
        let action = response.action.as_deref().ok_or_else(|| {
            RejectionReason::MalformedResponse("action missing from successful response".to_string())
        })?;
        let score = response.score.ok_or_else(|| {
            RejectionReason::MalformedResponse("score missing from successful response".to_string())
        })?;

        if hostname != self.hostname {
            return Err(PolicyFailure::Hostname {
                expected: self.hostname.clone(),
                actual: hostname.to_string(),
            }.into());
        }

        if action != self.action {
            return Err(PolicyFailure::Action {
                expected: self.action.clone(),
                actual: action.to_string(),
            }.into());
        }

        if score < self.min_score {
            return Err(PolicyFailure::Score {
                minimum: self.min_score,
                actual: score,
            }.into());
        }

        Ok(())
    }
}

/// Per-request data the verifier needs from the web layer, passed in
/// explicitly instead of read from any ambient request object.
pub struct RequestContext {
    /// Host name the protected form was served from.
    pub hostname: String,
    /// Peer address of the submitting client, if known.
    pub remote_ip: Option<IpAddr>,
}

#[async_trait]
pub trait Verifier: Send + Sync {
    /// Check a client-supplied token for the request described by `ctx`.
    async fn verify(&self, token: &str, ctx: &RequestContext) -> Result<(), RejectionReason>;
}

#[derive(Debug)]
pub struct ReCaptchaVerifier {
    client: ReCaptcha,
    action: String,
    min_score: f64,
}

impl ReCaptchaVerifier {
    pub fn new(client: ReCaptcha, action: String, min_score: f64) -> ReCaptchaVerifier {
        Self { client, action, min_score }
    }

    fn policy(&self, ctx: &RequestContext) -> Policy {
        Policy {
            action: self.action.clone(),
            min_score: self.min_score,
            hostname: ctx.hostname.clone(),
        }
    }
}

#[async_trait]
impl Verifier for ReCaptchaVerifier {
    async fn verify(&self, token: &str, ctx: &RequestContext) -> Result<(), RejectionReason> {
        let remote_ip = ctx.remote_ip.map(|ip| ip.to_string());
        let response = self.client.verify(token, remote_ip.as_deref()).await?;

        match self.policy(ctx).evaluate(&response) {
            Ok(()) => {
                debug!("token accepted for {} (action {})", ctx.hostname, self.action);
                Ok(())
            },
            Err(reason) => {
                warn!("token rejected for {}: {}", ctx.hostname, reason);
                Err(reason)
            },
        }
    }
}
