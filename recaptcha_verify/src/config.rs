use crate::{ReCaptchaVerifier, DEFAULT_ACTION, DEFAULT_MIN_SCORE};
use recaptcha::ReCaptcha;
use serde::Deserialize;
use std::convert::TryFrom;
use std::error::Error;
use std::fmt;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::TryInto;

    const CONFIG_BARE_TOML: &str = r#"
secret_key = "6LeIxAcTAAAAAGG-vFI1TnRWxMZNFuojJ4WifJWe"
"#;

    #[test]
    fn bare_config_uses_defaults() {
        let conf: Config = toml::from_str(CONFIG_BARE_TOML).unwrap();
        assert_eq!(conf.secret_key, recaptcha::TEST_SECRET_KEY);
        assert_eq!(conf.action, DEFAULT_ACTION);
        assert_eq!(conf.score, DEFAULT_MIN_SCORE);
        assert_eq!(conf.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    const CONFIG_FULL_TOML: &str = r#"
secret_key = "6LeIxAcTAAAAAGG-vFI1TnRWxMZNFuojJ4WifJWe"
action = "login"
score = 0.7
timeout_secs = 10
"#;

    #[test]
    fn full_config_overrides_defaults() {
        let conf: Config = toml::from_str(CONFIG_FULL_TOML).unwrap();
        assert_eq!(conf.action, "login");
        assert_eq!(conf.score, 0.7);
        assert_eq!(conf.timeout_secs, 10);
    }

    #[test]
    fn config_without_secret_key_does_not_parse() {
        toml::from_str::<Config>("action = \"login\"\n")
            .expect_err("config without a secret key should not parse");
    }

    #[test]
    fn empty_secret_key_does_not_build_a_verifier() {
        let conf = Config {
            secret_key: String::new(),
            action: DEFAULT_ACTION.to_string(),
            score: DEFAULT_MIN_SCORE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        let err = ReCaptchaVerifier::try_from(conf)
            .expect_err("empty secret key should not build a verifier");
        match err {
            ConfigError::MissingSecretKey => {},
            err => panic!("invalid error, expected MissingSecretKey: {}", err),
        }
    }

    #[test]
    fn out_of_range_score_does_not_build_a_verifier() {
        let conf = Config {
            secret_key: recaptcha::TEST_SECRET_KEY.to_string(),
            action: DEFAULT_ACTION.to_string(),
            score: 1.5,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        };
        let err = ReCaptchaVerifier::try_from(conf)
            .expect_err("score outside [0, 1] should not build a verifier");
        match err {
            ConfigError::ScoreOutOfRange(score) => assert_eq!(score, 1.5),
            err => panic!("invalid error, expected ScoreOutOfRange: {}", err),
        }
    }

    #[test]
    fn valid_config_builds_a_verifier() {
        let conf: Config = toml::from_str(CONFIG_FULL_TOML).unwrap();
        let _verifier: ReCaptchaVerifier = conf.try_into()
            .expect("valid config should build a verifier");
    }
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

fn default_score() -> f64 {
    DEFAULT_MIN_SCORE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Verifier settings as they appear in a configuration file. Everything but
/// the secret key is optional.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub secret_key: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default = "default_score")]
    pub score: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Configuration problems abort construction; they are never reported as a
/// failed verification.
#[derive(Debug)]
pub enum ConfigError {
    MissingSecretKey,
    ScoreOutOfRange(f64),
    Client(recaptcha::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSecretKey => write!(f, "Google reCAPTCHA secret key must be specified!"),
            Self::ScoreOutOfRange(score) => {
                write!(f, "minimum score {} is outside the range 0.0..=1.0", score)
            },
            Self::Client(err) => write!(f, "building the verification client failed: {}", err),
        }
    }
}

impl Error for ConfigError {}

impl TryFrom<Config> for ReCaptchaVerifier {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, ConfigError> {
        if config.secret_key.is_empty() {
            return Err(ConfigError::MissingSecretKey);
        }

        if !(0.0..=1.0).contains(&config.score) {
            return Err(ConfigError::ScoreOutOfRange(config.score));
        }

        let client = ReCaptcha::with_timeout(
            config.secret_key,
            Duration::from_secs(config.timeout_secs),
        ).map_err(ConfigError::Client)?;

        Ok(ReCaptchaVerifier::new(client, config.action, config.score))
    }
}
