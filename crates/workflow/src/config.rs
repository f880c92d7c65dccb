//! Event-processing settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// A configuration value that could not be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The variable is set but does not parse as the expected type.
    #[error("{name}: cannot parse {value:?}")]
    Unparseable { name: &'static str, value: String },

    /// The variable parsed but lies outside its allowed range.
    #[error("{name}: {reason}")]
    OutOfRange { name: &'static str, reason: String },
}

/// Reads `name` through `lookup`, falling back to `default` when unset.
///
/// A set but unparseable value is an error rather than a silent default.
pub fn parse_var<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Unparseable {
            name,
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Tuning for the payment simulation, notifiers and expiry sweep.
///
/// Reads from environment variables:
/// - `PAYMENT_PROCESSING_DELAY_SECONDS` (default: `5`)
/// - `ORDER_COMPLETION_SUCCESS_RATE` (default: `0.8`, within `[0, 1]`)
/// - `ORDER_EXPIRY_THRESHOLD_MINUTES` (default: `30`)
/// - `EXPIRY_CHECK_INTERVAL_SECONDS` (default: `60`, must be positive)
/// - `EMAIL_DELAY_MILLIS` (default: `500`)
/// - `PAYMENT_RNG_SEED` (optional)
#[derive(Debug, Clone, PartialEq)]
pub struct EventProcessingSettings {
    pub payment_processing_delay: Duration,
    pub completion_success_rate: f64,
    pub expiry_threshold_minutes: u32,
    pub expiry_check_interval: Duration,
    pub email_delay: Duration,
    pub payment_rng_seed: Option<u64>,
}

impl EventProcessingSettings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let seed = match lookup("PAYMENT_RNG_SEED") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| ConfigError::Unparseable {
                name: "PAYMENT_RNG_SEED",
                value: raw,
            })?),
            None => None,
        };

        let settings = Self {
            payment_processing_delay: Duration::from_secs(parse_var(
                &lookup,
                "PAYMENT_PROCESSING_DELAY_SECONDS",
                defaults.payment_processing_delay.as_secs(),
            )?),
            completion_success_rate: parse_var(
                &lookup,
                "ORDER_COMPLETION_SUCCESS_RATE",
                defaults.completion_success_rate,
            )?,
            expiry_threshold_minutes: parse_var(
                &lookup,
                "ORDER_EXPIRY_THRESHOLD_MINUTES",
                defaults.expiry_threshold_minutes,
            )?,
            expiry_check_interval: Duration::from_secs(parse_var(
                &lookup,
                "EXPIRY_CHECK_INTERVAL_SECONDS",
                defaults.expiry_check_interval.as_secs(),
            )?),
            email_delay: Duration::from_millis(parse_var(
                &lookup,
                "EMAIL_DELAY_MILLIS",
                defaults.email_delay.as_millis() as u64,
            )?),
            payment_rng_seed: seed,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Checks the invariants the workers rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.completion_success_rate) {
            return Err(ConfigError::OutOfRange {
                name: "ORDER_COMPLETION_SUCCESS_RATE",
                reason: format!(
                    "{} is not a probability in [0, 1]",
                    self.completion_success_rate
                ),
            });
        }

        if self.expiry_check_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                name: "EXPIRY_CHECK_INTERVAL_SECONDS",
                reason: "interval must be positive".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for EventProcessingSettings {
    fn default() -> Self {
        Self {
            payment_processing_delay: Duration::from_secs(5),
            completion_success_rate: 0.8,
            expiry_threshold_minutes: 30,
            expiry_check_interval: Duration::from_secs(60),
            email_delay: Duration::from_millis(500),
            payment_rng_seed: None,
        }
    }
}
