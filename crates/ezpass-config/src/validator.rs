//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{Config, ReconnectPolicyKind};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Bounded reconnect delays below this are flagged.
const MIN_SENSIBLE_DELAY_MS: u64 = 100;

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_sync(config, &mut result);
        Self::validate_reconnect(config, &mut result);
        Self::validate_logging(config, &mut result);

        result
    }

    /// Validate, turning errors into [`ConfigError::Invalid`]. Warnings are
    /// handed back for the caller to report.
    pub fn ensure_valid(config: &Config) -> Result<Vec<ValidationWarning>, ConfigError> {
        let result = Self::validate(config);
        if result.is_valid() {
            return Ok(result.warnings);
        }
        Err(ConfigError::Invalid(
            result
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.path, e.message))
                .collect(),
        ))
    }

    fn validate_sync(config: &Config, result: &mut ValidationResult) {
        match url::Url::parse(&config.sync.endpoint) {
            Ok(endpoint) => {
                if endpoint.scheme() != "ws" && endpoint.scheme() != "wss" {
                    result.add_error(ValidationError::new(
                        "sync.endpoint",
                        "endpoint must start with ws:// or wss://",
                    ));
                }

                let loopback = matches!(
                    endpoint.host_str(),
                    Some("127.0.0.1") | Some("localhost") | Some("[::1]")
                );
                if !loopback {
                    result.add_warning(ValidationWarning::new(
                        "sync.endpoint",
                        "endpoint is not a loopback address; credentials will leave this machine",
                    ));
                }
            }
            Err(e) => {
                result.add_error(ValidationError::new(
                    "sync.endpoint",
                    format!("endpoint is not a valid URL: {}", e),
                ));
            }
        }

        if config.sync.connect_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "sync.connect_timeout_ms",
                "connect_timeout_ms must be greater than 0",
            ));
        }

        if config.sync.response_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "sync.response_timeout_ms",
                "response_timeout_ms must be greater than 0",
            ));
        }
    }

    fn validate_reconnect(config: &Config, result: &mut ValidationResult) {
        let reconnect = &config.sync.reconnect;
        if reconnect.policy != ReconnectPolicyKind::Bounded {
            return;
        }

        if reconnect.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "sync.reconnect.max_attempts",
                "max_attempts must be greater than 0 for the bounded policy",
            ));
        }

        if reconnect.delay_ms < MIN_SENSIBLE_DELAY_MS {
            result.add_warning(ValidationWarning::new(
                "sync.reconnect.delay_ms",
                format!(
                    "delay_ms below {} ms will hammer the credential service",
                    MIN_SENSIBLE_DELAY_MS
                ),
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, valid_levels
                ),
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
