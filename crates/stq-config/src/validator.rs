//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

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

    /// Turn the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
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

#[cfg(unix)]
const VALID_BACKENDS: &[&str] = &["pty", "pipe"];
#[cfg(not(unix))]
const VALID_BACKENDS: &[&str] = &["pipe"];

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_storage(config, &mut result);
        Self::validate_runner(config, &mut result);
        Self::validate_queue(config, &mut result);
        Self::validate_log(config, &mut result);

        Ok(result)
    }

    fn validate_storage(config: &Config, result: &mut ValidationResult) {
        if config.storage.root.trim().is_empty() {
            result.add_error(ValidationError::new(
                "storage.root",
                "Storage root cannot be empty",
            ));
        }
    }

    fn validate_runner(config: &Config, result: &mut ValidationResult) {
        let runner = &config.runner;

        if !VALID_BACKENDS.contains(&runner.backend.as_str()) {
            result.add_error(ValidationError::new(
                "runner.backend",
                format!(
                    "Unknown runner backend '{}', valid values: {:?}",
                    runner.backend, VALID_BACKENDS
                ),
            ));
        }

        if runner.output_capacity == 0 {
            result.add_error(ValidationError::new(
                "runner.output_capacity",
                "output_capacity must be greater than 0",
            ));
        }

        if runner.read_buffer_size == 0 {
            result.add_error(ValidationError::new(
                "runner.read_buffer_size",
                "read_buffer_size must be greater than 0",
            ));
        }

        if runner.allow_privileged {
            result.add_warning(ValidationWarning::new(
                "runner.allow_privileged",
                "Tasks may be spawned with root privileges",
            ));
        }

        if matches!(runner.log_dir.as_deref(), Some(dir) if dir.trim().is_empty()) {
            result.add_error(ValidationError::new(
                "runner.log_dir",
                "log_dir cannot be empty when set",
            ));
        }
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        let interval = config.queue.poll_interval_ms;
        if interval == 0 {
            result.add_error(ValidationError::new(
                "queue.poll_interval_ms",
                "poll_interval_ms must be greater than 0",
            ));
        } else if interval < 10 {
            result.add_warning(ValidationWarning::new(
                "queue.poll_interval_ms",
                "poll_interval_ms is very low (<10), the loop will spin",
            ));
        }
    }

    fn validate_log(config: &Config, result: &mut ValidationResult) {
        if config.log.level.trim().is_empty() {
            result.add_error(ValidationError::new(
                "log.level",
                "Log level cannot be empty",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
