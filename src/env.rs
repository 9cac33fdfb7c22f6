//! Environment variable substitution for configuration values
//!
//! Config strings may reference environment variables with the
//! `${VAR_NAME}` syntax, which keeps tokens and app secrets out of
//! config files.

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;

use crate::config::ConfigError;

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Substitute `${VAR_NAME}` references in a string.
///
/// Fails with a single error listing every unset variable rather than
/// stopping at the first one.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing: Vec<String> = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match env::var(name) {
            Ok(value) => value,
            Err(_) => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing.join(", ")
        )));
    }

    Ok(result.into_owned())
}
