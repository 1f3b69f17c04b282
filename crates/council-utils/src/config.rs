//! Environment configuration helpers

use std::str::FromStr;
use thiserror::Error;

/// Error raised when an environment variable is present but unusable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("{key} is not valid unicode")]
    NotUnicode { key: String },

    #[error("{key}={value} could not be parsed: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Read a non-empty variable, treating blank values as unset
pub fn env_string(key: &str) -> Result<Option<String>, EnvError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(EnvError::NotUnicode {
            key: key.to_string(),
        }),
    }
}

/// Read and parse a variable, `None` when unset
pub fn env_parse<T>(key: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)?
        .map(|value| {
            value.parse::<T>().map_err(|e| EnvError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

/// Read and parse a variable, falling back to `default` when unset
pub fn env_or<T>(key: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(env_parse(key)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test touches its own variable so they can run in parallel.

    #[test]
    fn test_env_string_blank_is_unset() {
        // SAFETY: the variable is unique to this test
        unsafe {
            std::env::set_var("COUNCIL_UTILS_TEST_BLANK", "   ");
        }
        assert_eq!(env_string("COUNCIL_UTILS_TEST_BLANK"), Ok(None));
        assert_eq!(env_string("COUNCIL_UTILS_TEST_MISSING"), Ok(None));
    }

    #[test]
    fn test_env_parse() {
        // SAFETY: the variable is unique to this test
        unsafe {
            std::env::set_var("COUNCIL_UTILS_TEST_NUMBER", " 42 ");
        }
        assert_eq!(env_parse::<u32>("COUNCIL_UTILS_TEST_NUMBER"), Ok(Some(42)));
        assert_eq!(env_or::<u32>("COUNCIL_UTILS_TEST_ABSENT", 7), Ok(7));
    }

    #[test]
    fn test_env_parse_invalid() {
        // SAFETY: the variable is unique to this test
        unsafe {
            std::env::set_var("COUNCIL_UTILS_TEST_BAD", "soon");
        }
        let err = env_parse::<u64>("COUNCIL_UTILS_TEST_BAD").unwrap_err();
        assert!(matches!(err, EnvError::Invalid { ref value, .. } if value == "soon"));
        assert!(err.to_string().starts_with("COUNCIL_UTILS_TEST_BAD=soon"));
    }
}
