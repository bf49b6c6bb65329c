//! Environment variable parsing with typed validation errors.

use alloy::primitives::{Address, U256};
use std::str::FromStr;
use thiserror::Error;

/// Configuration validation failure, naming the offending variable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(String),

    #[error("{var} is not a valid address: {value:?}")]
    InvalidAddress { var: String, value: String },

    #[error("{var} is not a valid integer: {value:?}")]
    InvalidInteger { var: String, value: String },

    #[error("{var} must be non-negative, got {value}")]
    Negative { var: String, value: String },

    #[error("{var} is not a valid boolean (expected true/false/1/0): {value:?}")]
    InvalidBool { var: String, value: String },

    #[error("{var} is not a valid URL: {value:?}")]
    InvalidUrl { var: String, value: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Variable source. Production reads the process environment; tests pass a map.
pub(crate) struct EnvSource<'a> {
    lookup: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> EnvSource<'a> {
    pub(crate) fn new(lookup: impl Fn(&str) -> Option<String> + 'a) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    /// Trimmed value; unset and blank are both `None`.
    fn get(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Raw value, distinguishing an empty string from an unset variable.
    fn get_raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var).map(|v| v.trim().to_string())
    }

    pub(crate) fn required(&self, var: &str) -> Result<String, ConfigError> {
        self.get(var).ok_or_else(|| ConfigError::Missing(var.to_string()))
    }

    pub(crate) fn url(&self, var: &str) -> Result<String, ConfigError> {
        let value = self.required(var)?;
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(value)
        } else {
            Err(ConfigError::InvalidUrl {
                var: var.to_string(),
                value,
            })
        }
    }

    pub(crate) fn address(&self, var: &str) -> Result<Address, ConfigError> {
        let value = self.required(var)?;
        parse_address(var, &value)
    }

    pub(crate) fn u64_or(&self, var: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(var) {
            Some(value) => parse_non_negative(var, &value),
            None => Ok(default),
        }
    }

    pub(crate) fn u64_required(&self, var: &str) -> Result<u64, ConfigError> {
        let value = self.required(var)?;
        parse_non_negative(var, &value)
    }

    pub(crate) fn u32_or(&self, var: &str, default: u32) -> Result<u32, ConfigError> {
        let value = self.u64_or(var, default as u64)?;
        u32::try_from(value).map_err(|_| ConfigError::InvalidInteger {
            var: var.to_string(),
            value: value.to_string(),
        })
    }

    pub(crate) fn u16_or(&self, var: &str, default: u16) -> Result<u16, ConfigError> {
        let value = self.u64_or(var, default as u64)?;
        u16::try_from(value).map_err(|_| ConfigError::InvalidInteger {
            var: var.to_string(),
            value: value.to_string(),
        })
    }

    pub(crate) fn u256_or(&self, var: &str, default: U256) -> Result<U256, ConfigError> {
        match self.get(var) {
            Some(value) => {
                if value.starts_with('-') {
                    return Err(ConfigError::Negative {
                        var: var.to_string(),
                        value,
                    });
                }
                U256::from_str(&value).map_err(|_| ConfigError::InvalidInteger {
                    var: var.to_string(),
                    value,
                })
            }
            None => Ok(default),
        }
    }

    /// Booleans must be set explicitly when present: an empty value is rejected.
    pub(crate) fn bool_or(&self, var: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_raw(var) {
            Some(value) => parse_bool(var, &value),
            None => Ok(default),
        }
    }
}

pub(crate) fn parse_address(var: &str, value: &str) -> Result<Address, ConfigError> {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    if hex.len() != 40 {
        return Err(ConfigError::InvalidAddress {
            var: var.to_string(),
            value: value.to_string(),
        });
    }
    Address::from_str(value).map_err(|_| ConfigError::InvalidAddress {
        var: var.to_string(),
        value: value.to_string(),
    })
}

fn parse_non_negative(var: &str, value: &str) -> Result<u64, ConfigError> {
    if let Ok(n) = value.parse::<i128>() {
        if n < 0 {
            return Err(ConfigError::Negative {
                var: var.to_string(),
                value: value.to_string(),
            });
        }
    }
    value.parse::<u64>().map_err(|_| ConfigError::InvalidInteger {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// Accepts `true`/`false`/`1`/`0`, case-insensitive, surrounding whitespace ignored.
pub fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_bool_variants() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(parse_bool("X", " 1 ").unwrap());
        assert!(!parse_bool("X", "False").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(matches!(
            parse_bool("X", ""),
            Err(ConfigError::InvalidBool { .. })
        ));
        assert!(parse_bool("X", "yes").is_err());
    }

    #[test]
    fn test_integers_reject_negative_and_garbage() {
        let vars = source(&[("A", "-5"), ("B", "12abc"), ("C", "42")]);
        let env = EnvSource::new(|k| vars.get(k).cloned());

        assert!(matches!(env.u64_or("A", 0), Err(ConfigError::Negative { .. })));
        assert!(matches!(
            env.u64_or("B", 0),
            Err(ConfigError::InvalidInteger { .. })
        ));
        assert_eq!(env.u64_or("C", 0).unwrap(), 42);
        assert_eq!(env.u64_or("UNSET", 7).unwrap(), 7);
    }

    #[test]
    fn test_empty_bool_is_rejected_but_unset_defaults() {
        let vars = source(&[("FLAG", "")]);
        let env = EnvSource::new(|k| vars.get(k).cloned());
        assert!(env.bool_or("FLAG", true).is_err());
        assert!(env.bool_or("OTHER", true).unwrap());
    }

    #[test]
    fn test_address_validation() {
        assert!(parse_address("A", "0x000000000000000000000000000000000000dEaD").is_ok());
        assert!(matches!(
            parse_address("A", "0x1234"),
            Err(ConfigError::InvalidAddress { .. })
        ));
        assert!(parse_address("A", "0xzz0000000000000000000000000000000000dEaD").is_err());
    }

    #[test]
    fn test_error_names_variable() {
        let vars = source(&[]);
        let env = EnvSource::new(|k| vars.get(k).cloned());
        let err = env.required("L1_RPC_URL").unwrap_err();
        assert!(err.to_string().contains("L1_RPC_URL"));
    }
}
