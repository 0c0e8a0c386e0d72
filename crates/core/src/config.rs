use crate::error::{RefscopeError, Result};
use serde::{Deserialize, Serialize};

/// Tunables of an analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Worker threads used to parse a batch of files; `1` parses inline.
    pub max_parallel_parse: usize,
    /// Batches smaller than this are parsed inline.
    pub parallel_parse_min_batch: usize,
    /// Declarations produced between two cancellation checks.
    pub cancel_check_batch: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_parallel_parse: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            parallel_parse_min_batch: 8,
            cancel_check_batch: 64,
        }
    }
}

impl DriverConfig {
    /// Defaults overridden by `REFSCOPE_MAX_PARALLEL_PARSE` and `REFSCOPE_CANCEL_BATCH`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup("REFSCOPE_MAX_PARALLEL_PARSE") {
            config.max_parallel_parse = parse_positive("REFSCOPE_MAX_PARALLEL_PARSE", &value)?;
        }
        if let Some(value) = lookup("REFSCOPE_CANCEL_BATCH") {
            config.cancel_check_batch = parse_positive("REFSCOPE_CANCEL_BATCH", &value)?;
        }
        Ok(config)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RefscopeError::Config(format!(
            "{key} must be a positive integer, got {value:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let config = DriverConfig::from_lookup(|key| match key {
            "REFSCOPE_MAX_PARALLEL_PARSE" => Some("3".into()),
            "REFSCOPE_CANCEL_BATCH" => Some("16".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.max_parallel_parse, 3);
        assert_eq!(config.cancel_check_batch, 16);
        assert_eq!(config.parallel_parse_min_batch, 8);
    }

    #[test]
    fn test_rejects_zero() {
        let err = DriverConfig::from_lookup(|key| {
            (key == "REFSCOPE_CANCEL_BATCH").then(|| "0".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, RefscopeError::Config(_)));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: DriverConfig = serde_json::from_str(r#"{"cancel_check_batch": 10}"#).unwrap();
        assert_eq!(config.cancel_check_batch, 10);
        assert_eq!(config.parallel_parse_min_batch, 8);
    }
}
