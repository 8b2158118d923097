//! Query configuration.

use serde::{Deserialize, Serialize};

/// Configuration for query building and result materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Accept result sets without column names by zipping rows against the
    /// schema's field order.
    pub allow_positional_rows: bool,
    /// Prefix of generated parameter names (`p` gives `@p0`, `@p1`...).
    pub param_prefix: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            allow_positional_rows: true,
            param_prefix: "p".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: QueryConfig =
            serde_json::from_str(r#"{"allow_positional_rows": false}"#).unwrap();
        assert!(!config.allow_positional_rows);
        assert_eq!(config.param_prefix, "p");
    }
}
