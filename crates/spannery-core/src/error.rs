//! Error types shared by every Spannery crate.

use std::sync::Arc;

use thiserror::Error;

/// Error produced by the external database client. Shared so that `Error`
/// stays cheap to clone.
pub type ClientError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the mapping layer.
///
/// Client failures are carried through untouched in [`Error::Client`];
/// everything else originates in this layer.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The declared schema is unusable (no fields, no primary key, bad identifier...).
    #[error("model definition error: {0}")]
    ModelDefinition(String),

    /// A single-row lookup found nothing.
    #[error("{model} matching {criteria} not found")]
    RecordNotFound { model: String, criteria: String },

    /// A call expecting exactly one row found several.
    #[error("multiple {model} rows found ({count}) where one was expected")]
    MultipleResults { model: String, count: usize },

    /// The model type or name has not been registered.
    #[error("model `{0}` is not registered")]
    UnknownModel(String),

    /// A field reference does not exist in the target schema.
    #[error("model `{model}` has no field `{field}`")]
    UnknownField { model: String, field: String },

    /// A table-qualified reference names neither a joined table nor an alias.
    #[error("table `{0}` is not part of this query")]
    UnknownTable(String),

    /// A table joined more than once was referenced by name.
    #[error("table `{table}` is joined more than once ({aliases}); qualify by alias")]
    AmbiguousTable { table: String, aliases: String },

    /// An explicit join alias clashes with one already in use.
    #[error("alias `{0}` is already in use")]
    DuplicateAlias(String),

    /// A primary-key lookup did not provide every key column.
    #[error("invalid key for {model}: {reason}")]
    InvalidKey { model: String, reason: String },

    /// A value could not be coerced to the field's type.
    #[error("cannot convert field `{field}`: expected {expected}, found {found}")]
    Conversion {
        field: String,
        expected: String,
        found: String,
    },

    /// Error reported by the external database client.
    #[error(transparent)]
    Client(ClientError),

    /// Anything else.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Wrap an error coming from the external client.
    pub fn client<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Client(Arc::new(err))
    }

    /// True for [`Error::RecordNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound { .. })
    }

    pub(crate) fn conversion(
        field: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Error::Conversion {
            field: field.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(format!("json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Unavailable;

    impl std::fmt::Display for Unavailable {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("service unavailable")
        }
    }

    impl std::error::Error for Unavailable {}

    #[test]
    fn test_client_error_is_transparent() {
        let err = Error::client(Unavailable);
        assert_eq!(err.to_string(), "service unavailable");
        assert!(matches!(err, Error::Client(_)));
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::RecordNotFound {
            model: "Product".to_string(),
            criteria: "t0.Name = 'x'".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Product matching t0.Name = 'x' not found");
    }

    #[test]
    fn test_multiple_results_message() {
        let err = Error::MultipleResults {
            model: "Product".to_string(),
            count: 3,
        };
        assert!(err.to_string().contains("multiple"));
        assert_eq!(err.to_string(), "multiple Product rows found (3) where one was expected");
    }
}
