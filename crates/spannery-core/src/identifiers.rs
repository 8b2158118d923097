//! Identifier validation.
//!
//! Table, column and alias names are spliced into SQL text verbatim, so they are
//! checked once when a schema is registered or an alias is chosen.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

fn identifier_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(IDENTIFIER_PATTERN) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(error = %e, "identifier pattern failed to compile; rejecting all names");
            None
        }
    })
    .as_ref()
}

/// Whether `name` is a plain, unquoted SQL identifier.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 128 && identifier_regex().is_some_and(|re| re.is_match(name))
}

/// Fail with a model-definition error when `name` is not a plain identifier.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::ModelDefinition(format!(
            "invalid {kind} name `{name}`"
        )))
    }
}
