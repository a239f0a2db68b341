//! qspec validation - the gate between query generation and execution
//!
//! Decides whether a generated query specification is valid against a
//! dataset's columns. Validation is fail-fast: the first broken rule is
//! reported and nothing after it is examined.
//!
//! ```
//! use qspec_validate::{check_query, is_valid, ErrorKind};
//!
//! let columns = ["duration_ms"];
//! assert!(is_valid(r#"{"calculations":[{"op":"MAX","column":"duration_ms"}]}"#, &columns, true));
//!
//! let err = check_query(r#"{"calculations":[{"op":"MEDIAN"}]}"#, &columns, true).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidOperation);
//! ```

use qspec_model::ColumnSet;
use tracing::debug;

mod error;
mod rules;

pub use error::{ErrorKind, ValidationError, Violation};
pub use rules::DEFAULT_TIME_RANGE;

use rules::RuleEngine;

/// Validates query specifications against one column set
///
/// Strict by default: every referenced column must be in the column set.
/// Turn strictness off to check structure only.
pub struct Validator<'a, C: ColumnSet + ?Sized> {
    columns: &'a C,
    strict: bool,
}

impl<'a, C: ColumnSet + ?Sized> Validator<'a, C> {
    pub fn new(columns: &'a C) -> Self {
        Self {
            columns,
            strict: true,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Return the first violated rule, if any
    pub fn check(&self, query: &str) -> Result<(), ValidationError> {
        RuleEngine::new(self.columns, self.strict)
            .run(query)
            .map_err(|violation| {
                debug!(kind = %violation.kind(), strict = self.strict, "query spec rejected: {}", violation);
                ValidationError::new(violation, query)
            })
    }

    pub fn is_valid(&self, query: &str) -> bool {
        self.check(query).is_ok()
    }
}

/// Raise the first violated rule of `query`
pub fn check_query<C: ColumnSet + ?Sized>(
    query: &str,
    columns: &C,
    strict: bool,
) -> Result<(), ValidationError> {
    Validator::new(columns).strict(strict).check(query)
}

/// Test if a query is valid
pub fn is_valid<C: ColumnSet + ?Sized>(query: &str, columns: &C, strict: bool) -> bool {
    Validator::new(columns).strict(strict).is_valid(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_defaults_to_strict() {
        let columns = vec!["duration_ms".to_string()];
        let validator = Validator::new(&columns);
        assert!(validator.is_strict());
        assert!(!validator.is_valid(r#"{"breakdowns":["name"]}"#));
        assert!(validator.strict(false).is_valid(r#"{"breakdowns":["name"]}"#));
    }

    #[test]
    fn test_error_keeps_submitted_text() {
        let query = "{'calculations':[{'op':'NOPE'}]}";
        let err = check_query(query, ["duration_ms"].as_slice(), true).unwrap_err();
        assert_eq!(err.query(), query);
        assert!(err.to_string().ends_with(&format!("\nQuery: {}", query)));
    }
}
