//! Validation errors
//!
//! Every rule reports a [`Violation`]. The facade wraps it in a
//! [`ValidationError`] together with the text that was submitted, so a
//! rejected query can be diagnosed from the error alone.

use thiserror::Error;

/// Machine-distinguishable category of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    EmptySpec,
    InvalidOperation,
    MissingField,
    InvalidColumn,
    ColumnArity,
    ValueShape,
    UnreferencedOrderOperator,
    UnsupportedHavingOperator,
    ConflictingTimeFields,
    Type,
    GranularityBounds,
    InvalidCombination,
    InvalidOrderDirection,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Parse => "parse",
            ErrorKind::EmptySpec => "empty_spec",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::MissingField => "missing_field",
            ErrorKind::InvalidColumn => "invalid_column",
            ErrorKind::ColumnArity => "column_arity",
            ErrorKind::ValueShape => "value_shape",
            ErrorKind::UnreferencedOrderOperator => "unreferenced_order_operator",
            ErrorKind::UnsupportedHavingOperator => "unsupported_having_operator",
            ErrorKind::ConflictingTimeFields => "conflicting_time_fields",
            ErrorKind::Type => "type",
            ErrorKind::GranularityBounds => "granularity_bounds",
            ErrorKind::InvalidCombination => "invalid_combination",
            ErrorKind::InvalidOrderDirection => "invalid_order_direction",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first rule a query specification broke
///
/// `fragment` fields hold the offending sub-object serialized as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("JSON parsing error: {0}")]
    Json(String),

    /// A section holds the wrong JSON type, e.g. `calculations` is not a list
    #[error("Malformed query spec: {0}")]
    Malformed(String),

    #[error("Query spec cannot be empty.")]
    Empty,

    #[error("Query spec was not parsed to json.")]
    NotAnObject,

    // Calculations
    #[error("{fragment}: Calculation must have an op.")]
    MissingCalculationOp { fragment: String },

    #[error("Invalid calculation: {op}")]
    InvalidCalculation { op: String },

    #[error("{fragment}: {op} cannot take a column as input.")]
    ColumnNotAllowed { fragment: String, op: String },

    #[error("{fragment}: {op} must take a column as input.")]
    ColumnRequired { fragment: String, op: String },

    #[error("Invalid column: {column}")]
    InvalidColumn { column: String },

    // Filters
    #[error("No op found in filter.")]
    MissingFilterOp,

    #[error("Invalid filter: {op}")]
    InvalidFilter { op: String },

    #[error("{fragment}: Filter must have a column.")]
    MissingFilterColumn { fragment: String },

    #[error("{fragment}: {op} cannot take a value as input.")]
    ValueNotAllowed { fragment: String, op: String },

    #[error("{fragment}: {op} must take a list as input.")]
    ListRequired { fragment: String, op: String },

    #[error("{fragment}: {op} must take a value as input.")]
    ValueRequired { fragment: String, op: String },

    #[error("{fragment}: {op} must take a single value, not a list or object.")]
    ScalarRequired { fragment: String, op: String },

    #[error("Invalid filter combination: {combination}")]
    InvalidFilterCombination { combination: String },

    // Orders
    #[error("Invalid order without orders key: {fragment}")]
    MissingOrderDirection { fragment: String },

    #[error("Invalid order: {direction}")]
    InvalidOrderDirection { direction: String },

    #[error("Invalid order: {op}")]
    InvalidOrderOp { op: String },

    #[error("{fragment}: Order op must be present in calculations: {op}")]
    UnreferencedOrderOp { fragment: String, op: String },

    #[error("{fragment}: Order must take a column or op as input.")]
    MissingOrderTarget { fragment: String },

    #[error("{fragment}: Invalid column in order: {column}")]
    InvalidOrderColumn { fragment: String, column: String },

    // Havings
    #[error("{fragment}: Having must have a calculate_op.")]
    MissingHavingCalculateOp { fragment: String },

    #[error("{fragment}: Having must have a value.")]
    MissingHavingValue { fragment: String },

    #[error("{fragment}: Having must have an op.")]
    MissingHavingOp { fragment: String },

    #[error("HEATMAP is not supported in having.")]
    HeatmapHaving,

    #[error("Invalid having calculate_op: {op}")]
    InvalidHavingCalculateOp { op: String },

    #[error("Invalid having op: {op}")]
    InvalidHavingOp { op: String },

    #[error("{fragment}: Having value must be a single value, not a list or object.")]
    HavingValueNotScalar { fragment: String },

    #[error("{fragment}: Invalid column in having: {column}")]
    InvalidHavingColumn { fragment: String, column: String },

    // Time window
    #[error("Time range cannot be specified with start_time and end_time.")]
    ConflictingTimeFields,

    #[error("{field} must be an int: {value}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("granularity must be <= time_range / 10: {granularity}")]
    GranularityTooCoarse { granularity: i64 },

    #[error("granularity must be >= time_range / 1000: {granularity}")]
    GranularityTooFine { granularity: i64 },
}

impl Violation {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Violation::Json(_) => ErrorKind::Parse,
            Violation::Empty | Violation::NotAnObject => ErrorKind::EmptySpec,
            Violation::InvalidCalculation { .. }
            | Violation::InvalidFilter { .. }
            | Violation::InvalidOrderOp { .. }
            | Violation::InvalidHavingCalculateOp { .. }
            | Violation::InvalidHavingOp { .. } => ErrorKind::InvalidOperation,
            Violation::MissingCalculationOp { .. }
            | Violation::MissingFilterOp
            | Violation::MissingFilterColumn { .. }
            | Violation::MissingOrderDirection { .. }
            | Violation::MissingOrderTarget { .. }
            | Violation::MissingHavingCalculateOp { .. }
            | Violation::MissingHavingOp { .. } => ErrorKind::MissingField,
            Violation::InvalidColumn { .. }
            | Violation::InvalidOrderColumn { .. }
            | Violation::InvalidHavingColumn { .. } => ErrorKind::InvalidColumn,
            Violation::ColumnNotAllowed { .. } | Violation::ColumnRequired { .. } => {
                ErrorKind::ColumnArity
            }
            Violation::ValueNotAllowed { .. }
            | Violation::ListRequired { .. }
            | Violation::ValueRequired { .. }
            | Violation::ScalarRequired { .. }
            | Violation::MissingHavingValue { .. }
            | Violation::HavingValueNotScalar { .. } => ErrorKind::ValueShape,
            Violation::UnreferencedOrderOp { .. } => ErrorKind::UnreferencedOrderOperator,
            Violation::HeatmapHaving => ErrorKind::UnsupportedHavingOperator,
            Violation::ConflictingTimeFields => ErrorKind::ConflictingTimeFields,
            Violation::Malformed(_) | Violation::NotAnInteger { .. } => ErrorKind::Type,
            Violation::GranularityTooCoarse { .. } | Violation::GranularityTooFine { .. } => {
                ErrorKind::GranularityBounds
            }
            Violation::InvalidFilterCombination { .. } => ErrorKind::InvalidCombination,
            Violation::InvalidOrderDirection { .. } => ErrorKind::InvalidOrderDirection,
        }
    }
}

/// A rejected query specification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{violation}\nQuery: {query}")]
pub struct ValidationError {
    #[source]
    violation: Violation,
    query: String,
}

impl ValidationError {
    pub fn new(violation: Violation, query: impl Into<String>) -> Self {
        Self {
            violation,
            query: query.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.violation.kind()
    }

    pub fn violation(&self) -> &Violation {
        &self.violation
    }

    /// The specification text exactly as it was submitted
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_embeds_query() {
        let err = ValidationError::new(
            Violation::InvalidCalculation {
                op: "MEDIAN".to_string(),
            },
            "{'calculations':[{'op':'MEDIAN'}]}",
        );

        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(
            err.to_string(),
            "Invalid calculation: MEDIAN\nQuery: {'calculations':[{'op':'MEDIAN'}]}"
        );
    }

    #[test]
    fn test_missing_having_value_is_a_shape_error() {
        let violation = Violation::MissingHavingValue {
            fragment: r#"{"calculate_op":"COUNT","op":">"}"#.to_string(),
        };
        assert_eq!(violation.kind(), ErrorKind::ValueShape);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::UnreferencedOrderOperator.to_string(), "unreferenced_order_operator");
        assert_eq!(ErrorKind::Type.as_str(), "type");
    }
}
