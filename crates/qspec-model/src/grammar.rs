//! Grammar tables for query specifications
//!
//! Closed operator enumerations. Each table is a compile-time constant and
//! every per-operator contract (column operand, value shape) is decided by an
//! exhaustive match, so adding an operator forces its contract to be stated.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a string is not a member of a grammar table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator: {0}")]
pub struct UnknownOperator(pub String);

/// Calculation (aggregation) operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculateOp {
    Count,
    CountDistinct,
    Heatmap,
    Concurrency,
    Sum,
    Avg,
    Max,
    Min,
    P001,
    P01,
    P05,
    P10,
    P25,
    P50,
    P75,
    P90,
    P95,
    P99,
    P999,
    RateAvg,
    RateSum,
    RateMax,
}

impl CalculateOp {
    pub const ALL: [CalculateOp; 22] = [
        CalculateOp::Count,
        CalculateOp::CountDistinct,
        CalculateOp::Heatmap,
        CalculateOp::Concurrency,
        CalculateOp::Sum,
        CalculateOp::Avg,
        CalculateOp::Max,
        CalculateOp::Min,
        CalculateOp::P001,
        CalculateOp::P01,
        CalculateOp::P05,
        CalculateOp::P10,
        CalculateOp::P25,
        CalculateOp::P50,
        CalculateOp::P75,
        CalculateOp::P90,
        CalculateOp::P95,
        CalculateOp::P99,
        CalculateOp::P999,
        CalculateOp::RateAvg,
        CalculateOp::RateSum,
        CalculateOp::RateMax,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalculateOp::Count => "COUNT",
            CalculateOp::CountDistinct => "COUNT_DISTINCT",
            CalculateOp::Heatmap => "HEATMAP",
            CalculateOp::Concurrency => "CONCURRENCY",
            CalculateOp::Sum => "SUM",
            CalculateOp::Avg => "AVG",
            CalculateOp::Max => "MAX",
            CalculateOp::Min => "MIN",
            CalculateOp::P001 => "P001",
            CalculateOp::P01 => "P01",
            CalculateOp::P05 => "P05",
            CalculateOp::P10 => "P10",
            CalculateOp::P25 => "P25",
            CalculateOp::P50 => "P50",
            CalculateOp::P75 => "P75",
            CalculateOp::P90 => "P90",
            CalculateOp::P95 => "P95",
            CalculateOp::P99 => "P99",
            CalculateOp::P999 => "P999",
            CalculateOp::RateAvg => "RATE_AVG",
            CalculateOp::RateSum => "RATE_SUM",
            CalculateOp::RateMax => "RATE_MAX",
        }
    }

    /// Whether the operator is applied to a column
    ///
    /// `COUNT` and `CONCURRENCY` operate on rows and must not name a column;
    /// every other operator requires one.
    pub fn takes_column(self) -> bool {
        match self {
            CalculateOp::Count | CalculateOp::Concurrency => false,
            CalculateOp::CountDistinct
            | CalculateOp::Heatmap
            | CalculateOp::Sum
            | CalculateOp::Avg
            | CalculateOp::Max
            | CalculateOp::Min
            | CalculateOp::P001
            | CalculateOp::P01
            | CalculateOp::P05
            | CalculateOp::P10
            | CalculateOp::P25
            | CalculateOp::P50
            | CalculateOp::P75
            | CalculateOp::P90
            | CalculateOp::P95
            | CalculateOp::P99
            | CalculateOp::P999
            | CalculateOp::RateAvg
            | CalculateOp::RateSum
            | CalculateOp::RateMax => true,
        }
    }

    /// Whether the operator's result can be filtered by a having clause
    pub fn supports_having(self) -> bool {
        !matches!(self, CalculateOp::Heatmap)
    }
}

impl FromStr for CalculateOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalculateOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for CalculateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value operand a filter operator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No `value` key at all
    Absent,
    /// A JSON array
    List,
    /// Anything but a list or an object
    Scalar,
}

/// Filter (row predicate) operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    StartsWith,
    DoesNotStartWith,
    Exists,
    DoesNotExist,
    Contains,
    DoesNotContain,
    In,
    NotIn,
}

impl FilterOp {
    pub const ALL: [FilterOp; 14] = [
        FilterOp::Eq,
        FilterOp::Ne,
        FilterOp::Gt,
        FilterOp::Ge,
        FilterOp::Lt,
        FilterOp::Le,
        FilterOp::StartsWith,
        FilterOp::DoesNotStartWith,
        FilterOp::Exists,
        FilterOp::DoesNotExist,
        FilterOp::Contains,
        FilterOp::DoesNotContain,
        FilterOp::In,
        FilterOp::NotIn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "!=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::StartsWith => "starts-with",
            FilterOp::DoesNotStartWith => "does-not-start-with",
            FilterOp::Exists => "exists",
            FilterOp::DoesNotExist => "does-not-exist",
            FilterOp::Contains => "contains",
            FilterOp::DoesNotContain => "does-not-contain",
            FilterOp::In => "in",
            FilterOp::NotIn => "not-in",
        }
    }

    pub fn value_shape(self) -> ValueShape {
        match self {
            FilterOp::Exists | FilterOp::DoesNotExist => ValueShape::Absent,
            FilterOp::In | FilterOp::NotIn => ValueShape::List,
            FilterOp::Eq
            | FilterOp::Ne
            | FilterOp::Gt
            | FilterOp::Ge
            | FilterOp::Lt
            | FilterOp::Le
            | FilterOp::StartsWith
            | FilterOp::DoesNotStartWith
            | FilterOp::Contains
            | FilterOp::DoesNotContain => ValueShape::Scalar,
        }
    }

    /// Plain comparisons, the only operators a having clause accepts
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            FilterOp::Eq | FilterOp::Ne | FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le
        )
    }
}

impl FromStr for FilterOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How filters combine; parsed case-insensitively
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterCombination {
    And,
    Or,
}

impl FromStr for FilterCombination {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "and" => Ok(FilterCombination::And),
            "or" => Ok(FilterCombination::Or),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

/// Sort direction of an order directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Ascending,
    Descending,
}

impl FromStr for OrderDirection {
    type Err = UnknownOperator;

    // Exact match, unlike filter combinations
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascending" => Ok(OrderDirection::Ascending),
            "descending" => Ok(OrderDirection::Descending),
            _ => Err(UnknownOperator(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_ops_round_trip_names() {
        for op in CalculateOp::ALL {
            assert_eq!(op.as_str().parse::<CalculateOp>(), Ok(op));
        }
        assert!("count".parse::<CalculateOp>().is_err());
        assert!("P100".parse::<CalculateOp>().is_err());
    }

    #[test]
    fn test_only_count_and_concurrency_skip_columns() {
        let columnless: Vec<_> = CalculateOp::ALL
            .into_iter()
            .filter(|op| !op.takes_column())
            .collect();
        assert_eq!(columnless, vec![CalculateOp::Count, CalculateOp::Concurrency]);
    }

    #[test]
    fn test_filter_value_shapes() {
        assert_eq!(FilterOp::Exists.value_shape(), ValueShape::Absent);
        assert_eq!(FilterOp::DoesNotExist.value_shape(), ValueShape::Absent);
        assert_eq!(FilterOp::In.value_shape(), ValueShape::List);
        assert_eq!(FilterOp::NotIn.value_shape(), ValueShape::List);
        assert_eq!("contains".parse::<FilterOp>().unwrap().value_shape(), ValueShape::Scalar);
        assert!("like".parse::<FilterOp>().is_err());
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let err = "MEDIAN".parse::<CalculateOp>().unwrap_err();
        assert_eq!(err, UnknownOperator("MEDIAN".to_string()));
        assert_eq!(err.to_string(), "unknown operator: MEDIAN");

        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_comparisons() {
        let comparisons: Vec<_> = FilterOp::ALL
            .into_iter()
            .filter(|op| op.is_comparison())
            .map(FilterOp::as_str)
            .collect();
        assert_eq!(comparisons, vec!["=", "!=", ">", ">=", "<", "<="]);
    }

    #[test]
    fn test_filter_combination_is_case_insensitive() {
        assert_eq!("AND".parse::<FilterCombination>(), Ok(FilterCombination::And));
        assert_eq!("Or".parse::<FilterCombination>(), Ok(FilterCombination::Or));
        assert!("xor".parse::<FilterCombination>().is_err());
    }

    #[test]
    fn test_order_direction_is_exact() {
        assert_eq!("descending".parse::<OrderDirection>(), Ok(OrderDirection::Descending));
        assert!("DESC".parse::<OrderDirection>().is_err());
    }
}
