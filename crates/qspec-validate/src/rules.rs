//! Rule engine
//!
//! Walks a query specification section by section and stops at the first
//! broken rule. Sections are checked in this order:
//!
//! 1. parse (quote normalization, JSON, non-empty object)
//! 2. calculations
//! 3. filters
//! 4. filter_combination
//! 5. breakdowns
//! 6. orders
//! 7. havings
//! 8. time_range / start_time / end_time
//! 9. granularity
//! 10. limit
//!
//! Column membership is only checked in strict mode.

use std::str::FromStr;

use qspec_model::{
    CalculateOp, ColumnSet, FilterCombination, FilterOp, IntegerField, OrderDirection, QuerySpec,
    TextField, ValueShape,
};
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::error::Violation;

/// Window assumed when a spec names neither `time_range` nor both endpoints
pub const DEFAULT_TIME_RANGE: i64 = 7200;

pub(crate) struct RuleEngine<'a, C: ColumnSet + ?Sized> {
    columns: &'a C,
    strict: bool,
}

impl<'a, C: ColumnSet + ?Sized> RuleEngine<'a, C> {
    pub(crate) fn new(columns: &'a C, strict: bool) -> Self {
        Self { columns, strict }
    }

    pub(crate) fn run(&self, text: &str) -> Result<(), Violation> {
        let spec = parse_spec(text)?;

        self.check_calculations(&spec)?;
        self.check_filters(&spec)?;
        check_filter_combination(&spec)?;
        self.check_breakdowns(&spec)?;
        self.check_orders(&spec)?;
        self.check_havings(&spec)?;
        let window = check_time_fields(&spec)?;
        check_granularity(&spec, window)?;
        integer("limit", spec.limit.as_ref())?;

        Ok(())
    }

    fn check_calculations(&self, spec: &QuerySpec) -> Result<(), Violation> {
        let calculations = spec.calculations.as_deref().unwrap_or_default();
        trace!(count = calculations.len(), "checking calculations");

        for calc in calculations {
            let name = calc.op.as_ref().ok_or_else(|| Violation::MissingCalculationOp {
                fragment: fragment(calc),
            })?;
            let op: CalculateOp = lookup(name, |op| Violation::InvalidCalculation { op })?;

            if let Some(column) = column_operand(op, calc.column.as_ref(), || fragment(calc))? {
                self.require_column(column, || Violation::InvalidColumn {
                    column: column.to_string(),
                })?;
            }
        }

        Ok(())
    }

    fn check_filters(&self, spec: &QuerySpec) -> Result<(), Violation> {
        let filters = spec.filters.as_deref().unwrap_or_default();
        trace!(count = filters.len(), "checking filters");

        for filter in filters {
            let name = filter.op.as_ref().ok_or(Violation::MissingFilterOp)?;
            let op: FilterOp = lookup(name, |op| Violation::InvalidFilter { op })?;

            let column = filter
                .column
                .as_ref()
                .ok_or_else(|| Violation::MissingFilterColumn {
                    fragment: fragment(filter),
                })?;
            self.require_column(column, || Violation::InvalidColumn {
                column: column.to_string(),
            })?;

            let op_name = op.to_string();
            match (op.value_shape(), &filter.value) {
                (ValueShape::Absent, None) => {}
                (ValueShape::Absent, Some(_)) => {
                    return Err(Violation::ValueNotAllowed {
                        fragment: fragment(filter),
                        op: op_name,
                    })
                }
                (ValueShape::List, Some(Value::Array(_))) => {}
                (ValueShape::List, _) => {
                    return Err(Violation::ListRequired {
                        fragment: fragment(filter),
                        op: op_name,
                    })
                }
                (ValueShape::Scalar, Some(value)) if is_scalar(value) => {}
                (ValueShape::Scalar, Some(_)) => {
                    return Err(Violation::ScalarRequired {
                        fragment: fragment(filter),
                        op: op_name,
                    })
                }
                (ValueShape::Scalar, None) => {
                    return Err(Violation::ValueRequired {
                        fragment: fragment(filter),
                        op: op_name,
                    })
                }
            }
        }

        Ok(())
    }

    fn check_breakdowns(&self, spec: &QuerySpec) -> Result<(), Violation> {
        for breakdown in spec.breakdowns.iter().flatten() {
            self.require_column(breakdown, || Violation::InvalidColumn {
                column: breakdown.to_string(),
            })?;
        }
        Ok(())
    }

    fn check_orders(&self, spec: &QuerySpec) -> Result<(), Violation> {
        let orders = spec.orders.as_deref().unwrap_or_default();
        trace!(count = orders.len(), "checking orders");

        for order in orders {
            let direction = order
                .order
                .as_ref()
                .ok_or_else(|| Violation::MissingOrderDirection {
                    fragment: fragment(order),
                })?;
            lookup::<OrderDirection>(direction, |direction| {
                Violation::InvalidOrderDirection { direction }
            })?;

            let column = match order.op.as_ref() {
                Some(name) => {
                    let op: CalculateOp = lookup(name, |op| Violation::InvalidOrderOp { op })?;

                    // Matched by operator name only; the calculation may use another column.
                    if !spec.calculation_ops().any(|calculated| calculated == op.as_str()) {
                        return Err(Violation::UnreferencedOrderOp {
                            fragment: fragment(order),
                            op: op.to_string(),
                        });
                    }

                    column_operand(op, order.column.as_ref(), || fragment(order))?
                }
                None => Some(order.column.as_ref().ok_or_else(|| {
                    Violation::MissingOrderTarget {
                        fragment: fragment(order),
                    }
                })?),
            };

            if let Some(column) = column {
                self.require_column(column, || Violation::InvalidOrderColumn {
                    fragment: fragment(order),
                    column: column.to_string(),
                })?;
            }
        }

        Ok(())
    }

    fn check_havings(&self, spec: &QuerySpec) -> Result<(), Violation> {
        let havings = spec.havings.as_deref().unwrap_or_default();
        trace!(count = havings.len(), "checking havings");

        for having in havings {
            let calculate_name = having.calculate_op.as_ref().ok_or_else(|| {
                Violation::MissingHavingCalculateOp {
                    fragment: fragment(having),
                }
            })?;
            let value = having
                .value
                .as_ref()
                .ok_or_else(|| Violation::MissingHavingValue {
                    fragment: fragment(having),
                })?;
            let name = having.op.as_ref().ok_or_else(|| Violation::MissingHavingOp {
                fragment: fragment(having),
            })?;

            let calculate_op = match calculate_name.as_str().map(str::parse::<CalculateOp>) {
                Some(Ok(op)) if !op.supports_having() => return Err(Violation::HeatmapHaving),
                Some(Ok(op)) => op,
                _ => {
                    return Err(Violation::InvalidHavingCalculateOp {
                        op: calculate_name.to_string(),
                    })
                }
            };

            match name.as_str().map(str::parse::<FilterOp>) {
                Some(Ok(op)) if op.is_comparison() => {}
                _ => {
                    return Err(Violation::InvalidHavingOp {
                        op: name.to_string(),
                    })
                }
            }

            if !is_scalar(value) {
                return Err(Violation::HavingValueNotScalar {
                    fragment: fragment(having),
                });
            }

            if let Some(column) =
                column_operand(calculate_op, having.column.as_ref(), || fragment(having))?
            {
                self.require_column(column, || Violation::InvalidHavingColumn {
                    fragment: fragment(having),
                    column: column.to_string(),
                })?;
            }
        }

        Ok(())
    }

    // Non-string column names never match the column set.
    fn require_column(
        &self,
        column: &TextField,
        violation: impl FnOnce() -> Violation,
    ) -> Result<(), Violation> {
        let known = column
            .as_str()
            .is_some_and(|name| self.columns.contains_column(name));
        if self.strict && !known {
            return Err(violation());
        }
        Ok(())
    }
}

/// Normalize quotes, parse JSON and build the typed model
pub(crate) fn parse_spec(text: &str) -> Result<QuerySpec, Violation> {
    // Upstream output often uses single quotes. Apostrophes inside values are
    // rewritten too.
    let normalized = text.replace('\'', "\"");

    let value: Value =
        serde_json::from_str(&normalized).map_err(|e| Violation::Json(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        _ => return Err(Violation::NotAnObject),
    };
    if map.is_empty() {
        return Err(Violation::Empty);
    }

    QuerySpec::from_value(Value::Object(map)).map_err(|e| Violation::Malformed(e.to_string()))
}

fn check_filter_combination(spec: &QuerySpec) -> Result<(), Violation> {
    if let Some(combination) = spec.filter_combination.as_ref() {
        lookup::<FilterCombination>(combination, |combination| {
            Violation::InvalidFilterCombination { combination }
        })?;
    }
    Ok(())
}

/// Type-check the time fields and return the effective window in seconds
fn check_time_fields(spec: &QuerySpec) -> Result<i128, Violation> {
    if spec.time_range.is_some() && spec.start_time.is_some() && spec.end_time.is_some() {
        return Err(Violation::ConflictingTimeFields);
    }

    let time_range = integer("time_range", spec.time_range.as_ref())?;
    let start_time = integer("start_time", spec.start_time.as_ref())?;
    let end_time = integer("end_time", spec.end_time.as_ref())?;

    let window = match (time_range, start_time, end_time) {
        (Some(range), _, _) => i128::from(range),
        (None, Some(start), Some(end)) => i128::from(end) - i128::from(start),
        _ => i128::from(DEFAULT_TIME_RANGE),
    };
    trace!(window = %window, "effective time window");

    Ok(window)
}

// window / 1000 <= granularity <= window / 10, compared without rounding
fn check_granularity(spec: &QuerySpec, window: i128) -> Result<(), Violation> {
    let Some(granularity) = integer("granularity", spec.granularity.as_ref())? else {
        return Ok(());
    };

    let scaled = i128::from(granularity);
    if scaled * 10 > window {
        return Err(Violation::GranularityTooCoarse { granularity });
    }
    if scaled * 1000 < window {
        return Err(Violation::GranularityTooFine { granularity });
    }
    Ok(())
}

/// Apply the column-presence rule of a calculation operator
///
/// Returns the column to check against the schema, if the operator takes one.
fn column_operand<'s>(
    op: CalculateOp,
    column: Option<&'s TextField>,
    fragment: impl FnOnce() -> String,
) -> Result<Option<&'s TextField>, Violation> {
    match (op.takes_column(), column) {
        (false, None) => Ok(None),
        (false, Some(_)) => Err(Violation::ColumnNotAllowed {
            fragment: fragment(),
            op: op.to_string(),
        }),
        (true, Some(column)) => Ok(Some(column)),
        (true, None) => Err(Violation::ColumnRequired {
            fragment: fragment(),
            op: op.to_string(),
        }),
    }
}

/// Resolve a grammar-table name; non-strings and unknown names fail alike
fn lookup<T: FromStr>(
    name: &TextField,
    violation: impl FnOnce(String) -> Violation,
) -> Result<T, Violation> {
    name.as_str()
        .and_then(|name| name.parse().ok())
        .ok_or_else(|| violation(name.to_string()))
}

fn integer(field: &'static str, value: Option<&IntegerField>) -> Result<Option<i64>, Violation> {
    match value {
        None => Ok(None),
        Some(IntegerField::Integer(n)) => Ok(Some(*n)),
        Some(invalid @ IntegerField::Invalid(_)) => Err(Violation::NotAnInteger {
            field,
            value: invalid.to_string(),
        }),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn fragment<T: Serialize>(part: &T) -> String {
    serde_json::to_string(part).unwrap_or_default()
}
