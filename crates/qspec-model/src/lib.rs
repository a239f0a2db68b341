//! qspec model - typed query specifications
//!
//! Typed representation of the analytic query specifications emitted by the
//! natural-language-to-query generator. Every field is optional: absence is
//! meaningful and is judged by the rule engine in `qspec-validate`, not here.
//!
//! Fields whose *type* is checked by the rule engine (operators, columns, the
//! integer time fields, filter and having values) keep enough of the raw JSON
//! to report a precise violation later instead of failing deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

mod columns;
mod grammar;

pub use columns::*;
pub use grammar::*;

/// Root query specification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculations: Option<Vec<Calculation>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<Filter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_combination: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdowns: Option<Vec<TextField>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub havings: Option<Vec<Having>>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub time_range: Option<IntegerField>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<IntegerField>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<IntegerField>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub granularity: Option<IntegerField>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub limit: Option<IntegerField>,
}

impl QuerySpec {
    /// Build a spec from an already-parsed JSON object
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Operators named by the calculations, in order
    pub fn calculation_ops(&self) -> impl Iterator<Item = &str> {
        self.calculations
            .iter()
            .flatten()
            .filter_map(|calc| calc.op.as_ref().and_then(TextField::as_str))
    }
}

/// Aggregation applied to an optional column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<TextField>,
}

/// Row predicate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<TextField>,

    /// `Some(Value::Null)` when the key is present with a null value
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Sort directive over a calculation operator or a bare column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<TextField>,
}

/// Post-aggregation filter over a calculation's result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Having {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate_op: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<TextField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<TextField>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A field that must hold a string, kept raw when it does not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    Text(String),
    Invalid(Value),
}

impl TextField {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TextField::Text(text) => Some(text),
            TextField::Invalid(_) => None,
        }
    }
}

impl From<&str> for TextField {
    fn from(text: &str) -> Self {
        TextField::Text(text.to_string())
    }
}

/// Strings render bare, anything else as JSON
impl std::fmt::Display for TextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextField::Text(text) => f.write_str(text),
            TextField::Invalid(value) => write!(f, "{}", value),
        }
    }
}

/// A field that must hold an integer, kept raw when it does not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntegerField {
    Integer(i64),
    Invalid(Value),
}

impl IntegerField {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            IntegerField::Integer(n) => Some(*n),
            IntegerField::Invalid(_) => None,
        }
    }
}

impl std::fmt::Display for IntegerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegerField::Integer(n) => write!(f, "{}", n),
            IntegerField::Invalid(value) => write!(f, "{}", value),
        }
    }
}

// A key that is present maps to `Some`, even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_keys_are_ignored() {
        let spec = QuerySpec::from_value(json!({
            "filters": [{"column": "name", "op": "exists", "join_column": ""}]
        }))
        .unwrap();

        let filters = spec.filters.unwrap();
        assert_eq!(filters[0].column, Some(TextField::from("name")));
        assert_eq!(filters[0].value, None);
    }

    #[test]
    fn test_null_value_counts_as_present() {
        let spec = QuerySpec::from_value(json!({
            "filters": [{"column": "name", "op": "=", "value": null}],
            "limit": null
        }))
        .unwrap();

        assert_eq!(spec.filters.unwrap()[0].value, Some(Value::Null));
        assert_eq!(spec.limit, Some(IntegerField::Invalid(Value::Null)));
    }

    #[test]
    fn test_integer_fields_keep_non_integers() {
        let spec = QuerySpec::from_value(json!({
            "time_range": 7200,
            "granularity": 60.5,
            "limit": "10"
        }))
        .unwrap();

        assert_eq!(spec.time_range.and_then(|t| t.as_integer()), Some(7200));
        assert_eq!(spec.granularity.as_ref().and_then(IntegerField::as_integer), None);
        assert_eq!(spec.limit.unwrap().to_string(), "\"10\"");
    }

    #[test]
    fn test_calculation_ops() {
        let spec = QuerySpec::from_value(json!({
            "calculations": [{"op": "COUNT"}, {"op": "MAX", "column": "duration_ms"}, {}]
        }))
        .unwrap();

        assert_eq!(spec.calculation_ops().collect::<Vec<_>>(), vec!["COUNT", "MAX"]);
    }

    #[test]
    fn test_text_fields_keep_non_strings() {
        let spec = QuerySpec::from_value(json!({
            "calculations": [{"op": 5, "column": null}],
            "breakdowns": ["name", 123],
            "filter_combination": true
        }))
        .unwrap();

        let calc = &spec.calculations.as_ref().unwrap()[0];
        assert_eq!(calc.op, Some(TextField::Invalid(json!(5))));
        assert_eq!(calc.column, None);
        assert_eq!(calc.op.as_ref().unwrap().to_string(), "5");
        assert_eq!(spec.calculation_ops().count(), 0);

        let breakdowns = spec.breakdowns.unwrap();
        assert_eq!(breakdowns[0].as_str(), Some("name"));
        assert_eq!(breakdowns[1].to_string(), "123");
        assert_eq!(spec.filter_combination.unwrap().to_string(), "true");
    }

    #[test]
    fn test_wrong_section_shape_is_an_error() {
        assert!(QuerySpec::from_value(json!({"calculations": "COUNT"})).is_err());
        assert!(QuerySpec::from_value(json!({"filters": ["name"]})).is_err());
    }

    #[test]
    fn test_serialized_fragment_skips_absent_fields() {
        let calc = Calculation {
            op: Some("COUNT".into()),
            column: None,
        };
        assert_eq!(serde_json::to_string(&calc).unwrap(), r#"{"op":"COUNT"}"#);
    }
}
