use crate::domain::error::Error;
use crate::domain::field::{FieldId, FieldType};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator applied between a field value and a condition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl ComparisonOperator {
    /// Operator legality by field type. User fields admit only equality,
    /// ordered scalar types admit all six operators, and set-like types admit
    /// equality and inequality ("contains" / "does not contain").
    pub fn is_valid_for(self, field_type: FieldType) -> bool {
        match field_type {
            FieldType::User => self == ComparisonOperator::Equal,
            FieldType::Number | FieldType::Date | FieldType::Timestamp => true,
            FieldType::Flag | FieldType::Option => {
                matches!(self, ComparisonOperator::Equal | ComparisonOperator::NotEqual)
            }
            _ => false,
        }
    }

    /// Whether an ordering outcome satisfies this operator.
    pub fn holds_for(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::LessThan => ordering == Ordering::Less,
            ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
            ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
        }
    }

    /// Whether a set-membership outcome satisfies this operator. Only
    /// equality operators make sense against multi-valued fields.
    pub fn holds_for_membership(self, contained: bool) -> Result<bool, Error> {
        match self {
            ComparisonOperator::Equal => Ok(contained),
            ComparisonOperator::NotEqual => Ok(!contained),
            other => Err(Error::MultiValueOperator(other)),
        }
    }

    /// SQL comparison symbol for this operator.
    pub fn sql_symbol(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::GreaterOrEqual => ">=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOperator::Equal => "==",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::GreaterOrEqual => ">=",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ComparisonOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(ComparisonOperator::Equal),
            "!=" => Ok(ComparisonOperator::NotEqual),
            "<" => Ok(ComparisonOperator::LessThan),
            ">" => Ok(ComparisonOperator::GreaterThan),
            "<=" => Ok(ComparisonOperator::LessOrEqual),
            ">=" => Ok(ComparisonOperator::GreaterOrEqual),
            other => Err(format!("unknown operator: {other}")),
        }
    }
}

/// Target value of a condition.
///
/// `Absent` is meaningful: it stands for "now" when compared against a
/// Date/Timestamp field and "the acting user" when compared against a User
/// field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Absent,
    Number(i64),
    Text(String),
}

impl ConditionValue {
    /// Converts an authoring-format string (XML value text, request DTO) to a
    /// condition value. `NULL`, `TRUE`, and `FALSE` literals are recognized,
    /// and digit strings become numbers.
    pub fn from_authoring_text(s: &str) -> ConditionValue {
        match s {
            "NULL" => ConditionValue::Absent,
            "TRUE" => ConditionValue::Number(1),
            "FALSE" => ConditionValue::Number(0),
            _ => match s.parse::<i64>() {
                Ok(n) => ConditionValue::Number(n),
                Err(_) => ConditionValue::Text(s.to_string()),
            },
        }
    }

    /// Inverse of `from_authoring_text`, used by the XML exporter.
    pub fn to_authoring_text(&self) -> String {
        match self {
            ConditionValue::Absent => "NULL".to_string(),
            ConditionValue::Number(n) => n.to_string(),
            ConditionValue::Text(s) => s.clone(),
        }
    }
}

/// A single field-value comparison used as an access rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    #[serde(rename = "FieldId")]
    pub field_id: FieldId,
    #[serde(rename = "Operator")]
    pub operator: ComparisonOperator,
    #[serde(rename = "Value")]
    pub value: ConditionValue,
}

impl FieldCondition {
    pub fn new(field_id: FieldId, operator: ComparisonOperator, value: ConditionValue) -> Self {
        Self {
            field_id,
            operator,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trip() {
        for op in [
            ComparisonOperator::Equal,
            ComparisonOperator::NotEqual,
            ComparisonOperator::LessThan,
            ComparisonOperator::GreaterThan,
            ComparisonOperator::LessOrEqual,
            ComparisonOperator::GreaterOrEqual,
        ] {
            assert_eq!(op.to_string().parse::<ComparisonOperator>().unwrap(), op);
        }
        assert!("=>".parse::<ComparisonOperator>().is_err());
    }

    #[test]
    fn test_operator_legality() {
        assert!(ComparisonOperator::Equal.is_valid_for(FieldType::User));
        assert!(!ComparisonOperator::NotEqual.is_valid_for(FieldType::User));
        assert!(ComparisonOperator::LessThan.is_valid_for(FieldType::Number));
        assert!(ComparisonOperator::GreaterOrEqual.is_valid_for(FieldType::Timestamp));
        assert!(ComparisonOperator::NotEqual.is_valid_for(FieldType::Option));
        assert!(!ComparisonOperator::LessThan.is_valid_for(FieldType::Flag));
        assert!(!ComparisonOperator::Equal.is_valid_for(FieldType::Text));
    }

    #[test]
    fn test_membership_rejects_ordering_operators() {
        assert!(ComparisonOperator::Equal.holds_for_membership(true).unwrap());
        assert!(!ComparisonOperator::NotEqual.holds_for_membership(true).unwrap());
        assert!(ComparisonOperator::LessThan.holds_for_membership(true).is_err());
    }

    #[test]
    fn test_ordering_truth_table() {
        use std::cmp::Ordering::*;
        assert!(ComparisonOperator::LessOrEqual.holds_for(Equal));
        assert!(ComparisonOperator::LessOrEqual.holds_for(Less));
        assert!(!ComparisonOperator::LessOrEqual.holds_for(Greater));
        assert!(ComparisonOperator::GreaterOrEqual.holds_for(Equal));
        assert!(!ComparisonOperator::GreaterOrEqual.holds_for(Less));
    }

    #[test]
    fn test_authoring_text_conversion() {
        assert_eq!(
            ConditionValue::from_authoring_text("NULL"),
            ConditionValue::Absent
        );
        assert_eq!(
            ConditionValue::from_authoring_text("TRUE"),
            ConditionValue::Number(1)
        );
        assert_eq!(
            ConditionValue::from_authoring_text("42"),
            ConditionValue::Number(42)
        );
        assert_eq!(
            ConditionValue::from_authoring_text("3 days ago"),
            ConditionValue::Text("3 days ago".to_string())
        );
    }
}
