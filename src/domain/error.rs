use crate::domain::condition::ComparisonOperator;
use crate::domain::field::FieldType;

/// Fatal authoring/configuration errors raised by the privilege object model.
///
/// Conditions that merely cannot be evaluated (missing field, cross-schema
/// field) are not errors; they resolve to a vacuous truth value chosen by the
/// containing node's logic.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operator {operator} is not valid for {field_type} fields")]
    InvalidOperator {
        operator: ComparisonOperator,
        field_type: FieldType,
    },
    #[error("operator {0} cannot be applied to a multi-valued field")]
    MultiValueOperator(ComparisonOperator),
    #[error("{0} fields cannot be used in conditions")]
    UnsupportedFieldType(FieldType),
    #[error("value \"{0}\" is not usable for {1} fields")]
    BadConditionValue(String, FieldType),
    #[error("unparseable date expression \"{0}\"")]
    BadDateExpression(String),
    #[error("malformed privilege set data: {0}")]
    MalformedData(String),
    #[error("malformed privilege set XML: {0}")]
    Xml(String),
    #[error("unknown XML tag <{0}>")]
    UnknownXmlTag(String),
    #[error("unknown metadata field \"{0}\"")]
    UnknownField(String),
    #[error("unknown privilege \"{0}\"")]
    UnknownPrivilege(String),
}
