use crate::domain::condition::ComparisonOperator;
use crate::domain::dates::DateTarget;
use crate::domain::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A record (or user) field value, normalized for comparison: an id list for
/// set-valued fields, a UTC instant for Date/Timestamp fields, and scalars
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Absent,
    Ids(Vec<i64>),
    Timestamp(DateTime<Utc>),
    Number(i64),
    Flag(bool),
    Text(String),
}

/// A condition target after normalization against the evaluation context
/// ("now" resolved, "current user" resolved).
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedTarget {
    /// Target id for User/Option fields. `None` means the target was the
    /// acting user and nobody is logged in.
    Id(Option<i64>),
    Time(DateTarget),
    Number(i64),
    Flag(bool),
}

/// Applies `operator` between a normalized field value and a normalized
/// target. Operator legality for the field type has already been checked;
/// the remaining failure mode is an ordering operator against an id list.
pub fn compare(
    value: &FieldValue,
    operator: ComparisonOperator,
    target: &NormalizedTarget,
) -> Result<bool, Error> {
    match (value, target) {
        (FieldValue::Ids(ids), NormalizedTarget::Id(target_id)) => {
            let contained = target_id.map(|id| ids.contains(&id)).unwrap_or(false);
            operator.holds_for_membership(contained)
        }
        (FieldValue::Timestamp(v), NormalizedTarget::Time(t)) => {
            Ok(operator.holds_for(v.cmp(&t.at)))
        }
        (FieldValue::Number(v), NormalizedTarget::Number(t)) => Ok(operator.holds_for(v.cmp(t))),
        (FieldValue::Flag(v), NormalizedTarget::Flag(t)) => Ok(operator.holds_for(v.cmp(t))),
        (FieldValue::Absent, _) => {
            // An unset value only satisfies "does not equal/contain".
            Ok(operator == ComparisonOperator::NotEqual)
        }
        // A stored value of an unexpected shape never satisfies a condition.
        _ => Ok(false),
    }
}

/// When the target came from a relative date expression, a true-now
/// comparison can flip once the value's age reaches the expression's offset.
/// Returns that instant if it lies in the future of the target time.
pub fn expiration_candidate(
    value: &FieldValue,
    target: &NormalizedTarget,
) -> Option<DateTime<Utc>> {
    if let (FieldValue::Timestamp(v), NormalizedTarget::Time(t)) = (value, target) {
        if let Some(offset) = t.relative {
            if *v > t.at {
                return Some(*v + offset);
            }
        }
    }
    None
}
