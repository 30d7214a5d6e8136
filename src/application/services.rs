use crate::domain::condition::{ComparisonOperator, ConditionValue, FieldCondition};
use crate::domain::dates::{DateTarget, parse_date_target};
use crate::domain::error::Error;
use crate::domain::field::{FieldId, FieldType, MetadataField, USER_SCHEMA_ID};
use crate::domain::privilege_set::{PrivilegeSet, PrivilegeSetItem, SetLogic};
use crate::domain::record::{Record, RecordId};
use crate::domain::user::User;
use crate::domain::value::{FieldValue, NormalizedTarget, compare, expiration_candidate};
use crate::infrastructure::{FieldRepository, RecordRepository, ScalarTarget, UserRepository};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// Errors surfaced by privilege evaluation: fatal authoring/configuration
/// errors from the object model, or storage failures from the backing
/// repositories.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Policy(#[from] Error),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Result of evaluating a privilege set for a (user, record) pair.
///
/// `expires_at` is the earliest future instant at which a currently-true
/// result could flip due to an elapsed-time condition; access-control caching
/// layers use it to bound how long the result may be reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationOutcome {
    pub satisfied: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request-scoped memoization for field definitions and normalized record
/// values. Threaded through the evaluation service explicitly; callers clear
/// it between logically distinct evaluation batches to bound memory.
#[derive(Debug, Default)]
pub struct EvaluationCache {
    fields: Mutex<HashMap<FieldId, Option<MetadataField>>>,
    values: Mutex<HashMap<(RecordId, FieldId), FieldValue>>,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties both memoization tables.
    pub fn clear(&self) {
        self.fields.lock().unwrap().clear();
        self.values.lock().unwrap().clear();
    }

    fn cached_field(&self, id: FieldId) -> Option<Option<MetadataField>> {
        self.fields.lock().unwrap().get(&id).cloned()
    }

    fn store_field(&self, id: FieldId, field: Option<MetadataField>) {
        self.fields.lock().unwrap().insert(id, field);
    }

    fn cached_value(&self, record_id: RecordId, field_id: FieldId) -> Option<FieldValue> {
        self.values.lock().unwrap().get(&(record_id, field_id)).cloned()
    }

    fn store_value(&self, record_id: RecordId, field_id: FieldId, value: FieldValue) {
        self.values.lock().unwrap().insert((record_id, field_id), value);
    }
}

/// Evaluates privilege set trees against user/record pairs, backed by the
/// metadata field, record, and user repositories.
pub struct PrivilegeEvaluationService {
    pub field_repo: Arc<dyn FieldRepository>,
    pub record_repo: Arc<dyn RecordRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub cache: Arc<EvaluationCache>,
}

impl PrivilegeEvaluationService {
    pub fn new(
        field_repo: Arc<dyn FieldRepository>,
        record_repo: Arc<dyn RecordRepository>,
        user_repo: Arc<dyn UserRepository>,
        cache: Arc<EvaluationCache>,
    ) -> Self {
        Self {
            field_repo,
            record_repo,
            user_repo,
            cache,
        }
    }

    /// Clears the field and value memoization tables.
    pub fn clear_caches(&self) {
        self.cache.clear();
    }

    /// Determines whether the user/record pair satisfies the privilege set.
    ///
    /// With no record supplied, conditions are checked collection-wide: a
    /// condition holds if any record at all would satisfy it.
    #[instrument(
        name = "meets_requirements",
        skip(self, set, user, record),
        fields(user_id = user.map(|u| u.id), record_id = record.map(|r| r.id))
    )]
    pub async fn meets_requirements(
        &self,
        set: &PrivilegeSet,
        user: Option<&User>,
        record: Option<&Record>,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let (satisfied, expires_at) = self.evaluate_set(set, user, record).await?;
        info!(satisfied, "Privilege set evaluated");
        Ok(EvaluationOutcome {
            satisfied,
            expires_at,
        })
    }

    /// Recursive walk of the tree. Satisfaction short-circuits per AND/OR
    /// semantics, but the expiration minimum accumulates across every child
    /// visited before the break.
    fn evaluate_set<'a>(
        &'a self,
        set: &'a PrivilegeSet,
        user: Option<&'a User>,
        record: Option<&'a Record>,
    ) -> BoxFuture<'a, Result<(bool, Option<DateTime<Utc>>), EvaluationError>> {
        Box::pin(async move {
            // An empty node is vacuously satisfied under either logic; this
            // permits unrestricted access when no rule is configured.
            let mut satisfied = true;
            let mut expires_at: Option<DateTime<Utc>> = None;
            for item in set.items() {
                let (child_ok, child_expires) = match item {
                    PrivilegeSetItem::Privilege(id) => {
                        (user.map(|u| u.has_priv(*id)).unwrap_or(false), None)
                    }
                    PrivilegeSetItem::Condition(condition) => {
                        self.meets_condition(condition, record, user, set.logic())
                            .await?
                    }
                    PrivilegeSetItem::Subset(subset) => {
                        self.evaluate_set(subset, user, record).await?
                    }
                };
                satisfied = child_ok;
                expires_at = min_expiration(expires_at, child_expires);
                match set.logic() {
                    SetLogic::And if !satisfied => break,
                    SetLogic::Or if satisfied => break,
                    _ => {}
                }
            }
            Ok((satisfied, expires_at))
        })
    }

    /// Evaluates a single condition for the pair. `logic` is the containing
    /// node's logic; it decides the vacuous truth value when the condition
    /// cannot actually be evaluated.
    pub async fn meets_condition(
        &self,
        condition: &FieldCondition,
        record: Option<&Record>,
        user: Option<&User>,
        logic: SetLogic,
    ) -> Result<(bool, Option<DateTime<Utc>>), EvaluationError> {
        // A condition on a field that no longer exists resolves vacuously
        // rather than failing, so stored policies survive schema evolution.
        let Some(field) = self.lookup_field(condition.field_id).await? else {
            return Ok((logic.vacuous_value(), None));
        };
        validate_operator(&field, condition.operator)?;

        let Some(record) = record else {
            let count = self.count_for_field(&field, condition, user).await?;
            return Ok((count > 0, None));
        };

        // Cross-schema conditions only make sense for user-schema fields,
        // which are evaluated against the acting user instead of the record.
        if field.schema_id != record.schema_id && field.schema_id != USER_SCHEMA_ID {
            return Ok((logic.vacuous_value(), None));
        }

        let now = Utc::now();
        let target = normalize_target(&field, &condition.value, user, now)?;
        let value = if field.schema_id == USER_SCHEMA_ID {
            match user {
                Some(u) => self.user_repo.get_field_value(u.id, &field).await?,
                None => FieldValue::Absent,
            }
        } else {
            self.record_field_value(record, &field).await?
        };

        let expires_at = expiration_candidate(&value, &target);
        let satisfied = compare(&value, condition.operator, &target)?;
        Ok((satisfied, expires_at))
    }

    /// Collection-wide satisfiability: how many records would satisfy the
    /// condition. Used for "any record" checks and facet/privilege
    /// possibility analysis.
    #[instrument(
        name = "count_satisfying_records",
        skip(self, condition, user),
        fields(field_id = condition.field_id)
    )]
    pub async fn count_satisfying_records(
        &self,
        condition: &FieldCondition,
        user: Option<&User>,
    ) -> Result<i64, EvaluationError> {
        let field = self
            .lookup_field(condition.field_id)
            .await?
            .ok_or_else(|| Error::UnknownField(condition.field_id.to_string()))?;
        validate_operator(&field, condition.operator)?;
        self.count_for_field(&field, condition, user).await
    }

    async fn count_for_field(
        &self,
        field: &MetadataField,
        condition: &FieldCondition,
        user: Option<&User>,
    ) -> Result<i64, EvaluationError> {
        let now = Utc::now();
        match field.field_type {
            FieldType::Option => {
                let term = match &condition.value {
                    ConditionValue::Number(n) => *n,
                    other => {
                        return Err(Error::BadConditionValue(
                            other.to_authoring_text(),
                            field.field_type,
                        )
                        .into());
                    }
                };
                let associated = self
                    .record_repo
                    .count_records_with_value_id(field, term)
                    .await?;
                match condition.operator {
                    ComparisonOperator::Equal => Ok(associated),
                    ComparisonOperator::NotEqual => {
                        let total = self.record_repo.total_record_count(field.schema_id).await?;
                        Ok(total - associated)
                    }
                    other => Err(Error::MultiValueOperator(other).into()),
                }
            }
            FieldType::User => {
                let target = match &condition.value {
                    ConditionValue::Absent => user.map(|u| u.id),
                    ConditionValue::Number(n) => Some(*n),
                    ConditionValue::Text(s) => {
                        return Err(Error::BadConditionValue(s.clone(), field.field_type).into());
                    }
                };
                match target {
                    // Nobody logged in: nothing can match the acting user.
                    None => Ok(0),
                    Some(user_id) => Ok(self
                        .record_repo
                        .count_records_with_value_id(field, user_id)
                        .await?),
                }
            }
            FieldType::Date | FieldType::Timestamp => {
                let target = normalize_date_target(field, &condition.value, now)?;
                Ok(self
                    .record_repo
                    .count_matching_records(
                        field,
                        condition.operator,
                        ScalarTarget::Timestamp(target.at),
                    )
                    .await?)
            }
            FieldType::Number => {
                let n = match &condition.value {
                    ConditionValue::Number(n) => *n,
                    other => {
                        return Err(Error::BadConditionValue(
                            other.to_authoring_text(),
                            field.field_type,
                        )
                        .into());
                    }
                };
                Ok(self
                    .record_repo
                    .count_matching_records(field, condition.operator, ScalarTarget::Number(n))
                    .await?)
            }
            FieldType::Flag => {
                let flag = match &condition.value {
                    ConditionValue::Number(n) => *n != 0,
                    other => {
                        return Err(Error::BadConditionValue(
                            other.to_authoring_text(),
                            field.field_type,
                        )
                        .into());
                    }
                };
                Ok(self
                    .record_repo
                    .count_matching_records(field, condition.operator, ScalarTarget::Flag(flag))
                    .await?)
            }
            other => Err(Error::UnsupportedFieldType(other).into()),
        }
    }

    async fn lookup_field(&self, id: FieldId) -> Result<Option<MetadataField>, EvaluationError> {
        if let Some(cached) = self.cache.cached_field(id) {
            return Ok(cached);
        }
        let field = self.field_repo.get_field(id).await?;
        self.cache.store_field(id, field.clone());
        Ok(field)
    }

    async fn record_field_value(
        &self,
        record: &Record,
        field: &MetadataField,
    ) -> Result<FieldValue, EvaluationError> {
        if let Some(cached) = self.cache.cached_value(record.id, field.id) {
            return Ok(cached);
        }
        let value = self.record_repo.get_field_value(record.id, field).await?;
        self.cache.store_value(record.id, field.id, value.clone());
        Ok(value)
    }
}

fn min_expiration(
    current: Option<DateTime<Utc>>,
    candidate: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn validate_operator(field: &MetadataField, operator: ComparisonOperator) -> Result<(), Error> {
    if !field.field_type.supports_conditions() {
        return Err(Error::UnsupportedFieldType(field.field_type));
    }
    if !operator.is_valid_for(field.field_type) {
        return Err(Error::InvalidOperator {
            operator,
            field_type: field.field_type,
        });
    }
    Ok(())
}

fn normalize_date_target(
    field: &MetadataField,
    value: &ConditionValue,
    now: DateTime<Utc>,
) -> Result<DateTarget, Error> {
    match value {
        ConditionValue::Absent => Ok(DateTarget::absolute(now)),
        ConditionValue::Text(s) => parse_date_target(s, now),
        ConditionValue::Number(n) => Err(Error::BadConditionValue(n.to_string(), field.field_type)),
    }
}

fn normalize_target(
    field: &MetadataField,
    value: &ConditionValue,
    user: Option<&User>,
    now: DateTime<Utc>,
) -> Result<NormalizedTarget, Error> {
    match field.field_type {
        FieldType::Date | FieldType::Timestamp => Ok(NormalizedTarget::Time(
            normalize_date_target(field, value, now)?,
        )),
        FieldType::User => match value {
            ConditionValue::Absent => Ok(NormalizedTarget::Id(user.map(|u| u.id))),
            ConditionValue::Number(n) => Ok(NormalizedTarget::Id(Some(*n))),
            ConditionValue::Text(s) => Err(Error::BadConditionValue(s.clone(), field.field_type)),
        },
        FieldType::Option => match value {
            ConditionValue::Number(n) => Ok(NormalizedTarget::Id(Some(*n))),
            other => Err(Error::BadConditionValue(
                other.to_authoring_text(),
                field.field_type,
            )),
        },
        FieldType::Number => match value {
            ConditionValue::Number(n) => Ok(NormalizedTarget::Number(*n)),
            other => Err(Error::BadConditionValue(
                other.to_authoring_text(),
                field.field_type,
            )),
        },
        FieldType::Flag => match value {
            ConditionValue::Number(n) => Ok(NormalizedTarget::Flag(*n != 0)),
            other => Err(Error::BadConditionValue(
                other.to_authoring_text(),
                field.field_type,
            )),
        },
        other => Err(Error::UnsupportedFieldType(other)),
    }
}
