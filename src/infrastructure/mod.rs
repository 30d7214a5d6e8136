use crate::domain::condition::ComparisonOperator;
use crate::domain::field::{FieldId, MetadataField, SchemaId};
use crate::domain::record::{Record, RecordId};
use crate::domain::user::{User, UserId};
use crate::domain::value::FieldValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;

pub type RepoResult<T> = Result<T, Error>;

// Infrastructure layer: database access and adapters

pub mod field_repository;
pub use field_repository::PostgresFieldRepository;

pub mod record_repository;
pub use record_repository::PostgresRecordRepository;

pub mod user_repository;
pub use user_repository::PostgresUserRepository;

pub mod privilege_set_repository;
pub use privilege_set_repository::{
    InMemoryPrivilegeSetRepository, PostgresPrivilegeSetRepository, PrivilegeSetRepository,
    StoredPrivilegeSet,
};

/// Scalar comparison target for the generic matching-record count query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarTarget {
    Number(i64),
    Timestamp(DateTime<Utc>),
    Flag(bool),
}

#[async_trait]
pub trait FieldRepository: Send + Sync {
    async fn get_field(&self, id: FieldId) -> RepoResult<Option<MetadataField>>;
    async fn list_fields(&self) -> RepoResult<Vec<MetadataField>>;
}

#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>>;
    /// Normalized value of the field for a record: an id list for set-valued
    /// fields, a timestamp for Date/Timestamp, a scalar otherwise.
    async fn get_field_value(
        &self,
        record_id: RecordId,
        field: &MetadataField,
    ) -> RepoResult<FieldValue>;
    /// How many records carry a scalar value matching `operator target`.
    async fn count_matching_records(
        &self,
        field: &MetadataField,
        operator: ComparisonOperator,
        target: ScalarTarget,
    ) -> RepoResult<i64>;
    /// How many records are associated with the given id (option term or
    /// user) through a set-valued field.
    async fn count_records_with_value_id(
        &self,
        field: &MetadataField,
        value_id: i64,
    ) -> RepoResult<i64>;
    async fn total_record_count(&self, schema_id: SchemaId) -> RepoResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    /// User-schema field value for the account, normalized like record values.
    async fn get_field_value(&self, user_id: UserId, field: &MetadataField)
    -> RepoResult<FieldValue>;
}

pub struct InMemoryFieldRepository {
    pub fields: std::sync::Mutex<Vec<MetadataField>>,
}

impl InMemoryFieldRepository {
    pub fn new(fields: Vec<MetadataField>) -> Self {
        Self {
            fields: std::sync::Mutex::new(fields),
        }
    }

    pub fn add_field(&self, field: MetadataField) {
        self.fields.lock().unwrap().push(field);
    }

    /// Drops a field definition, as happens when a schema is edited after
    /// privilege sets referencing the field were stored.
    pub fn remove_field(&self, id: FieldId) {
        self.fields.lock().unwrap().retain(|f| f.id != id);
    }
}

#[async_trait]
impl FieldRepository for InMemoryFieldRepository {
    async fn get_field(&self, id: FieldId) -> RepoResult<Option<MetadataField>> {
        Ok(self.fields.lock().unwrap().iter().find(|f| f.id == id).cloned())
    }

    async fn list_fields(&self) -> RepoResult<Vec<MetadataField>> {
        Ok(self.fields.lock().unwrap().clone())
    }
}

pub struct InMemoryRecordRepository {
    pub records: std::sync::Mutex<Vec<Record>>,
    pub values: std::sync::Mutex<std::collections::HashMap<(RecordId, FieldId), FieldValue>>,
}

impl InMemoryRecordRepository {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: std::sync::Mutex::new(records),
            values: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn set_field_value(&self, record_id: RecordId, field_id: FieldId, value: FieldValue) {
        self.values.lock().unwrap().insert((record_id, field_id), value);
    }

    fn value_of(&self, record_id: RecordId, field_id: FieldId) -> FieldValue {
        self.values
            .lock()
            .unwrap()
            .get(&(record_id, field_id))
            .cloned()
            .unwrap_or(FieldValue::Absent)
    }
}

#[async_trait]
impl RecordRepository for InMemoryRecordRepository {
    async fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        Ok(self.records.lock().unwrap().iter().find(|r| r.id == id).copied())
    }

    async fn get_field_value(
        &self,
        record_id: RecordId,
        field: &MetadataField,
    ) -> RepoResult<FieldValue> {
        Ok(self.value_of(record_id, field.id))
    }

    async fn count_matching_records(
        &self,
        field: &MetadataField,
        operator: ComparisonOperator,
        target: ScalarTarget,
    ) -> RepoResult<i64> {
        let records: Vec<Record> = self.records.lock().unwrap().clone();
        let mut count = 0;
        for record in records {
            if record.schema_id != field.schema_id {
                continue;
            }
            let matched = match (self.value_of(record.id, field.id), target) {
                (FieldValue::Number(v), ScalarTarget::Number(t)) => operator.holds_for(v.cmp(&t)),
                (FieldValue::Timestamp(v), ScalarTarget::Timestamp(t)) => {
                    operator.holds_for(v.cmp(&t))
                }
                (FieldValue::Flag(v), ScalarTarget::Flag(t)) => operator.holds_for(v.cmp(&t)),
                _ => false,
            };
            if matched {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn count_records_with_value_id(
        &self,
        field: &MetadataField,
        value_id: i64,
    ) -> RepoResult<i64> {
        let records: Vec<Record> = self.records.lock().unwrap().clone();
        let mut count = 0;
        for record in records {
            if record.schema_id != field.schema_id {
                continue;
            }
            if let FieldValue::Ids(ids) = self.value_of(record.id, field.id) {
                if ids.contains(&value_id) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    async fn total_record_count(&self, schema_id: SchemaId) -> RepoResult<i64> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.schema_id == schema_id)
            .count() as i64)
    }
}

pub struct InMemoryUserRepository {
    pub users: std::sync::Mutex<Vec<User>>,
    pub values: std::sync::Mutex<std::collections::HashMap<(UserId, FieldId), FieldValue>>,
}

impl InMemoryUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users: std::sync::Mutex::new(users),
            values: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn set_field_value(&self, user_id: UserId, field_id: FieldId, value: FieldValue) {
        self.values.lock().unwrap().insert((user_id, field_id), value);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn get_field_value(
        &self,
        user_id: UserId,
        field: &MetadataField,
    ) -> RepoResult<FieldValue> {
        Ok(self
            .values
            .lock()
            .unwrap()
            .get(&(user_id, field.id))
            .cloned()
            .unwrap_or(FieldValue::Absent))
    }
}
