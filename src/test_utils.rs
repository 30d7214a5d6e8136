use crate::application::services::{EvaluationCache, PrivilegeEvaluationService};
use crate::domain::field::{
    DEFAULT_SCHEMA_ID, FieldType, MetadataField, MetadataSchema, USER_SCHEMA_ID,
};
use crate::domain::privilege::PrivilegeId;
use crate::domain::record::Record;
use crate::domain::user::User;
use crate::infrastructure::{
    FieldRepository, InMemoryFieldRepository, InMemoryPrivilegeSetRepository,
    InMemoryRecordRepository, InMemoryUserRepository, PrivilegeSetRepository, RecordRepository,
    UserRepository,
};
use crate::interface::app_state::AppState;
use std::sync::Arc;

pub const CREATION_DATE_FIELD: i64 = 1;
pub const VIEW_COUNT_FIELD: i64 = 2;
pub const CATEGORY_FIELD: i64 = 3;
pub const ADDED_BY_FIELD: i64 = 4;
pub const PUBLISHED_FIELD: i64 = 5;
pub const SIGNUP_DATE_FIELD: i64 = 10;
pub const TITLE_FIELD: i64 = 20;

/// Standard field layout used across the test suite: a handful of
/// condition-capable resource fields, one user-schema field, and one text
/// field that conditions must reject.
pub fn create_test_fields() -> Vec<MetadataField> {
    vec![
        MetadataField::new(
            CREATION_DATE_FIELD,
            "Date Of Record Creation",
            FieldType::Timestamp,
            DEFAULT_SCHEMA_ID,
        ),
        MetadataField::new(VIEW_COUNT_FIELD, "View Count", FieldType::Number, DEFAULT_SCHEMA_ID),
        MetadataField::new(CATEGORY_FIELD, "Category", FieldType::Option, DEFAULT_SCHEMA_ID),
        MetadataField::new(ADDED_BY_FIELD, "Added By Id", FieldType::User, DEFAULT_SCHEMA_ID),
        MetadataField::new(PUBLISHED_FIELD, "Is Published", FieldType::Flag, DEFAULT_SCHEMA_ID),
        MetadataField::new(SIGNUP_DATE_FIELD, "Signup Date", FieldType::Timestamp, USER_SCHEMA_ID),
        MetadataField::new(TITLE_FIELD, "Title", FieldType::Text, DEFAULT_SCHEMA_ID),
    ]
}

pub fn create_test_schema() -> MetadataSchema {
    MetadataSchema::new(create_test_fields())
}

/// Creates a test user with the given privileges
pub fn create_test_user(id: i64, privileges: Vec<PrivilegeId>) -> User {
    User::new(id, &format!("user{id}"), privileges)
}

/// Creates a test record in the default schema
pub fn create_test_record(id: i64) -> Record {
    Record {
        id,
        schema_id: DEFAULT_SCHEMA_ID,
    }
}

/// In-memory repository bundle backing a test evaluation service
pub struct TestFixture {
    pub field_repo: Arc<InMemoryFieldRepository>,
    pub record_repo: Arc<InMemoryRecordRepository>,
    pub user_repo: Arc<InMemoryUserRepository>,
    pub service: PrivilegeEvaluationService,
}

impl TestFixture {
    pub fn new(users: Vec<User>, records: Vec<Record>) -> Self {
        let field_repo = Arc::new(InMemoryFieldRepository::new(create_test_fields()));
        let record_repo = Arc::new(InMemoryRecordRepository::new(records));
        let user_repo = Arc::new(InMemoryUserRepository::new(users));
        let service = PrivilegeEvaluationService::new(
            field_repo.clone(),
            record_repo.clone(),
            user_repo.clone(),
            Arc::new(EvaluationCache::new()),
        );
        Self {
            field_repo,
            record_repo,
            user_repo,
            service,
        }
    }
}

/// Creates a fully in-memory application state for handler tests
pub fn create_test_app_state(users: Vec<User>, records: Vec<Record>) -> Arc<AppState> {
    let field_repo =
        Arc::new(InMemoryFieldRepository::new(create_test_fields())) as Arc<dyn FieldRepository>;
    let record_repo = Arc::new(InMemoryRecordRepository::new(records)) as Arc<dyn RecordRepository>;
    let user_repo = Arc::new(InMemoryUserRepository::new(users)) as Arc<dyn UserRepository>;
    let privilege_set_repo =
        Arc::new(InMemoryPrivilegeSetRepository::new()) as Arc<dyn PrivilegeSetRepository>;
    let evaluation_service = Arc::new(PrivilegeEvaluationService::new(
        field_repo.clone(),
        record_repo.clone(),
        user_repo.clone(),
        Arc::new(EvaluationCache::new()),
    ));
    Arc::new(AppState {
        field_repo,
        record_repo,
        user_repo,
        privilege_set_repo,
        evaluation_service,
    })
}
