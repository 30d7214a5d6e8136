use crate::domain::field::{FieldType, MetadataField};
use crate::domain::privilege::PrivilegeId;
use crate::domain::user::{User, UserId};
use crate::domain::value::FieldValue;
use crate::infrastructure::UserRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, instrument};

pub type RepoResult<T> = Result<T, sqlx::Error>;

#[derive(Debug)]
pub struct PostgresUserRepository {
    pub pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "SELECT user_id, user_name FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to find user");
            e
        })?;
        let Some((user_id, user_name)) = row else {
            return Ok(None);
        };
        let privileges: Vec<PrivilegeId> = sqlx::query_scalar(
            "SELECT privilege_id FROM user_privileges WHERE user_id = $1 ORDER BY privilege_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(User {
            id: user_id,
            name: user_name,
            privileges,
        }))
    }

    #[instrument(skip(self, field), fields(field_id = field.id))]
    async fn get_field_value(
        &self,
        user_id: UserId,
        field: &MetadataField,
    ) -> RepoResult<FieldValue> {
        if field.field_type.is_multi_valued() {
            let ids: Vec<i64> = sqlx::query_scalar(
                "SELECT value_id FROM user_value_ids WHERE user_id = $1 AND field_id = $2 ORDER BY value_id",
            )
            .bind(user_id)
            .bind(field.id)
            .fetch_all(&self.pool)
            .await?;
            return Ok(FieldValue::Ids(ids));
        }
        match field.field_type {
            FieldType::Date | FieldType::Timestamp => {
                let ts: Option<DateTime<Utc>> = sqlx::query_scalar(
                    "SELECT value_timestamp FROM user_values WHERE user_id = $1 AND field_id = $2",
                )
                .bind(user_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(ts.map(FieldValue::Timestamp).unwrap_or(FieldValue::Absent))
            }
            FieldType::Number => {
                let n: Option<i64> = sqlx::query_scalar(
                    "SELECT value_num FROM user_values WHERE user_id = $1 AND field_id = $2",
                )
                .bind(user_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(n.map(FieldValue::Number).unwrap_or(FieldValue::Absent))
            }
            FieldType::Flag => {
                let b: Option<bool> = sqlx::query_scalar(
                    "SELECT value_flag FROM user_values WHERE user_id = $1 AND field_id = $2",
                )
                .bind(user_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(b.map(FieldValue::Flag).unwrap_or(FieldValue::Absent))
            }
            _ => {
                let s: Option<String> = sqlx::query_scalar(
                    "SELECT value_text FROM user_values WHERE user_id = $1 AND field_id = $2",
                )
                .bind(user_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(s.map(FieldValue::Text).unwrap_or(FieldValue::Absent))
            }
        }
    }
}
