use crate::domain::condition::ComparisonOperator;
use crate::domain::field::{MetadataField, SchemaId};
use crate::domain::record::{Record, RecordId};
use crate::domain::value::FieldValue;
use crate::infrastructure::{RecordRepository, ScalarTarget};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, instrument};

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Record storage: one row per record plus normalized value tables — scalar
/// values in `record_values`, set-valued associations (option terms, users)
/// in `record_value_ids`.
#[derive(Debug)]
pub struct PostgresRecordRepository {
    pub pool: PgPool,
}

impl PostgresRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn scalar_column(target: &ScalarTarget) -> &'static str {
        match target {
            ScalarTarget::Number(_) => "value_num",
            ScalarTarget::Timestamp(_) => "value_timestamp",
            ScalarTarget::Flag(_) => "value_flag",
        }
    }
}

#[async_trait]
impl RecordRepository for PostgresRecordRepository {
    #[instrument(skip(self))]
    async fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            "SELECT record_id, schema_id FROM records WHERE record_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to get record");
            e
        })?;
        Ok(row.map(|(record_id, schema_id)| Record::new(record_id, schema_id)))
    }

    #[instrument(skip(self, field), fields(field_id = field.id))]
    async fn get_field_value(
        &self,
        record_id: RecordId,
        field: &MetadataField,
    ) -> RepoResult<FieldValue> {
        if field.field_type.is_multi_valued() {
            let ids: Vec<i64> = sqlx::query_scalar(
                "SELECT value_id FROM record_value_ids WHERE record_id = $1 AND field_id = $2 ORDER BY value_id",
            )
            .bind(record_id)
            .bind(field.id)
            .fetch_all(&self.pool)
            .await?;
            return Ok(FieldValue::Ids(ids));
        }

        use crate::domain::field::FieldType;
        match field.field_type {
            FieldType::Date | FieldType::Timestamp => {
                let ts: Option<DateTime<Utc>> = sqlx::query_scalar(
                    "SELECT value_timestamp FROM record_values WHERE record_id = $1 AND field_id = $2",
                )
                .bind(record_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(ts.map(FieldValue::Timestamp).unwrap_or(FieldValue::Absent))
            }
            FieldType::Number => {
                let n: Option<i64> = sqlx::query_scalar(
                    "SELECT value_num FROM record_values WHERE record_id = $1 AND field_id = $2",
                )
                .bind(record_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(n.map(FieldValue::Number).unwrap_or(FieldValue::Absent))
            }
            FieldType::Flag => {
                let b: Option<bool> = sqlx::query_scalar(
                    "SELECT value_flag FROM record_values WHERE record_id = $1 AND field_id = $2",
                )
                .bind(record_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(b.map(FieldValue::Flag).unwrap_or(FieldValue::Absent))
            }
            _ => {
                let s: Option<String> = sqlx::query_scalar(
                    "SELECT value_text FROM record_values WHERE record_id = $1 AND field_id = $2",
                )
                .bind(record_id)
                .bind(field.id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
                Ok(s.map(FieldValue::Text).unwrap_or(FieldValue::Absent))
            }
        }
    }

    #[instrument(skip(self, field), fields(field_id = field.id))]
    async fn count_matching_records(
        &self,
        field: &MetadataField,
        operator: ComparisonOperator,
        target: ScalarTarget,
    ) -> RepoResult<i64> {
        // Operator and column come from closed enums; only the target value
        // is bound.
        let sql = format!(
            "SELECT COUNT(*) FROM record_values rv \
             JOIN records r ON r.record_id = rv.record_id \
             WHERE rv.field_id = $1 AND rv.{column} {op} $2",
            column = Self::scalar_column(&target),
            op = operator.sql_symbol(),
        );
        let query = sqlx::query_scalar::<_, i64>(&sql).bind(field.id);
        let count = match target {
            ScalarTarget::Number(n) => query.bind(n).fetch_one(&self.pool).await,
            ScalarTarget::Timestamp(ts) => query.bind(ts).fetch_one(&self.pool).await,
            ScalarTarget::Flag(b) => query.bind(b).fetch_one(&self.pool).await,
        };
        count.map_err(|e| {
            error!(error = %e, "Failed to count matching records");
            e
        })
    }

    #[instrument(skip(self, field), fields(field_id = field.id))]
    async fn count_records_with_value_id(
        &self,
        field: &MetadataField,
        value_id: i64,
    ) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT record_id) FROM record_value_ids WHERE field_id = $1 AND value_id = $2",
        )
        .bind(field.id)
        .bind(value_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to count associated records");
            e
        })
    }

    #[instrument(skip(self))]
    async fn total_record_count(&self, schema_id: SchemaId) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM records WHERE schema_id = $1")
            .bind(schema_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to count records");
                e
            })
    }
}
