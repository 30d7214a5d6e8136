use crate::domain::field::{FieldId, FieldType, MetadataField};
use crate::infrastructure::FieldRepository;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, instrument};

pub type RepoResult<T> = Result<T, sqlx::Error>;

#[derive(Debug)]
pub struct PostgresFieldRepository {
    pub pool: PgPool,
}

impl PostgresFieldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_field(row: (i64, String, String, i64)) -> RepoResult<MetadataField> {
    let (id, name, type_name, schema_id) = row;
    let field_type = type_name
        .parse::<FieldType>()
        .map_err(|e| sqlx::Error::Decode(e.into()))?;
    Ok(MetadataField {
        id,
        name,
        field_type,
        schema_id,
    })
}

#[async_trait]
impl FieldRepository for PostgresFieldRepository {
    #[instrument(skip(self))]
    async fn get_field(&self, id: FieldId) -> RepoResult<Option<MetadataField>> {
        let row = sqlx::query_as::<_, (i64, String, String, i64)>(
            "SELECT field_id, field_name, field_type, schema_id FROM metadata_fields WHERE field_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to get metadata field");
            e
        })?;
        row.map(row_to_field).transpose()
    }

    #[instrument(skip(self))]
    async fn list_fields(&self) -> RepoResult<Vec<MetadataField>> {
        let rows = sqlx::query_as::<_, (i64, String, String, i64)>(
            "SELECT field_id, field_name, field_type, schema_id FROM metadata_fields ORDER BY field_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list metadata fields");
            e
        })?;
        rows.into_iter().map(row_to_field).collect()
    }
}
