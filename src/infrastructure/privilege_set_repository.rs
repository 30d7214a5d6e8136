use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, instrument};

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// A named privilege set persisted in its opaque snapshot form. The platform
/// stores one of these per schema permission slot (viewing, authoring,
/// editing) and for saved-search style policies.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct StoredPrivilegeSet {
    pub id: String,
    pub name: String,
    pub data: String,
}

#[async_trait]
pub trait PrivilegeSetRepository: Send + Sync {
    async fn save(&self, set: StoredPrivilegeSet) -> RepoResult<StoredPrivilegeSet>;
    async fn get(&self, id: &str) -> RepoResult<Option<StoredPrivilegeSet>>;
    async fn list(&self) -> RepoResult<Vec<StoredPrivilegeSet>>;
    async fn update(&self, set: StoredPrivilegeSet) -> RepoResult<bool>;
    async fn delete(&self, id: &str) -> RepoResult<bool>;
}

#[derive(Debug)]
pub struct PostgresPrivilegeSetRepository {
    pub pool: PgPool,
}

impl PostgresPrivilegeSetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrivilegeSetRepository for PostgresPrivilegeSetRepository {
    #[instrument(skip(self, set), fields(set_name = %set.name))]
    async fn save(&self, set: StoredPrivilegeSet) -> RepoResult<StoredPrivilegeSet> {
        sqlx::query(
            "INSERT INTO privilege_sets (set_id, set_name, set_data) VALUES ($1, $2, $3)",
        )
        .bind(&set.id)
        .bind(&set.name)
        .bind(&set.data)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save privilege set");
            e
        })?;
        Ok(set)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> RepoResult<Option<StoredPrivilegeSet>> {
        sqlx::query_as::<_, StoredPrivilegeSet>(
            "SELECT set_id AS id, set_name AS name, set_data AS data FROM privilege_sets WHERE set_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to get privilege set");
            e
        })
    }

    #[instrument(skip(self))]
    async fn list(&self) -> RepoResult<Vec<StoredPrivilegeSet>> {
        sqlx::query_as::<_, StoredPrivilegeSet>(
            "SELECT set_id AS id, set_name AS name, set_data AS data FROM privilege_sets ORDER BY set_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list privilege sets");
            e
        })
    }

    #[instrument(skip(self, set), fields(set_id = %set.id))]
    async fn update(&self, set: StoredPrivilegeSet) -> RepoResult<bool> {
        let result =
            sqlx::query("UPDATE privilege_sets SET set_name = $2, set_data = $3 WHERE set_id = $1")
                .bind(&set.id)
                .bind(&set.name)
                .bind(&set.data)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to update privilege set");
                    e
                })?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM privilege_sets WHERE set_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to delete privilege set");
                e
            })?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct InMemoryPrivilegeSetRepository {
    pub sets: std::sync::Mutex<Vec<StoredPrivilegeSet>>,
}

impl InMemoryPrivilegeSetRepository {
    pub fn new() -> Self {
        Self {
            sets: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for InMemoryPrivilegeSetRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrivilegeSetRepository for InMemoryPrivilegeSetRepository {
    async fn save(&self, set: StoredPrivilegeSet) -> RepoResult<StoredPrivilegeSet> {
        self.sets.lock().unwrap().push(set.clone());
        Ok(set)
    }

    async fn get(&self, id: &str) -> RepoResult<Option<StoredPrivilegeSet>> {
        Ok(self.sets.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self) -> RepoResult<Vec<StoredPrivilegeSet>> {
        Ok(self.sets.lock().unwrap().clone())
    }

    async fn update(&self, set: StoredPrivilegeSet) -> RepoResult<bool> {
        let mut sets = self.sets.lock().unwrap();
        match sets.iter_mut().find(|s| s.id == set.id) {
            Some(existing) => {
                *existing = set;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &str) -> RepoResult<bool> {
        let mut sets = self.sets.lock().unwrap();
        let before = sets.len();
        sets.retain(|s| s.id != id);
        Ok(sets.len() != before)
    }
}
