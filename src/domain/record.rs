use crate::domain::field::SchemaId;
use serde::{Deserialize, Serialize};

pub type RecordId = i64;

/// A collection member. Field values are fetched (and memoized) separately
/// through the record repository.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub schema_id: SchemaId,
}

impl Record {
    pub fn new(id: RecordId, schema_id: SchemaId) -> Self {
        Self { id, schema_id }
    }
}
