use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub type FieldId = i64;
pub type SchemaId = i64;

/// The default (resource) metadata schema.
pub const DEFAULT_SCHEMA_ID: SchemaId = 0;
/// The user metadata schema. Fields in this schema are evaluated against the
/// acting user rather than the record under consideration.
pub const USER_SCHEMA_ID: SchemaId = 1;

/// Metadata field types of the collections platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Paragraph,
    Number,
    Date,
    Timestamp,
    Tree,
    ControlledName,
    Option,
    Flag,
    User,
    Url,
    File,
}

impl FieldType {
    /// True if values of this type normalize to a list of associated ids
    /// rather than a single scalar.
    pub fn is_multi_valued(self) -> bool {
        matches!(
            self,
            FieldType::Tree | FieldType::ControlledName | FieldType::Option | FieldType::User
        )
    }

    /// True if the type can appear in a privilege set condition at all.
    pub fn supports_conditions(self) -> bool {
        matches!(
            self,
            FieldType::Number
                | FieldType::Date
                | FieldType::Timestamp
                | FieldType::Option
                | FieldType::Flag
                | FieldType::User
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "Text",
            FieldType::Paragraph => "Paragraph",
            FieldType::Number => "Number",
            FieldType::Date => "Date",
            FieldType::Timestamp => "Timestamp",
            FieldType::Tree => "Tree",
            FieldType::ControlledName => "ControlledName",
            FieldType::Option => "Option",
            FieldType::Flag => "Flag",
            FieldType::User => "User",
            FieldType::Url => "Url",
            FieldType::File => "File",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Text" => Ok(FieldType::Text),
            "Paragraph" => Ok(FieldType::Paragraph),
            "Number" => Ok(FieldType::Number),
            "Date" => Ok(FieldType::Date),
            "Timestamp" => Ok(FieldType::Timestamp),
            "Tree" => Ok(FieldType::Tree),
            "ControlledName" => Ok(FieldType::ControlledName),
            "Option" => Ok(FieldType::Option),
            "Flag" => Ok(FieldType::Flag),
            "User" => Ok(FieldType::User),
            "Url" => Ok(FieldType::Url),
            "File" => Ok(FieldType::File),
            other => Err(format!("unknown field type: {other}")),
        }
    }
}

/// A metadata field definition, as far as privilege evaluation needs one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataField {
    pub id: FieldId,
    pub name: String,
    pub field_type: FieldType,
    pub schema_id: SchemaId,
}

impl MetadataField {
    pub fn new(id: FieldId, name: &str, field_type: FieldType, schema_id: SchemaId) -> Self {
        Self {
            id,
            name: name.to_string(),
            field_type,
            schema_id,
        }
    }
}

/// In-memory snapshot of the metadata field definitions, used where field
/// names must be resolved synchronously (XML authoring format).
#[derive(Debug, Clone, Default)]
pub struct MetadataSchema {
    by_id: HashMap<FieldId, MetadataField>,
}

impl MetadataSchema {
    pub fn new(fields: Vec<MetadataField>) -> Self {
        let by_id = fields.into_iter().map(|f| (f.id, f)).collect();
        Self { by_id }
    }

    pub fn field(&self, id: FieldId) -> Option<&MetadataField> {
        self.by_id.get(&id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&MetadataField> {
        self.by_id.values().find(|f| f.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &MetadataField> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trip() {
        for t in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Date,
            FieldType::Timestamp,
            FieldType::Option,
            FieldType::Flag,
            FieldType::User,
        ] {
            assert_eq!(t.to_string().parse::<FieldType>().unwrap(), t);
        }
        assert!("Bogus".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_condition_support() {
        assert!(FieldType::Date.supports_conditions());
        assert!(FieldType::User.supports_conditions());
        assert!(!FieldType::Text.supports_conditions());
        assert!(!FieldType::File.supports_conditions());
    }

    #[test]
    fn test_schema_lookup() {
        let schema = MetadataSchema::new(vec![
            MetadataField::new(4, "Category", FieldType::Option, DEFAULT_SCHEMA_ID),
            MetadataField::new(8, "Date Of Record Release", FieldType::Timestamp, DEFAULT_SCHEMA_ID),
        ]);
        assert_eq!(schema.field(4).unwrap().name, "Category");
        assert_eq!(schema.field_by_name("Date Of Record Release").unwrap().id, 8);
        assert!(schema.field(99).is_none());
        assert!(schema.field_by_name("Nope").is_none());
    }
}
