use crate::domain::condition::{ComparisonOperator, ConditionValue, FieldCondition};
use crate::domain::error::Error;
use crate::domain::field::FieldId;
use crate::domain::privilege::PrivilegeId;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

/// How the children of a privilege set combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetLogic {
    And,
    #[default]
    Or,
}

impl SetLogic {
    /// Truth value assigned to a condition that cannot actually be evaluated
    /// (missing field, cross-schema field). Vacuously satisfied under AND so
    /// the remaining children still decide; vacuously unsatisfied under OR so
    /// it cannot grant access on its own. Preserved as a long-standing
    /// behavioral contract of the platform.
    pub fn vacuous_value(self) -> bool {
        self == SetLogic::And
    }
}

impl fmt::Display for SetLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetLogic::And => write!(f, "AND"),
            SetLogic::Or => write!(f, "OR"),
        }
    }
}

impl FromStr for SetLogic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(SetLogic::And),
            "OR" => Ok(SetLogic::Or),
            other => Err(format!("unknown logic: {other}")),
        }
    }
}

/// One child of a privilege set: a bare privilege flag, a field-value
/// condition, or a nested subset. Structural equality across the three kinds
/// drives all add/remove deduplication.
#[derive(Debug, Clone, PartialEq)]
pub enum PrivilegeSetItem {
    Privilege(PrivilegeId),
    Condition(FieldCondition),
    Subset(PrivilegeSet),
}

/// An access-control policy expressed as a boolean tree of privileges,
/// conditions, and nested subsets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrivilegeSet {
    items: Vec<PrivilegeSetItem>,
    logic: SetLogic,
}

impl PrivilegeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from a flat list of privilege flags, OR logic.
    pub fn from_privileges(privileges: &[PrivilegeId]) -> Self {
        let mut set = Self::new();
        for &id in privileges {
            set.add_privilege(id);
        }
        set
    }

    pub fn items(&self) -> &[PrivilegeSetItem] {
        &self.items
    }

    pub fn uses_and_logic(&self) -> bool {
        self.logic == SetLogic::And
    }

    pub fn set_uses_and_logic(&mut self, and: bool) {
        self.logic = if and { SetLogic::And } else { SetLogic::Or };
    }

    pub fn logic(&self) -> SetLogic {
        self.logic
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of direct children.
    pub fn component_count(&self) -> usize {
        self.items.len()
    }

    /// Adds a bare privilege flag. Idempotent.
    pub fn add_privilege(&mut self, id: PrivilegeId) {
        if !self.includes_privilege(id) {
            self.items.push(PrivilegeSetItem::Privilege(id));
        }
    }

    /// Removes a bare privilege flag. Removing a non-member is a no-op.
    pub fn remove_privilege(&mut self, id: PrivilegeId) {
        self.items
            .retain(|item| !matches!(item, PrivilegeSetItem::Privilege(p) if *p == id));
    }

    pub fn includes_privilege(&self, id: PrivilegeId) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, PrivilegeSetItem::Privilege(p) if *p == id))
    }

    /// Bare privilege flags of this node, in insertion order.
    pub fn privileges(&self) -> Vec<PrivilegeId> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PrivilegeSetItem::Privilege(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Appends a condition unless an identical one is already present.
    /// Returns whether it was added.
    pub fn add_condition(
        &mut self,
        field_id: FieldId,
        value: ConditionValue,
        operator: ComparisonOperator,
    ) -> bool {
        let condition = FieldCondition::new(field_id, operator, value);
        if self
            .items
            .iter()
            .any(|item| matches!(item, PrivilegeSetItem::Condition(c) if *c == condition))
        {
            return false;
        }
        self.items.push(PrivilegeSetItem::Condition(condition));
        true
    }

    /// Removes a matching condition, optionally recursing into subsets.
    /// Returns whether anything was removed.
    pub fn remove_condition(
        &mut self,
        field_id: FieldId,
        value: &ConditionValue,
        operator: ComparisonOperator,
        include_subsets: bool,
    ) -> bool {
        let target = FieldCondition::new(field_id, operator, value.clone());
        let before = self.items.len();
        self.items
            .retain(|item| !matches!(item, PrivilegeSetItem::Condition(c) if *c == target));
        let mut removed = self.items.len() != before;
        if include_subsets {
            for item in &mut self.items {
                if let PrivilegeSetItem::Subset(subset) = item {
                    removed |= subset.remove_condition(field_id, value, operator, true);
                }
            }
        }
        removed
    }

    /// Conditions of this node; with `recursive`, those of all subsets too.
    pub fn conditions(&self, recursive: bool) -> Vec<FieldCondition> {
        let mut found = Vec::new();
        for item in &self.items {
            match item {
                PrivilegeSetItem::Condition(c) => found.push(c.clone()),
                PrivilegeSetItem::Subset(s) if recursive => {
                    found.extend(s.conditions(true));
                }
                _ => {}
            }
        }
        found
    }

    /// Appends a nested subset unless a structurally equal one is present.
    pub fn add_subset(&mut self, subset: PrivilegeSet) {
        if !self
            .items
            .iter()
            .any(|item| matches!(item, PrivilegeSetItem::Subset(s) if *s == subset))
        {
            self.items.push(PrivilegeSetItem::Subset(subset));
        }
    }

    pub fn subsets(&self) -> Vec<&PrivilegeSet> {
        self.items
            .iter()
            .filter_map(|item| match item {
                PrivilegeSetItem::Subset(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// True if any condition anywhere in the tree references the field.
    /// Used when deciding whether dropping a metadata field would change
    /// stored policies.
    pub fn mentions_field(&self, field_id: FieldId) -> bool {
        self.items.iter().any(|item| match item {
            PrivilegeSetItem::Condition(c) => c.field_id == field_id,
            PrivilegeSetItem::Subset(s) => s.mentions_field(field_id),
            PrivilegeSetItem::Privilege(_) => false,
        })
    }

    /// Scrubs every condition on the field from the whole tree. Returns
    /// whether anything was removed.
    pub fn remove_field_conditions(&mut self, field_id: FieldId) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| !matches!(item, PrivilegeSetItem::Condition(c) if c.field_id == field_id));
        let mut removed = self.items.len() != before;
        for item in &mut self.items {
            if let PrivilegeSetItem::Subset(subset) = item {
                removed |= subset.remove_field_conditions(field_id);
            }
        }
        removed
    }

    /// Serializes the tree to its opaque snapshot form. Subsets are wrapped
    /// as nested opaque strings so the snapshot reconstructs to full depth.
    pub fn data(&self) -> String {
        let privileges: Vec<Value> = self
            .items
            .iter()
            .map(|item| match item {
                PrivilegeSetItem::Privilege(id) => json!(id),
                PrivilegeSetItem::Condition(c) => json!({
                    "FieldId": c.field_id,
                    "Operator": c.operator.to_string(),
                    "Value": condition_value_to_json(&c.value),
                }),
                PrivilegeSetItem::Subset(s) => json!({ "SUBSET": s.data() }),
            })
            .collect();
        json!({
            "Privileges": privileges,
            "Logic": self.logic.to_string(),
        })
        .to_string()
    }

    /// Reconstructs a tree from an opaque snapshot, validating the blob is
    /// well formed.
    pub fn from_data(data: &str) -> Result<Self, Error> {
        let root: Value = serde_json::from_str(data)
            .map_err(|e| Error::MalformedData(format!("not valid data: {e}")))?;
        let object = root
            .as_object()
            .ok_or_else(|| Error::MalformedData("snapshot is not an object".to_string()))?;

        let logic = object
            .get("Logic")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedData("missing Logic".to_string()))?
            .parse::<SetLogic>()
            .map_err(Error::MalformedData)?;

        let entries = object
            .get("Privileges")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::MalformedData("missing Privileges list".to_string()))?;

        let mut set = PrivilegeSet {
            items: Vec::with_capacity(entries.len()),
            logic,
        };
        for entry in entries {
            set.items.push(parse_snapshot_entry(entry)?);
        }
        Ok(set)
    }
}

fn condition_value_to_json(value: &ConditionValue) -> Value {
    match value {
        ConditionValue::Absent => Value::Null,
        ConditionValue::Number(n) => json!(n),
        ConditionValue::Text(s) => json!(s),
    }
}

fn condition_value_from_json(value: &Value) -> Result<ConditionValue, Error> {
    match value {
        Value::Null => Ok(ConditionValue::Absent),
        Value::Number(n) => n
            .as_i64()
            .map(ConditionValue::Number)
            .ok_or_else(|| Error::MalformedData(format!("non-integer condition value: {n}"))),
        Value::String(s) => Ok(ConditionValue::Text(s.clone())),
        other => Err(Error::MalformedData(format!(
            "unusable condition value: {other}"
        ))),
    }
}

fn parse_snapshot_entry(entry: &Value) -> Result<PrivilegeSetItem, Error> {
    if let Some(id) = entry.as_i64() {
        let id = PrivilegeId::try_from(id)
            .map_err(|_| Error::MalformedData(format!("privilege id out of range: {id}")))?;
        return Ok(PrivilegeSetItem::Privilege(id));
    }
    let object = entry
        .as_object()
        .ok_or_else(|| Error::MalformedData(format!("unrecognized entry: {entry}")))?;

    if let Some(nested) = object.get("SUBSET") {
        let blob = nested
            .as_str()
            .ok_or_else(|| Error::MalformedData("subset entry is not a string".to_string()))?;
        return Ok(PrivilegeSetItem::Subset(PrivilegeSet::from_data(blob)?));
    }

    let field_id = object
        .get("FieldId")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::MalformedData("condition missing FieldId".to_string()))?;
    let operator = object
        .get("Operator")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedData("condition missing Operator".to_string()))?
        .parse::<ComparisonOperator>()
        .map_err(Error::MalformedData)?;
    let value = condition_value_from_json(object.get("Value").unwrap_or(&Value::Null))?;
    Ok(PrivilegeSetItem::Condition(FieldCondition::new(
        field_id, operator, value,
    )))
}
