//! Human-authorable XML form of privilege sets.
//!
//! The vocabulary mirrors the authoring operations: `<AddPrivilege>` (flag
//! constant name or numeric id), `<AddCondition>` with `<Field>`, optional
//! `<Operator>` and `<Value>` children, `<AddSubset>` wrapping a nested
//! `<PrivilegeSet>`, and `<UsesAndLogic>`. Unknown tags and unresolvable
//! field names are fatal parse errors.

use crate::domain::condition::{ComparisonOperator, ConditionValue, FieldCondition};
use crate::domain::error::Error;
use crate::domain::field::MetadataSchema;
use crate::domain::privilege::{privilege_id_for_name, privilege_name_for_id};
use crate::domain::privilege_set::{PrivilegeSet, PrivilegeSetItem};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

/// Parses the XML authoring format into a privilege set, resolving field
/// names against the given schema snapshot.
pub fn privilege_set_from_xml(xml: &str, schema: &MetadataSchema) -> Result<PrivilegeSet, Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"PrivilegeSet" => {
                return parse_set_body(&mut reader, schema);
            }
            Event::Decl(_) | Event::Comment(_) | Event::Text(_) | Event::PI(_) => {}
            Event::Eof => return Err(Error::Xml("missing <PrivilegeSet> root".to_string())),
            _ => return Err(Error::Xml("unexpected content before root".to_string())),
        }
    }
}

/// Serializes a privilege set to the XML authoring format. Field ids are
/// rendered as names where the schema still knows them.
pub fn privilege_set_to_xml(set: &PrivilegeSet, schema: &MetadataSchema) -> Result<String, Error> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_set(&mut writer, set, schema)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::Xml(format!("non-UTF-8 output: {e}")))
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::Xml(e.to_string())
}

fn io_error(e: std::io::Error) -> Error {
    Error::Xml(e.to_string())
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn parse_set_body(reader: &mut Reader<&[u8]>, schema: &MetadataSchema) -> Result<PrivilegeSet, Error> {
    let mut set = PrivilegeSet::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"AddPrivilege" => {
                    let text = read_text(reader, "AddPrivilege")?;
                    set.add_privilege(parse_privilege(&text)?);
                }
                b"UsesAndLogic" => {
                    let text = read_text(reader, "UsesAndLogic")?;
                    match text.as_str() {
                        "TRUE" => set.set_uses_and_logic(true),
                        "FALSE" => set.set_uses_and_logic(false),
                        other => {
                            return Err(Error::Xml(format!(
                                "UsesAndLogic expects TRUE or FALSE, got \"{other}\""
                            )));
                        }
                    }
                }
                b"AddCondition" => {
                    let condition = parse_condition_body(reader, schema)?;
                    set.add_condition(condition.field_id, condition.value, condition.operator);
                }
                b"AddSubset" => {
                    set.add_subset(parse_subset_body(reader, schema)?);
                }
                other => return Err(Error::UnknownXmlTag(tag_name(other))),
            },
            Event::Empty(e) => {
                return Err(Error::Xml(format!("empty <{}> element", tag_name(e.name().as_ref()))));
            }
            Event::End(e) if e.name().as_ref() == b"PrivilegeSet" => return Ok(set),
            Event::Comment(_) | Event::Text(_) => {}
            Event::Eof => return Err(Error::Xml("unterminated <PrivilegeSet>".to_string())),
            _ => return Err(Error::Xml("unexpected content in <PrivilegeSet>".to_string())),
        }
    }
}

fn parse_subset_body(reader: &mut Reader<&[u8]>, schema: &MetadataSchema) -> Result<PrivilegeSet, Error> {
    let mut subset: Option<PrivilegeSet> = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) if e.name().as_ref() == b"PrivilegeSet" => {
                if subset.is_some() {
                    return Err(Error::Xml(
                        "<AddSubset> holds more than one <PrivilegeSet>".to_string(),
                    ));
                }
                subset = Some(parse_set_body(reader, schema)?);
            }
            Event::Start(e) => return Err(Error::UnknownXmlTag(tag_name(e.name().as_ref()))),
            Event::End(e) if e.name().as_ref() == b"AddSubset" => {
                return subset
                    .ok_or_else(|| Error::Xml("<AddSubset> missing <PrivilegeSet>".to_string()));
            }
            Event::Comment(_) | Event::Text(_) => {}
            Event::Eof => return Err(Error::Xml("unterminated <AddSubset>".to_string())),
            _ => return Err(Error::Xml("unexpected content in <AddSubset>".to_string())),
        }
    }
}

fn parse_condition_body(
    reader: &mut Reader<&[u8]>,
    schema: &MetadataSchema,
) -> Result<FieldCondition, Error> {
    let mut field_id = None;
    let mut operator = ComparisonOperator::Equal;
    let mut value = ConditionValue::Absent;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Field" => {
                    let text = read_text(reader, "Field")?;
                    field_id = Some(resolve_field(&text, schema)?);
                }
                b"Operator" => {
                    let text = read_text(reader, "Operator")?;
                    operator = text.parse::<ComparisonOperator>().map_err(Error::Xml)?;
                }
                b"Value" => {
                    let text = read_text(reader, "Value")?;
                    value = ConditionValue::from_authoring_text(&text);
                }
                other => return Err(Error::UnknownXmlTag(tag_name(other))),
            },
            Event::End(e) if e.name().as_ref() == b"AddCondition" => {
                let field_id = field_id.ok_or_else(|| {
                    Error::Xml("<AddCondition> missing required <Field>".to_string())
                })?;
                return Ok(FieldCondition::new(field_id, operator, value));
            }
            Event::Comment(_) | Event::Text(_) => {}
            Event::Eof => return Err(Error::Xml("unterminated <AddCondition>".to_string())),
            _ => return Err(Error::Xml("unexpected content in <AddCondition>".to_string())),
        }
    }
}

fn read_text(reader: &mut Reader<&[u8]>, tag: &str) -> Result<String, Error> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::End(e) if e.name().as_ref() == tag.as_bytes() => return Ok(text),
            Event::Comment(_) => {}
            Event::Eof => return Err(Error::Xml(format!("unterminated <{tag}>"))),
            _ => return Err(Error::Xml(format!("unexpected content in <{tag}>"))),
        }
    }
}

fn parse_privilege(text: &str) -> Result<crate::domain::privilege::PrivilegeId, Error> {
    if let Some(id) = privilege_id_for_name(text) {
        return Ok(id);
    }
    text.parse()
        .map_err(|_| Error::UnknownPrivilege(text.to_string()))
}

fn resolve_field(text: &str, schema: &MetadataSchema) -> Result<i64, Error> {
    if let Some(field) = schema.field_by_name(text) {
        return Ok(field.id);
    }
    // Numeric ids are accepted for fields addressed directly.
    if let Ok(id) = text.parse::<i64>() {
        if schema.field(id).is_some() {
            return Ok(id);
        }
    }
    Err(Error::UnknownField(text.to_string()))
}

fn write_set(
    writer: &mut Writer<Vec<u8>>,
    set: &PrivilegeSet,
    schema: &MetadataSchema,
) -> Result<(), Error> {
    writer
        .write_event(Event::Start(BytesStart::new("PrivilegeSet")))
        .map_err(io_error)?;
    if set.uses_and_logic() {
        write_text_element(writer, "UsesAndLogic", "TRUE")?;
    }
    for item in set.items() {
        match item {
            PrivilegeSetItem::Privilege(id) => {
                let rendered = privilege_name_for_id(*id)
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string());
                write_text_element(writer, "AddPrivilege", &rendered)?;
            }
            PrivilegeSetItem::Condition(c) => {
                writer
                    .write_event(Event::Start(BytesStart::new("AddCondition")))
                    .map_err(io_error)?;
                let field_name = schema
                    .field(c.field_id)
                    .map(|f| f.name.clone())
                    .unwrap_or_else(|| c.field_id.to_string());
                write_text_element(writer, "Field", &field_name)?;
                write_text_element(writer, "Operator", &c.operator.to_string())?;
                write_text_element(writer, "Value", &c.value.to_authoring_text())?;
                writer
                    .write_event(Event::End(BytesEnd::new("AddCondition")))
                    .map_err(io_error)?;
            }
            PrivilegeSetItem::Subset(s) => {
                writer
                    .write_event(Event::Start(BytesStart::new("AddSubset")))
                    .map_err(io_error)?;
                write_set(writer, s, schema)?;
                writer
                    .write_event(Event::End(BytesEnd::new("AddSubset")))
                    .map_err(io_error)?;
            }
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new("PrivilegeSet")))
        .map_err(io_error)?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), Error> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(io_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(io_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(io_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{DEFAULT_SCHEMA_ID, FieldType, MetadataField};
    use crate::domain::privilege::{PRIV_SYSADMIN, PRIV_USERADMIN};

    fn schema() -> MetadataSchema {
        MetadataSchema::new(vec![
            MetadataField::new(4, "Category", FieldType::Option, DEFAULT_SCHEMA_ID),
            MetadataField::new(
                8,
                "Date Of Record Release",
                FieldType::Timestamp,
                DEFAULT_SCHEMA_ID,
            ),
        ])
    }

    #[test]
    fn test_parse_full_vocabulary() {
        let xml = r#"
            <PrivilegeSet>
              <UsesAndLogic>TRUE</UsesAndLogic>
              <AddPrivilege>PRIV_SYSADMIN</AddPrivilege>
              <AddCondition>
                <Field>Category</Field>
                <Operator>!=</Operator>
                <Value>7</Value>
              </AddCondition>
              <AddSubset>
                <PrivilegeSet>
                  <AddPrivilege>PRIV_USERADMIN</AddPrivilege>
                  <AddCondition>
                    <Field>Date Of Record Release</Field>
                    <Operator>&lt;=</Operator>
                    <Value>NULL</Value>
                  </AddCondition>
                </PrivilegeSet>
              </AddSubset>
            </PrivilegeSet>"#;
        let set = privilege_set_from_xml(xml, &schema()).unwrap();
        assert!(set.uses_and_logic());
        assert!(set.includes_privilege(PRIV_SYSADMIN));
        assert_eq!(set.conditions(false).len(), 1);
        assert_eq!(
            set.conditions(false)[0],
            FieldCondition::new(4, ComparisonOperator::NotEqual, ConditionValue::Number(7))
        );
        let subsets = set.subsets();
        assert_eq!(subsets.len(), 1);
        assert!(subsets[0].includes_privilege(PRIV_USERADMIN));
        assert_eq!(
            subsets[0].conditions(false)[0],
            FieldCondition::new(8, ComparisonOperator::LessOrEqual, ConditionValue::Absent)
        );
    }

    #[test]
    fn test_condition_defaults() {
        let xml = "<PrivilegeSet><AddCondition><Field>Category</Field></AddCondition></PrivilegeSet>";
        let set = privilege_set_from_xml(xml, &schema()).unwrap();
        assert_eq!(
            set.conditions(false)[0],
            FieldCondition::new(4, ComparisonOperator::Equal, ConditionValue::Absent)
        );
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let xml = "<PrivilegeSet><GrantEverything/></PrivilegeSet>";
        assert!(matches!(
            privilege_set_from_xml(xml, &schema()),
            Err(Error::Xml(_)) | Err(Error::UnknownXmlTag(_))
        ));
        let xml = "<PrivilegeSet><GrantEverything>1</GrantEverything></PrivilegeSet>";
        assert!(matches!(
            privilege_set_from_xml(xml, &schema()),
            Err(Error::UnknownXmlTag(tag)) if tag == "GrantEverything"
        ));
    }

    #[test]
    fn test_unresolvable_field_is_fatal() {
        let xml = "<PrivilegeSet><AddCondition><Field>Nonesuch</Field></AddCondition></PrivilegeSet>";
        assert!(matches!(
            privilege_set_from_xml(xml, &schema()),
            Err(Error::UnknownField(name)) if name == "Nonesuch"
        ));
    }

    #[test]
    fn test_unknown_privilege_name_is_fatal() {
        let xml = "<PrivilegeSet><AddPrivilege>PRIV_OMNIPOTENT</AddPrivilege></PrivilegeSet>";
        assert!(matches!(
            privilege_set_from_xml(xml, &schema()),
            Err(Error::UnknownPrivilege(_))
        ));
    }

    #[test]
    fn test_missing_field_parameter_is_fatal() {
        let xml = "<PrivilegeSet><AddCondition><Operator>==</Operator></AddCondition></PrivilegeSet>";
        assert!(privilege_set_from_xml(xml, &schema()).is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut subset = PrivilegeSet::new();
        subset.add_privilege(PRIV_USERADMIN);
        subset.add_condition(
            8,
            ConditionValue::Text("3 days ago".to_string()),
            ComparisonOperator::GreaterOrEqual,
        );

        let mut set = PrivilegeSet::new();
        set.set_uses_and_logic(true);
        set.add_privilege(PRIV_SYSADMIN);
        set.add_condition(4, ConditionValue::Number(7), ComparisonOperator::Equal);
        set.add_subset(subset);

        let xml = privilege_set_to_xml(&set, &schema()).unwrap();
        let restored = privilege_set_from_xml(&xml, &schema()).unwrap();
        assert_eq!(restored, set);
    }
}
