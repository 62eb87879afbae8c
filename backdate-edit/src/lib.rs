//! Reverse-apply engine for backdate instructions.
//!
//! Responsibilities:
//! - Check each instruction's precondition against the working copy.
//! - Turn the working copy into its predecessor version, one instruction at a time.
//! - Render unified diffs between two sets of module sources.

pub mod error;
mod patch;

pub use error::InstructionError;
pub use patch::render_patch;

use backdate_ir::{EndpointIr, HeadIr, SchemaMut};
use backdate_types::instruction::{ENDPOINT_ATTRIBUTES, FIELD_ATTRIBUTES};
use backdate_types::{EndpointSelector, Instruction};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Apply one instruction in reverse to `head`.
///
/// On error the working copy may be partially edited; callers abandon it.
pub fn apply_instruction(head: &mut HeadIr, instruction: &Instruction) -> Result<(), InstructionError> {
    debug!(kind = instruction.kind(), target = %instruction.target(), "reverse-apply");
    match instruction {
        Instruction::FieldExisted {
            schema,
            field,
            attributes,
        } => field_existed(head, schema, field, attributes),
        Instruction::FieldDidntExist { schema, field } => field_didnt_exist(head, schema, field),
        Instruction::FieldHad {
            schema,
            field,
            attribute,
            value,
        } => field_had(head, schema, field, attribute, value),
        Instruction::FieldDidntHave {
            schema,
            field,
            attributes,
        } => field_didnt_have(head, schema, field, attributes),
        Instruction::SchemaRenamed { schema, name } => schema_renamed(head, schema, name),
        Instruction::SchemaFieldRenamed {
            schema,
            field,
            name,
        } => schema_field_renamed(head, schema, field, name),
        Instruction::EnumHad { enum_name, members } => enum_had(head, enum_name, members),
        Instruction::EnumDidntHave { enum_name, members } => {
            enum_didnt_have(head, enum_name, members)
        }
        Instruction::EndpointExisted {
            path,
            methods,
            func,
        } => endpoint_existence(head, &selector(path, methods, func), true),
        Instruction::EndpointDidntExist {
            path,
            methods,
            func,
        } => endpoint_existence(head, &selector(path, methods, func), false),
        Instruction::EndpointHad {
            path,
            methods,
            func,
            attribute,
            value,
        } => endpoint_had(head, &selector(path, methods, func), attribute, value),
        Instruction::ValidatorExisted {
            schema,
            validator,
            attributes,
        } => validator_existed(head, schema, validator, attributes),
        Instruction::ValidatorDidntExist { schema, validator } => {
            validator_didnt_exist(head, schema, validator)
        }
        Instruction::ModuleImportHad {
            module,
            name,
            value,
        } => module_import_had(head, module, name, value),
    }
}

fn selector(path: &str, methods: &BTreeSet<String>, func: &Option<String>) -> EndpointSelector {
    let sel = EndpointSelector::new(path, methods);
    match func {
        Some(f) => sel.with_func(f.as_str()),
        None => sel,
    }
}

fn schema_mut<'a>(head: &'a mut HeadIr, schema: &str) -> Result<SchemaMut<'a>, InstructionError> {
    head.schema_mut(schema)
        .ok_or_else(|| InstructionError::UnknownSchema(schema.to_string()))
}

fn check_field_attribute(schema: &str, field: &str, attribute: &str) -> Result<(), InstructionError> {
    if FIELD_ATTRIBUTES.contains(&attribute) {
        Ok(())
    } else {
        Err(InstructionError::UnknownAttribute {
            target: format!("field `{schema}.{field}`"),
            attribute: attribute.to_string(),
        })
    }
}

fn field_existed(
    head: &mut HeadIr,
    schema: &str,
    field: &str,
    attributes: &BTreeMap<String, Value>,
) -> Result<(), InstructionError> {
    for attribute in attributes.keys() {
        check_field_attribute(schema, field, attribute)?;
    }
    let mut s = schema_mut(head, schema)?;
    if s.has_field(field) {
        return Err(InstructionError::DuplicateField {
            schema: schema.to_string(),
            field: field.to_string(),
        });
    }
    s.insert_field(field, attributes)?;
    Ok(())
}

fn field_didnt_exist(head: &mut HeadIr, schema: &str, field: &str) -> Result<(), InstructionError> {
    let mut s = schema_mut(head, schema)?;
    if !s.remove_field(field) {
        return Err(InstructionError::UnknownField {
            schema: schema.to_string(),
            field: field.to_string(),
        });
    }
    let dropped = s.prune_field_from_validators(field);
    if !dropped.is_empty() {
        debug!(schema, field, validators = ?dropped, "dropped validators left without fields");
    }
    Ok(())
}

fn field_had(
    head: &mut HeadIr,
    schema: &str,
    field: &str,
    attribute: &str,
    value: &Value,
) -> Result<(), InstructionError> {
    check_field_attribute(schema, field, attribute)?;
    let mut s = schema_mut(head, schema)?;
    let current = s.field(field).ok_or_else(|| InstructionError::UnknownField {
        schema: schema.to_string(),
        field: field.to_string(),
    })?;
    if current.attributes.get(attribute) == Some(value) {
        return Err(InstructionError::AlreadyInState {
            target: format!("field `{schema}.{field}`"),
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
    }
    s.set_field_attribute(field, attribute, value)?;
    Ok(())
}

fn field_didnt_have(
    head: &mut HeadIr,
    schema: &str,
    field: &str,
    attributes: &[String],
) -> Result<(), InstructionError> {
    for attribute in attributes {
        check_field_attribute(schema, field, attribute)?;
    }
    let mut s = schema_mut(head, schema)?;
    let current = s.field(field).ok_or_else(|| InstructionError::UnknownField {
        schema: schema.to_string(),
        field: field.to_string(),
    })?;
    if let Some(missing) = attributes
        .iter()
        .find(|a| !current.attributes.contains_key(a.as_str()))
    {
        return Err(InstructionError::MissingAttribute {
            target: format!("field `{schema}.{field}`"),
            attribute: missing.clone(),
        });
    }
    for attribute in attributes {
        s.remove_field_attribute(field, attribute);
    }
    Ok(())
}

fn schema_renamed(head: &mut HeadIr, schema: &str, name: &str) -> Result<(), InstructionError> {
    if head.symbol(schema).is_none() {
        return Err(InstructionError::UnknownSchema(schema.to_string()));
    }
    if schema == name {
        return Err(InstructionError::AlreadyInState {
            target: format!("schema `{schema}`"),
            attribute: "name".to_string(),
            value: name.to_string(),
        });
    }
    let references = head.rename_symbol(schema, name)?;
    debug!(schema, name, references, "schema renamed");
    Ok(())
}

fn schema_field_renamed(
    head: &mut HeadIr,
    schema: &str,
    field: &str,
    name: &str,
) -> Result<(), InstructionError> {
    let mut s = schema_mut(head, schema)?;
    if !s.has_field(field) {
        return Err(InstructionError::UnknownField {
            schema: schema.to_string(),
            field: field.to_string(),
        });
    }
    if s.has_field(name) {
        return Err(InstructionError::DuplicateField {
            schema: schema.to_string(),
            field: name.to_string(),
        });
    }
    s.rename_field(field, name);
    s.rename_field_in_validators(field, name);
    Ok(())
}

fn enum_had(
    head: &mut HeadIr,
    enum_name: &str,
    members: &BTreeMap<String, Value>,
) -> Result<(), InstructionError> {
    let mut e = head
        .enum_mut(enum_name)
        .ok_or_else(|| InstructionError::UnknownEnum(enum_name.to_string()))?;
    if let Some(member) = members.keys().find(|m| e.has_member(m)) {
        return Err(InstructionError::DuplicateEnumMember {
            enum_name: enum_name.to_string(),
            member: member.clone(),
        });
    }
    for (member, value) in members {
        e.insert_member(member, value)?;
    }
    Ok(())
}

fn enum_didnt_have(
    head: &mut HeadIr,
    enum_name: &str,
    members: &[String],
) -> Result<(), InstructionError> {
    let mut e = head
        .enum_mut(enum_name)
        .ok_or_else(|| InstructionError::UnknownEnum(enum_name.to_string()))?;
    if let Some(member) = members.iter().find(|m| !e.has_member(m)) {
        return Err(InstructionError::UnknownEnumMember {
            enum_name: enum_name.to_string(),
            member: member.clone(),
        });
    }
    for member in members {
        e.remove_member(member);
    }
    Ok(())
}

/// The single endpoint `selector` names, whether or not it is currently served.
fn select_endpoint(head: &HeadIr, selector: &EndpointSelector) -> Result<EndpointIr, InstructionError> {
    let mut candidates: Vec<EndpointIr> = head
        .endpoints()
        .into_iter()
        .filter(|e| e.matches(selector))
        .collect();
    match candidates.len() {
        0 => Err(InstructionError::UnknownEndpoint(selector.to_string())),
        1 => Ok(candidates.remove(0)),
        count => Err(InstructionError::AmbiguousEndpoint {
            route: selector.to_string(),
            count,
        }),
    }
}

/// After an edit, a live endpoint must be the only live one on each of its routes.
fn ensure_route_unique(head: &HeadIr, module: &str, index: usize) -> Result<(), InstructionError> {
    let endpoints = head.endpoints();
    let Some(edited) = endpoints
        .iter()
        .find(|e| e.module == module && e.index == index)
    else {
        return Ok(());
    };
    if !edited.exists {
        return Ok(());
    }
    let count = endpoints
        .iter()
        .filter(|e| e.exists && e.shares_route_with(edited))
        .count();
    if count > 1 {
        let route = EndpointSelector::new(edited.path.as_str(), &edited.methods);
        return Err(InstructionError::AmbiguousEndpoint {
            route: route.to_string(),
            count,
        });
    }
    Ok(())
}

fn endpoint_existence(
    head: &mut HeadIr,
    selector: &EndpointSelector,
    existed: bool,
) -> Result<(), InstructionError> {
    let target = select_endpoint(head, selector)?;
    if target.exists == existed {
        return Err(if existed {
            InstructionError::EndpointAlreadyExists(selector.to_string())
        } else {
            InstructionError::EndpointAlreadyAbsent(selector.to_string())
        });
    }
    if let Some(mut ep) = head.endpoint_mut(&target.module, target.index) {
        ep.set_exists(existed);
    }
    ensure_route_unique(head, &target.module, target.index)
}

fn endpoint_had(
    head: &mut HeadIr,
    selector: &EndpointSelector,
    attribute: &str,
    value: &Value,
) -> Result<(), InstructionError> {
    if !ENDPOINT_ATTRIBUTES.contains(&attribute) {
        return Err(InstructionError::UnknownAttribute {
            target: format!("endpoint {selector}"),
            attribute: attribute.to_string(),
        });
    }
    let expected = match attribute {
        "path" | "func" | "request" | "response" if !value.is_string() => Some("a string"),
        "methods" | "tags"
            if !value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)) =>
        {
            Some("an array of strings")
        }
        "status_code" if !value.as_u64().is_some_and(|c| (100..600).contains(&c)) => {
            Some("an HTTP status code")
        }
        _ => None,
    };
    if let Some(expected) = expected {
        return Err(InstructionError::InvalidValue {
            target: format!("endpoint {selector}"),
            attribute: attribute.to_string(),
            expected,
        });
    }

    let target = select_endpoint(head, selector)?;
    if target.attributes.get(attribute) == Some(value) {
        return Err(InstructionError::AlreadyInState {
            target: format!("endpoint {selector}"),
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
    }
    if let Some(mut ep) = head.endpoint_mut(&target.module, target.index) {
        ep.set(attribute, value)?;
    }
    ensure_route_unique(head, &target.module, target.index)
}

fn validator_existed(
    head: &mut HeadIr,
    schema: &str,
    validator: &str,
    attributes: &BTreeMap<String, Value>,
) -> Result<(), InstructionError> {
    let mut s = schema_mut(head, schema)?;
    if s.has_validator(validator) {
        return Err(InstructionError::DuplicateValidator {
            schema: schema.to_string(),
            validator: validator.to_string(),
        });
    }
    s.insert_validator(validator, attributes)?;
    Ok(())
}

fn validator_didnt_exist(
    head: &mut HeadIr,
    schema: &str,
    validator: &str,
) -> Result<(), InstructionError> {
    let mut s = schema_mut(head, schema)?;
    if !s.remove_validator(validator) {
        return Err(InstructionError::UnknownValidator {
            schema: schema.to_string(),
            validator: validator.to_string(),
        });
    }
    Ok(())
}

fn module_import_had(
    head: &mut HeadIr,
    module: &str,
    name: &str,
    value: &str,
) -> Result<(), InstructionError> {
    let m = head
        .module_mut(module)
        .ok_or_else(|| InstructionError::UnknownModule(module.to_string()))?;
    if m.import(name).as_deref() == Some(value) {
        return Err(InstructionError::ImportAlreadyPresent {
            module: module.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
    }
    m.set_import(name, value)?;
    Ok(())
}
