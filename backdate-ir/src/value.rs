//! Conversions between instruction payloads (`serde_json`) and syntax values (`toml_edit`).

use crate::error::IrError;
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;
use toml_edit::{Array, InlineTable, Item, Table, Value};

/// Read a syntax value as JSON. Datetimes become strings.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::String(s) => Json::String(s.value().clone()),
        Value::Integer(i) => Json::Number(Number::from(*i.value())),
        Value::Float(f) => Number::from_f64(*f.value())
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Boolean(b) => Json::Bool(*b.value()),
        Value::Datetime(dt) => Json::String(dt.value().to_string()),
        Value::Array(arr) => Json::Array(arr.iter().map(value_to_json).collect()),
        Value::InlineTable(t) => {
            let mut map = Map::new();
            for (k, v) in t.iter() {
                map.insert(k.to_string(), value_to_json(v));
            }
            Json::Object(map)
        }
    }
}

/// Read any item as JSON; `None` for empty items.
pub fn item_to_json(item: &Item) -> Option<Json> {
    match item {
        Item::None => None,
        Item::Value(v) => Some(value_to_json(v)),
        Item::Table(t) => Some(table_to_json(t)),
        Item::ArrayOfTables(aot) => Some(Json::Array(aot.iter().map(table_to_json).collect())),
    }
}

fn table_to_json(table: &Table) -> Json {
    let mut map = Map::new();
    for (k, item) in table.iter() {
        if let Some(v) = item_to_json(item) {
            map.insert(k.to_string(), v);
        }
    }
    Json::Object(map)
}

/// Convert an instruction payload into a syntax value.
///
/// TOML has no null, so `null` (at any depth) is rejected.
pub fn json_to_value(json: &Json) -> Result<Value, IrError> {
    match json {
        Json::Null => Err(IrError::UnsupportedValue {
            what: "null".to_string(),
        }),
        Json::Bool(b) => Ok(Value::from(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f))
            } else {
                Err(IrError::UnsupportedValue {
                    what: format!("number {n}"),
                })
            }
        }
        Json::String(s) => Ok(Value::from(s.as_str())),
        Json::Array(items) => {
            let mut arr = Array::new();
            for item in items {
                arr.push(json_to_value(item)?);
            }
            Ok(Value::Array(arr))
        }
        Json::Object(map) => {
            let mut table = InlineTable::new();
            for (k, v) in map {
                table.insert(k.as_str(), json_to_value(v)?);
            }
            Ok(Value::InlineTable(table))
        }
    }
}

/// Build an inline table from attributes, `type` first and the rest in key order.
pub fn attributes_inline(attributes: &BTreeMap<String, Json>) -> Result<InlineTable, IrError> {
    let mut table = InlineTable::new();
    for (k, v) in ordered_attributes(attributes) {
        table.insert(k, json_to_value(v)?);
    }
    Ok(table)
}

/// Build a standard table from attributes, `type` first and the rest in key order.
pub fn attributes_table(attributes: &BTreeMap<String, Json>) -> Result<Table, IrError> {
    let mut table = Table::new();
    for (k, v) in ordered_attributes(attributes) {
        table.insert(k, Item::Value(json_to_value(v)?));
    }
    Ok(table)
}

fn ordered_attributes(attributes: &BTreeMap<String, Json>) -> Vec<(&str, &Json)> {
    let mut out: Vec<(&str, &Json)> = Vec::with_capacity(attributes.len());
    if let Some(ty) = attributes.get("type") {
        out.push(("type", ty));
    }
    out.extend(
        attributes
            .iter()
            .filter(|(k, _)| k.as_str() != "type")
            .map(|(k, v)| (k.as_str(), v)),
    );
    out
}
