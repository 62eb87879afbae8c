//! Owned, read-only snapshots of the symbols in a module.
//!
//! Views are cheap to build and never borrow the syntax tree, so callers can
//! inspect a [`crate::HeadIr`] and then edit it without fighting the borrow checker.

use crate::value::item_to_json;
use backdate_types::EndpointSelector;
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};
use toml_edit::{Item, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKind {
    Schema,
    Enum,
}

impl SymbolKind {
    /// Top-level table holding definitions of this kind.
    pub fn section(self) -> &'static str {
        match self {
            SymbolKind::Schema => "schemas",
            SymbolKind::Enum => "enums",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldIr {
    pub name: String,
    pub attributes: BTreeMap<String, Json>,
}

impl FieldIr {
    pub fn type_expr(&self) -> Option<&str> {
        self.attributes.get("type").and_then(Json::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorIr {
    pub name: String,
    /// Fields the validator runs against, in declaration order.
    pub fields: Vec<String>,
    pub attributes: BTreeMap<String, Json>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaIr {
    pub name: String,
    pub module: String,
    pub doc: Option<String>,
    pub bases: Vec<String>,
    pub fields: Vec<FieldIr>,
    pub validators: Vec<ValidatorIr>,
}

impl SchemaIr {
    pub fn field(&self, name: &str) -> Option<&FieldIr> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn validator(&self, name: &str) -> Option<&ValidatorIr> {
        self.validators.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumIr {
    pub name: String,
    pub module: String,
    pub members: Vec<(String, Json)>,
}

impl EnumIr {
    pub fn has_member(&self, name: &str) -> bool {
        self.members.iter().any(|(m, _)| m == name)
    }
}

/// One `[[endpoints]]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointIr {
    pub module: String,
    /// Position within the module's `[[endpoints]]` array.
    pub index: usize,
    pub path: String,
    pub methods: BTreeSet<String>,
    pub func: Option<String>,
    pub request: Option<String>,
    pub response: Option<String>,
    pub status_code: Option<u16>,
    /// `false` when the route is defined in HEAD but only served by older versions.
    pub exists: bool,
    pub attributes: BTreeMap<String, Json>,
}

impl EndpointIr {
    /// Path equal, selector methods a subset of ours, and func equal when given.
    pub fn matches(&self, selector: &EndpointSelector) -> bool {
        self.path == selector.path
            && selector.methods.is_subset(&self.methods)
            && selector
                .func
                .as_ref()
                .is_none_or(|f| self.func.as_ref() == Some(f))
    }

    pub fn shares_route_with(&self, other: &EndpointIr) -> bool {
        self.path == other.path && !self.methods.is_disjoint(&other.methods)
    }
}

pub(crate) fn read_field(name: &str, item: &Item) -> Option<FieldIr> {
    let attributes = if let Some(ty) = item.as_str() {
        BTreeMap::from([("type".to_string(), Json::String(ty.to_string()))])
    } else {
        read_attributes(item)?
    };
    Some(FieldIr {
        name: name.to_string(),
        attributes,
    })
}

pub(crate) fn read_attributes(item: &Item) -> Option<BTreeMap<String, Json>> {
    let table = item.as_table_like()?;
    Some(
        table
            .iter()
            .filter_map(|(k, v)| item_to_json(v).map(|j| (k.to_string(), j)))
            .collect(),
    )
}

pub(crate) fn read_string_list(item: Option<&Item>) -> Vec<String> {
    let Some(item) = item else {
        return Vec::new();
    };
    if let Some(s) = item.as_str() {
        return vec![s.to_string()];
    }
    item.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn read_validator(name: &str, item: &Item) -> Option<ValidatorIr> {
    let table = item.as_table_like()?;
    let fields = read_string_list(table.get("fields"));
    let attributes = read_attributes(item)?;
    Some(ValidatorIr {
        name: name.to_string(),
        fields,
        attributes,
    })
}

pub(crate) fn read_schema(module: &str, name: &str, item: &Item) -> Option<SchemaIr> {
    let table = item.as_table_like()?;
    let doc = table.get("doc").and_then(Item::as_str).map(str::to_string);
    let bases = read_string_list(table.get("bases"));

    let fields = table
        .get("fields")
        .and_then(Item::as_table_like)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(k, v)| read_field(k, v))
                .collect()
        })
        .unwrap_or_default();

    let validators = table
        .get("validators")
        .and_then(Item::as_table_like)
        .map(|vals| {
            vals.iter()
                .filter_map(|(k, v)| read_validator(k, v))
                .collect()
        })
        .unwrap_or_default();

    Some(SchemaIr {
        name: name.to_string(),
        module: module.to_string(),
        doc,
        bases,
        fields,
        validators,
    })
}

pub(crate) fn read_enum(module: &str, name: &str, item: &Item) -> Option<EnumIr> {
    let table = item.as_table_like()?;
    let members = table
        .get("members")
        .and_then(Item::as_table_like)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| item_to_json(v).map(|j| (k.to_string(), j)))
                .collect()
        })
        .unwrap_or_default();
    Some(EnumIr {
        name: name.to_string(),
        module: module.to_string(),
        members,
    })
}

pub(crate) fn read_endpoint(module: &str, index: usize, table: &Table) -> EndpointIr {
    let get_str = |key: &str| table.get(key).and_then(Item::as_str).map(str::to_string);
    let attributes = table
        .iter()
        .filter_map(|(k, v)| item_to_json(v).map(|j| (k.to_string(), j)))
        .collect();

    EndpointIr {
        module: module.to_string(),
        index,
        path: get_str("path").unwrap_or_default(),
        methods: read_string_list(table.get("methods"))
            .into_iter()
            .map(|m| m.to_ascii_uppercase())
            .collect(),
        func: get_str("func"),
        request: get_str("request"),
        response: get_str("response"),
        status_code: table
            .get("status_code")
            .and_then(Item::as_integer)
            .and_then(|c| u16::try_from(c).ok()),
        exists: table.get("exists").and_then(Item::as_bool).unwrap_or(true),
        attributes,
    }
}
