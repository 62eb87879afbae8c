use crate::error::IrError;
use crate::syntax::{Entries, replace_identifier, replace_keeping_decor};
use crate::value::{attributes_inline, attributes_table, json_to_value};
use crate::view::{
    EndpointIr, EnumIr, FieldIr, SchemaIr, SymbolKind, ValidatorIr, read_endpoint, read_enum,
    read_field, read_schema, read_validator,
};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use toml_edit::{DocumentMut, InlineTable, Item, Table, TableLike, Value};

/// One HEAD source file, kept as a lossless syntax tree.
///
/// Rendering an unedited module reproduces its input byte for byte.
#[derive(Debug, Clone)]
pub struct SchemaModule {
    name: String,
    doc: DocumentMut,
}

impl SchemaModule {
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, IrError> {
        let name = name.into();
        let doc: DocumentMut = text.parse().map_err(|e: toml_edit::TomlError| IrError::Parse {
            module: name.clone(),
            message: e.to_string(),
        })?;
        let module = Self { name, doc };
        module.check_shape()?;
        Ok(module)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &DocumentMut {
        &self.doc
    }

    pub fn render(&self) -> String {
        self.doc.to_string()
    }

    fn malformed(&self, path: impl Into<String>, expected: &'static str) -> IrError {
        IrError::Malformed {
            module: self.name.clone(),
            path: path.into(),
            expected,
        }
    }

    fn check_shape(&self) -> Result<(), IrError> {
        let root = self.doc.as_table();

        if let Some(imports) = root.get("imports") {
            let table = imports
                .as_table_like()
                .ok_or_else(|| self.malformed("imports", "a table"))?;
            for (k, v) in table.iter() {
                if v.as_str().is_none() {
                    return Err(self.malformed(format!("imports.{k}"), "a string"));
                }
            }
        }

        for kind in [SymbolKind::Schema, SymbolKind::Enum] {
            let section = kind.section();
            let Some(item) = root.get(section) else {
                continue;
            };
            let table = item
                .as_table_like()
                .ok_or_else(|| self.malformed(section, "a table"))?;
            for (name, def) in table.iter() {
                let def = def
                    .as_table_like()
                    .ok_or_else(|| self.malformed(format!("{section}.{name}"), "a table"))?;
                let nested: &[&str] = match kind {
                    SymbolKind::Schema => &["fields", "validators"],
                    SymbolKind::Enum => &["members"],
                };
                for key in nested {
                    if def.get(key).is_some_and(|i| i.as_table_like().is_none()) {
                        return Err(self.malformed(format!("{section}.{name}.{key}"), "a table"));
                    }
                }
                if kind == SymbolKind::Schema
                    && let Some(bases) = def.get("bases")
                    && bases.as_array().is_none()
                {
                    return Err(self.malformed(format!("{section}.{name}.bases"), "an array"));
                }
            }
        }

        let schemas: Vec<&str> = self.names(SymbolKind::Schema);
        for e in self.names(SymbolKind::Enum) {
            if schemas.contains(&e) {
                return Err(IrError::DuplicateSymbol {
                    name: e.to_string(),
                    first: self.name.clone(),
                    second: self.name.clone(),
                });
            }
        }

        if let Some(endpoints) = root.get("endpoints") {
            let aot = endpoints
                .as_array_of_tables()
                .ok_or_else(|| self.malformed("endpoints", "an array of tables"))?;
            for (i, t) in aot.iter().enumerate() {
                if t.get("path").and_then(Item::as_str).is_none() {
                    return Err(self.malformed(format!("endpoints[{i}].path"), "a string"));
                }
                if t.get("methods").is_none() {
                    return Err(self.malformed(format!("endpoints[{i}].methods"), "present"));
                }
            }
        }
        Ok(())
    }

    fn section(&self, kind: SymbolKind) -> Option<&dyn TableLike> {
        self.doc.as_table().get(kind.section())?.as_table_like()
    }

    fn section_mut(&mut self, kind: SymbolKind) -> Option<&mut dyn TableLike> {
        self.doc
            .as_table_mut()
            .get_mut(kind.section())?
            .as_table_like_mut()
    }

    /// Definition names of `kind`, in source order.
    pub fn names(&self, kind: SymbolKind) -> Vec<&str> {
        self.section(kind)
            .map(|t| t.iter().map(|(k, _)| k).collect())
            .unwrap_or_default()
    }

    pub fn defines(&self, kind: SymbolKind, name: &str) -> bool {
        self.section(kind).is_some_and(|t| t.contains_key(name))
    }

    pub fn imports(&self) -> BTreeMap<String, String> {
        self.doc
            .as_table()
            .get("imports")
            .and_then(Item::as_table_like)
            .map(|t| {
                t.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.to_string(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn import(&self, name: &str) -> Option<String> {
        self.imports().remove(name)
    }

    /// Set an `[imports]` entry, creating the table if needed. Returns the previous value.
    pub fn set_import(&mut self, name: &str, value: &str) -> Result<Option<String>, IrError> {
        let module = self.name.clone();
        let root = self.doc.as_table_mut();
        if !root.contains_key("imports") {
            root.insert("imports", Item::Table(Table::new()));
        }
        let mut entries = root
            .get_mut("imports")
            .and_then(Entries::of)
            .ok_or(IrError::Malformed {
                module,
                path: "imports".to_string(),
                expected: "a table",
            })?;
        let previous = entries.set_value(name, Value::from(value))?;
        Ok(previous.and_then(|p| p.as_str().map(str::to_string)))
    }

    pub fn schema(&self, name: &str) -> Option<SchemaIr> {
        read_schema(&self.name, name, self.section(SymbolKind::Schema)?.get(name)?)
    }

    pub fn schemas(&self) -> Vec<SchemaIr> {
        self.names(SymbolKind::Schema)
            .into_iter()
            .filter_map(|n| self.schema(n))
            .collect()
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<SchemaMut<'_>> {
        let item = self.section_mut(SymbolKind::Schema)?.get_mut(name)?;
        Some(SchemaMut {
            name: name.to_string(),
            item,
        })
    }

    pub fn enum_(&self, name: &str) -> Option<EnumIr> {
        read_enum(&self.name, name, self.section(SymbolKind::Enum)?.get(name)?)
    }

    pub fn enums(&self) -> Vec<EnumIr> {
        self.names(SymbolKind::Enum)
            .into_iter()
            .filter_map(|n| self.enum_(n))
            .collect()
    }

    pub fn enum_mut(&mut self, name: &str) -> Option<EnumMut<'_>> {
        let item = self.section_mut(SymbolKind::Enum)?.get_mut(name)?;
        Some(EnumMut { item })
    }

    pub fn endpoints(&self) -> Vec<EndpointIr> {
        self.doc
            .as_table()
            .get("endpoints")
            .and_then(Item::as_array_of_tables)
            .map(|aot| {
                aot.iter()
                    .enumerate()
                    .map(|(i, t)| read_endpoint(&self.name, i, t))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn endpoint_mut(&mut self, index: usize) -> Option<EndpointMut<'_>> {
        let table = self
            .doc
            .as_table_mut()
            .get_mut("endpoints")?
            .as_array_of_tables_mut()?
            .get_mut(index)?;
        Some(EndpointMut { table })
    }

    /// Rename a definition key, keeping its position and comments.
    pub(crate) fn rename_definition(&mut self, kind: SymbolKind, old: &str, new: &str) -> bool {
        self.section_mut(kind)
            .is_some_and(|t| crate::syntax::rename_key(t, old, new))
    }

    /// Rewrite every reference to `old` (bases, field types, endpoint
    /// request/response models). Returns how many values changed.
    pub(crate) fn retarget_references(&mut self, old: &str, new: &str) -> usize {
        let mut changed = 0;

        if let Some(schemas) = self.section_mut(SymbolKind::Schema) {
            for (_, schema) in schemas.iter_mut() {
                let Some(schema) = schema.as_table_like_mut() else {
                    continue;
                };
                if let Some(bases) = schema.get_mut("bases").and_then(Item::as_array_mut) {
                    for i in 0..bases.len() {
                        let Some(current) = bases.get(i).and_then(Value::as_str) else {
                            continue;
                        };
                        if let Some(updated) = replace_identifier(current, old, new) {
                            bases.replace(i, updated);
                            changed += 1;
                        }
                    }
                }
                if let Some(fields) = schema.get_mut("fields").and_then(Item::as_table_like_mut) {
                    for (_, field) in fields.iter_mut() {
                        let hit = if field.is_str() {
                            retarget_str(field, old, new)
                        } else {
                            field
                                .as_table_like_mut()
                                .and_then(|attrs| attrs.get_mut("type"))
                                .is_some_and(|slot| retarget_str(slot, old, new))
                        };
                        if hit {
                            changed += 1;
                        }
                    }
                }
            }
        }

        if let Some(aot) = self
            .doc
            .as_table_mut()
            .get_mut("endpoints")
            .and_then(Item::as_array_of_tables_mut)
        {
            for table in aot.iter_mut() {
                for key in ["request", "response"] {
                    if table
                        .get_mut(key)
                        .is_some_and(|slot| retarget_str(slot, old, new))
                    {
                        changed += 1;
                    }
                }
            }
        }
        changed
    }
}

fn retarget_str(item: &mut Item, old: &str, new: &str) -> bool {
    let Some(value) = item.as_value_mut() else {
        return false;
    };
    let Some(updated) = value.as_str().and_then(|s| replace_identifier(s, old, new)) else {
        return false;
    };
    replace_keeping_decor(value, Value::from(updated));
    true
}

fn missing(path: String) -> IrError {
    IrError::UnknownSymbol(path)
}

/// Mutable handle on one schema definition.
pub struct SchemaMut<'a> {
    name: String,
    item: &'a mut Item,
}

impl SchemaMut<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self, module: &str) -> Option<SchemaIr> {
        read_schema(module, &self.name, &*self.item)
    }

    fn child(&self, key: &str) -> Option<&Item> {
        self.item.as_table_like()?.get(key)
    }

    fn child_entries(&mut self, key: &str) -> Option<Entries<'_>> {
        Entries::of(self.item.as_table_like_mut()?.get_mut(key)?)
    }

    /// The `fields`/`validators` container, created on first use in the
    /// same style as the schema itself.
    fn container(&mut self, key: &str) -> Result<Entries<'_>, IrError> {
        let inline_parent = self.item.is_inline_table();
        let schema = self.name.clone();
        let table = self
            .item
            .as_table_like_mut()
            .ok_or_else(|| missing(schema.clone()))?;
        if !table.contains_key(key) {
            let fresh = if inline_parent {
                Item::Value(Value::InlineTable(InlineTable::new()))
            } else {
                Item::Table(Table::new())
            };
            table.insert(key, fresh);
            if inline_parent {
                table.fmt();
            }
        }
        table
            .get_mut(key)
            .and_then(Entries::of)
            .ok_or_else(|| missing(format!("{schema}.{key}")))
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.child("fields")
            .and_then(Item::as_table_like)
            .is_some_and(|t| t.contains_key(field))
    }

    pub fn field(&self, field: &str) -> Option<FieldIr> {
        read_field(field, self.child("fields")?.as_table_like()?.get(field)?)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.child("fields")
            .and_then(Item::as_table_like)
            .map(|t| t.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Append a field. Uses a `[...fields.name]` sub-table when sibling fields
    /// are written that way, an inline table otherwise.
    pub fn insert_field(
        &mut self,
        field: &str,
        attributes: &BTreeMap<String, Json>,
    ) -> Result<(), IrError> {
        let mut fields = self.container("fields")?;
        let item = if fields.uses_subtables() {
            Item::Table(attributes_table(attributes)?)
        } else {
            Item::Value(Value::InlineTable(attributes_inline(attributes)?))
        };
        fields.insert_item(field, item);
        Ok(())
    }

    pub fn remove_field(&mut self, field: &str) -> bool {
        self.child_entries("fields")
            .is_some_and(|mut t| t.remove(field).is_some())
    }

    pub fn rename_field(&mut self, old: &str, new: &str) -> bool {
        self.child_entries("fields")
            .is_some_and(|mut t| t.rename(old, new))
    }

    /// Set one attribute of a field; a `name = "type"` shorthand field is
    /// widened to an inline table when a non-`type` attribute is added.
    pub fn set_field_attribute(
        &mut self,
        field: &str,
        attribute: &str,
        value: &Json,
    ) -> Result<Option<Json>, IrError> {
        let schema = self.name.clone();
        let mut fields = self
            .child_entries("fields")
            .ok_or_else(|| missing(format!("{schema}.{field}")))?;
        let item = fields
            .get_item_mut(field)
            .ok_or_else(|| missing(format!("{schema}.{field}")))?;

        if let Some(shorthand) = item.as_value_mut().filter(|v| v.is_str()) {
            let previous = Json::String(shorthand.as_str().unwrap_or_default().to_string());
            if attribute == "type" {
                replace_keeping_decor(shorthand, json_to_value(value)?);
                return Ok(Some(previous));
            }
            let mut widened = InlineTable::new();
            widened.insert("type", json_to_value(&previous)?);
            widened.insert(attribute, json_to_value(value)?);
            widened.fmt();
            replace_keeping_decor(shorthand, Value::InlineTable(widened));
            return Ok(None);
        }

        let mut attrs = Entries::of(item).ok_or_else(|| missing(format!("{schema}.{field}")))?;
        attrs.set(attribute, value)
    }

    pub fn remove_field_attribute(&mut self, field: &str, attribute: &str) -> Option<Json> {
        let mut fields = self.child_entries("fields")?;
        let item = fields.get_item_mut(field)?;
        if let Some(shorthand) = item.as_value_mut().filter(|v| v.is_str()) {
            if attribute != "type" {
                return None;
            }
            let previous = Json::String(shorthand.as_str().unwrap_or_default().to_string());
            replace_keeping_decor(shorthand, Value::InlineTable(InlineTable::new()));
            return Some(previous);
        }
        Entries::of(item)?.remove(attribute)
    }

    pub fn validator(&self, validator: &str) -> Option<ValidatorIr> {
        read_validator(
            validator,
            self.child("validators")?.as_table_like()?.get(validator)?,
        )
    }

    pub fn has_validator(&self, validator: &str) -> bool {
        self.child("validators")
            .and_then(Item::as_table_like)
            .is_some_and(|t| t.contains_key(validator))
    }

    pub fn insert_validator(
        &mut self,
        validator: &str,
        attributes: &BTreeMap<String, Json>,
    ) -> Result<(), IrError> {
        let mut validators = self.container("validators")?;
        let item = if validators.uses_subtables() {
            Item::Table(attributes_table(attributes)?)
        } else {
            Item::Value(Value::InlineTable(attributes_inline(attributes)?))
        };
        validators.insert_item(validator, item);
        Ok(())
    }

    pub fn remove_validator(&mut self, validator: &str) -> bool {
        self.child_entries("validators")
            .is_some_and(|mut t| t.remove(validator).is_some())
    }

    /// Rename `old` to `new` inside every validator's `fields` list.
    pub fn rename_field_in_validators(&mut self, old: &str, new: &str) -> usize {
        let Some(mut validators) = self.child_entries("validators") else {
            return 0;
        };
        let mut changed = 0;
        for name in validators.keys() {
            let Some(list) = validators
                .get_item_mut(&name)
                .and_then(Item::as_table_like_mut)
                .and_then(|t| t.get_mut("fields"))
                .and_then(Item::as_array_mut)
            else {
                continue;
            };
            for i in 0..list.len() {
                if list.get(i).and_then(Value::as_str) == Some(old) {
                    list.replace(i, new);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Drop `field` from every validator's `fields` list. Validators left
    /// without fields are removed; their names are returned.
    pub fn prune_field_from_validators(&mut self, field: &str) -> Vec<String> {
        let Some(mut validators) = self.child_entries("validators") else {
            return Vec::new();
        };
        let mut emptied = Vec::new();
        for name in validators.keys() {
            let Some(item) = validators.get_item_mut(&name) else {
                continue;
            };
            let Some(list) = item
                .as_table_like_mut()
                .and_then(|t| t.get_mut("fields"))
                .and_then(Item::as_array_mut)
            else {
                continue;
            };
            let before = list.len();
            list.retain(|v| v.as_str() != Some(field));
            if list.len() == before {
                continue;
            }
            if list.is_empty() {
                emptied.push(name);
            } else {
                list.fmt();
            }
        }
        for name in &emptied {
            validators.remove(name);
        }
        emptied
    }
}

/// Mutable handle on one enum definition.
pub struct EnumMut<'a> {
    item: &'a mut Item,
}

impl EnumMut<'_> {
    pub fn has_member(&self, member: &str) -> bool {
        self.item
            .as_table_like()
            .and_then(|t| t.get("members"))
            .and_then(Item::as_table_like)
            .is_some_and(|m| m.contains_key(member))
    }

    pub fn insert_member(&mut self, member: &str, value: &Json) -> Result<(), IrError> {
        let inline_parent = self.item.is_inline_table();
        let Some(table) = self.item.as_table_like_mut() else {
            return Err(missing(member.to_string()));
        };
        if !table.contains_key("members") {
            let fresh = if inline_parent {
                Item::Value(Value::InlineTable(InlineTable::new()))
            } else {
                Item::Table(Table::new())
            };
            table.insert("members", fresh);
            if inline_parent {
                table.fmt();
            }
        }
        let mut members = table
            .get_mut("members")
            .and_then(Entries::of)
            .ok_or_else(|| missing(member.to_string()))?;
        members.set(member, value)?;
        Ok(())
    }

    pub fn remove_member(&mut self, member: &str) -> bool {
        self.item
            .as_table_like_mut()
            .and_then(|t| t.get_mut("members"))
            .and_then(Entries::of)
            .is_some_and(|mut m| m.remove(member).is_some())
    }
}

/// Mutable handle on one `[[endpoints]]` entry.
pub struct EndpointMut<'a> {
    table: &'a mut Table,
}

impl EndpointMut<'_> {
    pub fn get(&self, attribute: &str) -> Option<Json> {
        self.table
            .get(attribute)
            .and_then(crate::value::item_to_json)
    }

    pub fn set(&mut self, attribute: &str, value: &Json) -> Result<Option<Json>, IrError> {
        Entries::table(&mut *self.table).set(attribute, value)
    }

    pub fn remove(&mut self, attribute: &str) -> Option<Json> {
        Entries::table(&mut *self.table).remove(attribute)
    }

    pub fn exists(&self) -> bool {
        self.table
            .get("exists")
            .and_then(Item::as_bool)
            .unwrap_or(true)
    }

    /// `exists = false` hides the route from HEAD; existing routes carry no key.
    pub fn set_exists(&mut self, exists: bool) {
        let mut entries = Entries::table(&mut *self.table);
        if exists {
            entries.remove("exists");
        } else {
            entries.insert_item("exists", Item::Value(Value::from(false)));
        }
    }
}
