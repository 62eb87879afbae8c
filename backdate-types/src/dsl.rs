//! Fluent constructors for [`Instruction`]s.
//!
//! ```
//! use backdate_types::dsl::{endpoint, schema};
//!
//! let changes = vec![
//!     schema("User").field("addresses").had_name("address"),
//!     schema("User").field("addresses").had("type", "str"),
//!     endpoint("/users/{id}", ["DELETE"]).didnt_exist(),
//! ];
//! assert_eq!(changes[0].kind(), "schema_field_renamed");
//! ```

use crate::instruction::{EndpointSelector, Instruction};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn schema(name: impl Into<String>) -> SchemaInstructions {
    SchemaInstructions {
        schema: name.into(),
    }
}

pub fn enum_(name: impl Into<String>) -> EnumInstructions {
    EnumInstructions {
        enum_name: name.into(),
    }
}

pub fn endpoint<I, S>(path: impl Into<String>, methods: I) -> EndpointInstructions
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    EndpointInstructions {
        selector: EndpointSelector::new(path, methods),
    }
}

pub fn module(name: impl Into<String>) -> ModuleInstructions {
    ModuleInstructions {
        module: name.into(),
    }
}

#[derive(Debug, Clone)]
pub struct SchemaInstructions {
    schema: String,
}

impl SchemaInstructions {
    pub fn field(&self, name: impl Into<String>) -> FieldInstructions {
        FieldInstructions {
            schema: self.schema.clone(),
            field: name.into(),
        }
    }

    pub fn validator(&self, name: impl Into<String>) -> ValidatorInstructions {
        ValidatorInstructions {
            schema: self.schema.clone(),
            validator: name.into(),
        }
    }

    /// The schema was called `name` in the older version.
    pub fn had_name(&self, name: impl Into<String>) -> Instruction {
        Instruction::SchemaRenamed {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldInstructions {
    schema: String,
    field: String,
}

impl FieldInstructions {
    pub fn existed_as(self, type_expr: impl Into<String>) -> Instruction {
        let mut attributes = BTreeMap::new();
        attributes.insert("type".to_string(), Value::String(type_expr.into()));
        self.existed_with(attributes)
    }

    pub fn existed_with(self, attributes: BTreeMap<String, Value>) -> Instruction {
        Instruction::FieldExisted {
            schema: self.schema,
            field: self.field,
            attributes,
        }
    }

    pub fn didnt_exist(self) -> Instruction {
        Instruction::FieldDidntExist {
            schema: self.schema,
            field: self.field,
        }
    }

    pub fn had(self, attribute: impl Into<String>, value: impl Into<Value>) -> Instruction {
        Instruction::FieldHad {
            schema: self.schema,
            field: self.field,
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn had_name(self, name: impl Into<String>) -> Instruction {
        Instruction::SchemaFieldRenamed {
            schema: self.schema,
            field: self.field,
            name: name.into(),
        }
    }

    pub fn didnt_have<I, S>(self, attributes: I) -> Instruction
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Instruction::FieldDidntHave {
            schema: self.schema,
            field: self.field,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatorInstructions {
    schema: String,
    validator: String,
}

impl ValidatorInstructions {
    /// The validator existed, checking `fields`.
    pub fn existed_for<I, S>(self, fields: I) -> Instruction
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<Value> = fields
            .into_iter()
            .map(|f| Value::String(f.into()))
            .collect();
        let mut attributes = BTreeMap::new();
        attributes.insert("fields".to_string(), Value::Array(fields));
        self.existed_with(attributes)
    }

    pub fn existed_with(self, attributes: BTreeMap<String, Value>) -> Instruction {
        Instruction::ValidatorExisted {
            schema: self.schema,
            validator: self.validator,
            attributes,
        }
    }

    pub fn didnt_exist(self) -> Instruction {
        Instruction::ValidatorDidntExist {
            schema: self.schema,
            validator: self.validator,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumInstructions {
    enum_name: String,
}

impl EnumInstructions {
    pub fn had<I, K, V>(&self, members: I) -> Instruction
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Instruction::EnumHad {
            enum_name: self.enum_name.clone(),
            members: members
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn didnt_have<I, S>(&self, members: I) -> Instruction
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Instruction::EnumDidntHave {
            enum_name: self.enum_name.clone(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// The enum was called `name` in the older version.
    pub fn had_name(&self, name: impl Into<String>) -> Instruction {
        Instruction::SchemaRenamed {
            schema: self.enum_name.clone(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EndpointInstructions {
    selector: EndpointSelector,
}

impl EndpointInstructions {
    /// Disambiguate endpoints sharing a path and method set.
    pub fn func(mut self, func: impl Into<String>) -> Self {
        self.selector.func = Some(func.into());
        self
    }

    pub fn existed(self) -> Instruction {
        let EndpointSelector {
            path,
            methods,
            func,
        } = self.selector;
        Instruction::EndpointExisted {
            path,
            methods,
            func,
        }
    }

    pub fn didnt_exist(self) -> Instruction {
        let EndpointSelector {
            path,
            methods,
            func,
        } = self.selector;
        Instruction::EndpointDidntExist {
            path,
            methods,
            func,
        }
    }

    pub fn had(self, attribute: impl Into<String>, value: impl Into<Value>) -> Instruction {
        let EndpointSelector {
            path,
            methods,
            func,
        } = self.selector;
        Instruction::EndpointHad {
            path,
            methods,
            func,
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleInstructions {
    module: String,
}

impl ModuleInstructions {
    pub fn had_import(&self, name: impl Into<String>, value: impl Into<String>) -> Instruction {
        Instruction::ModuleImportHad {
            module: self.module.clone(),
            name: name.into(),
            value: value.into(),
        }
    }
}
