use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Field attribute keys an instruction may set or remove.
///
/// `type` carries the type expression; everything else is a default, a
/// constraint or metadata.
pub const FIELD_ATTRIBUTES: &[&str] = &[
    "type",
    "default",
    "default_factory",
    "alias",
    "validation_alias",
    "serialization_alias",
    "title",
    "description",
    "examples",
    "deprecated",
    "exclude",
    "frozen",
    "strict",
    "discriminator",
    "json_schema_extra",
    "gt",
    "ge",
    "lt",
    "le",
    "multiple_of",
    "allow_inf_nan",
    "max_digits",
    "decimal_places",
    "min_length",
    "max_length",
    "pattern",
    "union_mode",
];

/// Endpoint attribute keys an `EndpointHad` instruction may change.
pub const ENDPOINT_ATTRIBUTES: &[&str] = &[
    "path",
    "methods",
    "func",
    "request",
    "response",
    "status_code",
    "tags",
    "summary",
    "description",
    "deprecated",
    "include_in_schema",
    "operation_id",
];

/// One atomic structural edit, phrased as "how the older version differed from HEAD".
///
/// Code generation applies these in reverse: walking from HEAD towards the oldest
/// version, each instruction turns the working copy into its predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// The field existed in the older version (it was removed later).
    FieldExisted {
        schema: String,
        field: String,
        #[serde(default)]
        attributes: BTreeMap<String, Value>,
    },

    /// The field did not exist in the older version (it was added later).
    FieldDidntExist { schema: String, field: String },

    /// The field attribute held `value` in the older version.
    FieldHad {
        schema: String,
        field: String,
        attribute: String,
        value: Value,
    },

    /// The field lacked these attributes in the older version.
    FieldDidntHave {
        schema: String,
        field: String,
        attributes: Vec<String>,
    },

    /// The schema (or enum) was called `name` in the older version.
    SchemaRenamed { schema: String, name: String },

    /// The field was called `name` in the older version.
    SchemaFieldRenamed {
        schema: String,
        field: String,
        name: String,
    },

    /// The enum had these extra members in the older version.
    EnumHad {
        #[serde(rename = "enum")]
        enum_name: String,
        members: BTreeMap<String, Value>,
    },

    /// The enum lacked these members in the older version.
    EnumDidntHave {
        #[serde(rename = "enum")]
        enum_name: String,
        members: Vec<String>,
    },

    /// The endpoint was served in the older version.
    EndpointExisted {
        path: String,
        methods: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        func: Option<String>,
    },

    /// The endpoint was not served in the older version.
    EndpointDidntExist {
        path: String,
        methods: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        func: Option<String>,
    },

    /// The endpoint attribute held `value` in the older version.
    EndpointHad {
        path: String,
        methods: BTreeSet<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        func: Option<String>,
        attribute: String,
        value: Value,
    },

    /// The validator existed in the older version.
    ValidatorExisted {
        schema: String,
        validator: String,
        #[serde(default)]
        attributes: BTreeMap<String, Value>,
    },

    /// The validator did not exist in the older version.
    ValidatorDidntExist { schema: String, validator: String },

    /// The module carried this import in the older version.
    ModuleImportHad {
        module: String,
        name: String,
        value: String,
    },
}

/// Selects one endpoint by path and method set, optionally disambiguated by function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointSelector {
    pub path: String,
    pub methods: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,
}

impl EndpointSelector {
    pub fn new<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            path: path.into(),
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().to_ascii_uppercase())
                .collect(),
            func: None,
        }
    }

    pub fn with_func(mut self, func: impl Into<String>) -> Self {
        self.func = Some(func.into());
        self
    }
}

impl fmt::Display for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(String::as_str).collect();
        write!(f, "{} {}", methods.join("|"), self.path)?;
        if let Some(func) = &self.func {
            write!(f, " ({func})")?;
        }
        Ok(())
    }
}

impl Instruction {
    /// Stable snake_case name of the variant (matches the serialized `kind`).
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::FieldExisted { .. } => "field_existed",
            Instruction::FieldDidntExist { .. } => "field_didnt_exist",
            Instruction::FieldHad { .. } => "field_had",
            Instruction::FieldDidntHave { .. } => "field_didnt_have",
            Instruction::SchemaRenamed { .. } => "schema_renamed",
            Instruction::SchemaFieldRenamed { .. } => "schema_field_renamed",
            Instruction::EnumHad { .. } => "enum_had",
            Instruction::EnumDidntHave { .. } => "enum_didnt_have",
            Instruction::EndpointExisted { .. } => "endpoint_existed",
            Instruction::EndpointDidntExist { .. } => "endpoint_didnt_exist",
            Instruction::EndpointHad { .. } => "endpoint_had",
            Instruction::ValidatorExisted { .. } => "validator_existed",
            Instruction::ValidatorDidntExist { .. } => "validator_didnt_exist",
            Instruction::ModuleImportHad { .. } => "module_import_had",
        }
    }

    /// The endpoint this instruction targets, if it is an endpoint instruction.
    pub fn endpoint_selector(&self) -> Option<EndpointSelector> {
        match self {
            Instruction::EndpointExisted {
                path,
                methods,
                func,
            }
            | Instruction::EndpointDidntExist {
                path,
                methods,
                func,
            }
            | Instruction::EndpointHad {
                path,
                methods,
                func,
                ..
            } => Some(EndpointSelector {
                path: path.clone(),
                methods: methods.clone(),
                func: func.clone(),
            }),
            _ => None,
        }
    }

    /// Human-readable description of the targeted symbol.
    pub fn target(&self) -> String {
        match self {
            Instruction::FieldExisted { schema, field, .. }
            | Instruction::FieldDidntExist { schema, field }
            | Instruction::FieldDidntHave { schema, field, .. }
            | Instruction::SchemaFieldRenamed { schema, field, .. } => {
                format!("{schema}.{field}")
            }
            Instruction::FieldHad {
                schema,
                field,
                attribute,
                ..
            } => format!("{schema}.{field}[{attribute}]"),
            Instruction::SchemaRenamed { schema, .. } => schema.clone(),
            Instruction::EnumHad { enum_name, .. } | Instruction::EnumDidntHave { enum_name, .. } => {
                enum_name.clone()
            }
            Instruction::ValidatorExisted {
                schema, validator, ..
            }
            | Instruction::ValidatorDidntExist { schema, validator } => {
                format!("{schema}@{validator}")
            }
            Instruction::ModuleImportHad { module, name, .. } => format!("{module}::{name}"),
            Instruction::EndpointExisted { .. }
            | Instruction::EndpointDidntExist { .. }
            | Instruction::EndpointHad { .. } => self
                .endpoint_selector()
                .map(|s| s.to_string())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}
