use crate::error::IrError;
use crate::module::{EndpointMut, EnumMut, SchemaModule, SchemaMut};
use crate::view::{EndpointIr, EnumIr, SchemaIr, SymbolKind};
use std::collections::BTreeMap;
use tracing::debug;

/// The full set of HEAD modules.
///
/// Symbol names (schemas and enums) are unique across modules, so every
/// lookup is by bare name.
#[derive(Debug, Clone, Default)]
pub struct HeadIr {
    modules: BTreeMap<String, SchemaModule>,
}

impl HeadIr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(module name, source text)` pairs.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self, IrError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let mut head = Self::new();
        for (name, text) in sources {
            head.insert_module(SchemaModule::parse(name, text.as_ref())?)?;
        }
        debug!(modules = head.modules.len(), "parsed head modules");
        Ok(head)
    }

    pub fn insert_module(&mut self, module: SchemaModule) -> Result<(), IrError> {
        if self.modules.contains_key(module.name()) {
            return Err(IrError::DuplicateModule(module.name().to_string()));
        }
        for kind in [SymbolKind::Schema, SymbolKind::Enum] {
            for name in module.names(kind) {
                if let Some((_, first)) = self.symbol(name) {
                    return Err(IrError::DuplicateSymbol {
                        name: name.to_string(),
                        first: first.to_string(),
                        second: module.name().to_string(),
                    });
                }
            }
        }
        self.modules.insert(module.name().to_string(), module);
        Ok(())
    }

    pub fn modules(&self) -> impl Iterator<Item = &SchemaModule> {
        self.modules.values()
    }

    pub fn module(&self, name: &str) -> Option<&SchemaModule> {
        self.modules.get(name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut SchemaModule> {
        self.modules.get_mut(name)
    }

    /// Kind and defining module of a symbol.
    pub fn symbol(&self, name: &str) -> Option<(SymbolKind, &str)> {
        self.modules.values().find_map(|m| {
            [SymbolKind::Schema, SymbolKind::Enum]
                .into_iter()
                .find(|k| m.defines(*k, name))
                .map(|k| (k, m.name()))
        })
    }

    fn owner(&self, kind: SymbolKind, name: &str) -> Option<String> {
        self.symbol(name)
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m.to_string())
    }

    pub fn schema(&self, name: &str) -> Option<SchemaIr> {
        let module = self.owner(SymbolKind::Schema, name)?;
        self.modules.get(&module)?.schema(name)
    }

    pub fn schemas(&self) -> Vec<SchemaIr> {
        self.modules.values().flat_map(SchemaModule::schemas).collect()
    }

    pub fn schema_mut(&mut self, name: &str) -> Option<SchemaMut<'_>> {
        let module = self.owner(SymbolKind::Schema, name)?;
        self.modules.get_mut(&module)?.schema_mut(name)
    }

    pub fn enum_(&self, name: &str) -> Option<EnumIr> {
        let module = self.owner(SymbolKind::Enum, name)?;
        self.modules.get(&module)?.enum_(name)
    }

    pub fn enums(&self) -> Vec<EnumIr> {
        self.modules.values().flat_map(SchemaModule::enums).collect()
    }

    pub fn enum_mut(&mut self, name: &str) -> Option<EnumMut<'_>> {
        let module = self.owner(SymbolKind::Enum, name)?;
        self.modules.get_mut(&module)?.enum_mut(name)
    }

    /// Every endpoint, including ones marked `exists = false`, in module order.
    pub fn endpoints(&self) -> Vec<EndpointIr> {
        self.modules
            .values()
            .flat_map(SchemaModule::endpoints)
            .collect()
    }

    pub fn endpoint_mut(&mut self, module: &str, index: usize) -> Option<EndpointMut<'_>> {
        self.modules.get_mut(module)?.endpoint_mut(index)
    }

    /// Rename a schema or enum and rewrite every reference to it in every module.
    ///
    /// Returns the number of references rewritten (the definition itself excluded).
    pub fn rename_symbol(&mut self, old: &str, new: &str) -> Result<usize, IrError> {
        let (kind, module) = self
            .symbol(old)
            .map(|(k, m)| (k, m.to_string()))
            .ok_or_else(|| IrError::UnknownSymbol(old.to_string()))?;
        if let Some((_, first)) = self.symbol(new) {
            return Err(IrError::DuplicateSymbol {
                name: new.to_string(),
                first: first.to_string(),
                second: module,
            });
        }

        let renamed = self
            .modules
            .get_mut(&module)
            .is_some_and(|m| m.rename_definition(kind, old, new));
        if !renamed {
            return Err(IrError::UnknownSymbol(old.to_string()));
        }

        let references: usize = self
            .modules
            .values_mut()
            .map(|m| m.retarget_references(old, new))
            .sum();
        debug!(old, new, module = %module, references, "renamed symbol");
        Ok(references)
    }

    /// Render every module, keyed by module name.
    pub fn render(&self) -> BTreeMap<String, String> {
        self.modules
            .iter()
            .map(|(name, m)| (name.clone(), m.render()))
            .collect()
    }
}
