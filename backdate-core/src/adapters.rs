//! Default port implementations.

use crate::ports::{HeadSource, SchemaRef, SchemaValidator, ValidationError, WritePort};
use anyhow::Context;
use backdate_ir::HeadIr;
use backdate_types::manifest::VersionsManifest;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::glob;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Reads every `*.toml` directly under a directory; the file stem is the
/// module name.
#[derive(Debug, Clone)]
pub struct FsHeadSource {
    pub head_dir: Utf8PathBuf,
}

impl FsHeadSource {
    pub fn new(head_dir: Utf8PathBuf) -> Self {
        Self { head_dir }
    }
}

impl HeadSource for FsHeadSource {
    fn load_head(&self) -> anyhow::Result<HeadIr> {
        let pattern = self.head_dir.join("*.toml");
        debug!(pattern = %pattern, "scanning head modules");

        let mut sources = BTreeMap::new();
        for entry in glob(pattern.as_str()).context("glob head modules")? {
            let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
            let path = Utf8PathBuf::try_from(path).context("head module path is not UTF-8")?;
            let Some(module) = path.file_stem() else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            sources.insert(module.to_string(), text);
        }
        if sources.is_empty() {
            anyhow::bail!("no head modules found in {}", self.head_dir);
        }

        HeadIr::from_sources(sources).with_context(|| format!("parse head modules in {}", self.head_dir))
    }
}

/// In-memory head modules for embedding and testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHeadSource {
    sources: BTreeMap<String, String>,
}

impl InMemoryHeadSource {
    pub fn new<I, N, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|(n, s)| (n.into(), s.into()))
                .collect(),
        }
    }
}

impl HeadSource for InMemoryHeadSource {
    fn load_head(&self) -> anyhow::Result<HeadIr> {
        HeadIr::from_sources(&self.sources).context("parse in-memory head modules")
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

/// Load a versions manifest; `.json` files are JSON, anything else TOML.
pub fn load_manifest(path: &Utf8Path) -> anyhow::Result<VersionsManifest> {
    let text = fs::read_to_string(path)?;
    let manifest = if path.extension() == Some("json") {
        serde_json::from_str(&text).with_context(|| format!("parse {path} as JSON"))?
    } else {
        toml::from_str(&text).with_context(|| format!("parse {path} as TOML"))?
    };
    Ok(manifest)
}

/// Validates bodies with JSON Schema documents registered per version.
#[derive(Default)]
pub struct JsonSchemaValidator {
    schemas: BTreeMap<SchemaRef, jsonschema::Validator>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register `schema` for `name` at `version` (`HEAD` for HEAD).
    pub fn insert(&mut self, version: &str, name: &str, schema: &Value) -> anyhow::Result<()> {
        let key = SchemaRef::new(version, name);
        let compiled = jsonschema::validator_for(schema)
            .map_err(|e| anyhow::anyhow!("compile JSON schema for {key}: {e}"))?;
        self.schemas.insert(key, compiled);
        Ok(())
    }

    pub fn with_schema(mut self, version: &str, name: &str, schema: &Value) -> anyhow::Result<Self> {
        self.insert(version, name, schema)?;
        Ok(self)
    }

    /// Load `<dir>/<version>/<Schema>.json` files.
    pub fn from_dir(dir: &Utf8Path) -> anyhow::Result<Self> {
        let mut validator = Self::new();
        let pattern = dir.join("*/*.json");
        for entry in glob(pattern.as_str()).context("glob JSON schemas")? {
            let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
            let path = Utf8PathBuf::try_from(path).context("schema path is not UTF-8")?;
            let (Some(name), Some(version)) = (
                path.file_stem(),
                path.parent().and_then(Utf8Path::file_name),
            ) else {
                continue;
            };
            let text = fs::read_to_string(&path)?;
            let schema: Value =
                serde_json::from_str(&text).with_context(|| format!("parse {path}"))?;
            validator.insert(version, name, &schema)?;
        }
        debug!(dir = %dir, schemas = validator.len(), "loaded JSON schemas");
        Ok(validator)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, body: Value, schema: &SchemaRef) -> Result<Value, ValidationError> {
        let compiled = self
            .schemas
            .get(schema)
            .ok_or_else(|| ValidationError::UnknownSchema(schema.clone()))?;
        let errors: Vec<String> = compiled.iter_errors(&body).map(|e| format!("{e}")).collect();
        if errors.is_empty() {
            Ok(body)
        } else {
            Err(ValidationError::Invalid {
                schema: schema.clone(),
                errors,
            })
        }
    }
}

/// Validator backed by a closure; also the simplest way to accept everything.
pub struct FnValidator<F> {
    func: F,
}

impl<F> FnValidator<F>
where
    F: Fn(Value, &SchemaRef) -> Result<Value, ValidationError> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> SchemaValidator for FnValidator<F>
where
    F: Fn(Value, &SchemaRef) -> Result<Value, ValidationError> + Send + Sync,
{
    fn validate(&self, body: Value, schema: &SchemaRef) -> Result<Value, ValidationError> {
        (self.func)(body, schema)
    }
}

/// Accepts every body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, body: Value, _schema: &SchemaRef) -> Result<Value, ValidationError> {
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn json_schema_validator_reports_errors() {
        let validator = JsonSchemaValidator::new()
            .with_schema(
                "2000-01-01",
                "User",
                &json!({
                    "type": "object",
                    "required": ["address"],
                    "properties": { "address": { "type": "string" } }
                }),
            )
            .unwrap();

        let ok = SchemaRef::new("2000-01-01", "User");
        assert!(validator.validate(json!({"address": "x"}), &ok).is_ok());
        let err = validator.validate(json!({}), &ok).unwrap_err();
        assert!(matches!(err, ValidationError::Invalid { ref errors, .. } if errors.len() == 1));

        let missing = SchemaRef::new("HEAD", "User");
        assert_eq!(
            validator.validate(json!({}), &missing).unwrap_err(),
            ValidationError::UnknownSchema(missing)
        );
    }

    #[test]
    fn fs_head_source_reads_modules_by_stem() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(dir.join("users.toml"), "[schemas.User.fields]\nid = \"int\"\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let head = FsHeadSource::new(dir).load_head().unwrap();
        assert_eq!(head.modules().count(), 1);
        assert!(head.schema("User").is_some());
    }

    #[test]
    fn fs_head_source_rejects_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let err = FsHeadSource::new(dir).load_head().unwrap_err();
        assert!(err.to_string().contains("no head modules"));
    }

    #[test]
    fn manifests_load_from_toml_and_json() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::write(
            dir.join("versions.toml"),
            "[[versions]]\nversion = \"2000-01-01\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("versions.json"),
            r#"{"versions": [{"version": "2000-01-01"}]}"#,
        )
        .unwrap();

        let a = load_manifest(&dir.join("versions.toml")).unwrap();
        let b = load_manifest(&dir.join("versions.json")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn json_schemas_load_from_version_dirs() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        fs::create_dir_all(dir.join("2000-01-01")).unwrap();
        fs::write(
            dir.join("2000-01-01").join("User.json"),
            r#"{"type": "object"}"#,
        )
        .unwrap();

        let validator = JsonSchemaValidator::from_dir(&dir).unwrap();
        assert_eq!(validator.len(), 1);
        assert!(
            validator
                .validate(json!({}), &SchemaRef::new("2000-01-01", "User"))
                .is_ok()
        );
    }
}
