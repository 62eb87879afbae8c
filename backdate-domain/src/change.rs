use crate::converter::{
    ConverterId, ConverterTarget, Direction, RequestConverter, RequestInfo, ResponseConverter,
    ResponseInfo,
};
use backdate_types::Instruction;
use backdate_types::manifest::ChangeManifest;
use std::sync::Arc;

/// One named breaking change: structural instructions for code generation plus
/// the converters that migrate bodies across it at runtime.
#[derive(Debug, Clone)]
pub struct VersionChange {
    name: String,
    description: String,
    instructions: Vec<Instruction>,
    request_converters: Vec<RequestConverter>,
    response_converters: Vec<ResponseConverter>,
    side_effects: bool,
}

impl VersionChange {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: Vec::new(),
            request_converters: Vec::new(),
            response_converters: Vec::new(),
            side_effects: false,
        }
    }

    /// Instructions only; converters cannot be described in a manifest.
    pub fn from_manifest(manifest: &ChangeManifest) -> Self {
        let mut change = Self::new(manifest.name.as_str(), manifest.description.as_str())
            .with_instructions(manifest.instructions.iter().cloned());
        change.side_effects = manifest.side_effects;
        change
    }

    pub fn with_instructions(mut self, instructions: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(instructions);
        self
    }

    /// Mark the change as gating behaviour, see [`crate::SideEffect`].
    pub fn with_side_effects(mut self) -> Self {
        self.side_effects = true;
        self
    }

    pub fn with_request_converter<F>(mut self, target: ConverterTarget, func: F) -> Self
    where
        F: Fn(&mut RequestInfo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_request_converter(target, func);
        self
    }

    pub fn with_response_converter<F>(
        mut self,
        target: ConverterTarget,
        migrate_http_errors: bool,
        func: F,
    ) -> Self
    where
        F: Fn(&mut ResponseInfo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.add_response_converter(target, migrate_http_errors, func);
        self
    }

    /// Register a request converter; it runs in registration order.
    pub fn add_request_converter<F>(&mut self, target: ConverterTarget, func: F) -> ConverterId
    where
        F: Fn(&mut RequestInfo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ConverterId::new(Direction::Request, self.request_converters.len());
        self.request_converters.push(RequestConverter {
            id,
            target,
            func: Arc::new(func),
        });
        id
    }

    /// Register a response converter; it runs in registration order.
    ///
    /// With `migrate_http_errors` unset it is skipped for status codes >= 400.
    pub fn add_response_converter<F>(
        &mut self,
        target: ConverterTarget,
        migrate_http_errors: bool,
        func: F,
    ) -> ConverterId
    where
        F: Fn(&mut ResponseInfo) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ConverterId::new(Direction::Response, self.response_converters.len());
        self.response_converters.push(ResponseConverter {
            id,
            target,
            migrate_http_errors,
            func: Arc::new(func),
        });
        id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn has_side_effects(&self) -> bool {
        self.side_effects
    }

    pub fn request_converters(&self) -> &[RequestConverter] {
        &self.request_converters
    }

    pub fn response_converters(&self) -> &[ResponseConverter] {
        &self.response_converters
    }

    pub fn request_converter(&self, id: ConverterId) -> Option<&RequestConverter> {
        match id.direction() {
            Direction::Request => self.request_converters.get(id.index()),
            Direction::Response => None,
        }
    }

    pub fn response_converter(&self, id: ConverterId) -> Option<&ResponseConverter> {
        match id.direction() {
            Direction::Response => self.response_converters.get(id.index()),
            Direction::Request => None,
        }
    }
}
