//! Runtime request/response migration.
//!
//! Per call: resolve the caller's version, validate the body against that
//! version's schema, run request converters oldest to newest up to HEAD,
//! validate against HEAD (or the internal schema), hand the body to business
//! logic, then run response converters newest to oldest back down to the
//! caller's version and validate the result.
//!
//! The graph and endpoint table are read-only after construction, so one
//! pipeline is shared across concurrent calls. The resolved version lives in
//! task-local storage for the duration of [`MigrationPipeline::handle`].

use crate::catalog::{EndpointCatalog, RouteEntry};
use crate::error::MigrationError;
use crate::ports::{SchemaRef, SchemaValidator, ValidationError};
use crate::settings::RuntimeSettings;
use backdate_domain::{
    Direction, GraphPoint, Order, RequestInfo, ResolutionError, ResolvedVersion, ResponseInfo,
    VersionGraph, context,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runtime view of one HEAD endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub method: String,
    /// Route template, e.g. `/users/{id}`.
    pub path: String,
    /// HEAD request body schema.
    pub request_schema: Option<String>,
    /// HEAD response body schema.
    pub response_schema: Option<String>,
    /// Wider-than-HEAD schema the migrated request is validated against
    /// instead of `request_schema`.
    pub internal_request_schema: Option<String>,
}

impl EndpointSpec {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            method: method.as_ref().to_ascii_uppercase(),
            path: path.into(),
            request_schema: None,
            response_schema: None,
            internal_request_schema: None,
        }
    }

    pub fn with_request(mut self, schema: impl Into<String>) -> Self {
        self.request_schema = Some(schema.into());
        self
    }

    pub fn with_response(mut self, schema: impl Into<String>) -> Self {
        self.response_schema = Some(schema.into());
        self
    }

    pub fn with_internal_request(mut self, schema: impl Into<String>) -> Self {
        self.internal_request_schema = Some(schema.into());
        self
    }
}

pub struct MigrationPipeline {
    graph: Arc<VersionGraph>,
    validator: Arc<dyn SchemaValidator>,
    settings: RuntimeSettings,
    default_version: Option<ResolvedVersion>,
    endpoints: BTreeMap<(String, String), EndpointSpec>,
    catalog: Option<EndpointCatalog>,
}

impl std::fmt::Debug for MigrationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationPipeline")
            .field("versions", &self.graph.len())
            .field("settings", &self.settings)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl MigrationPipeline {
    pub fn new(
        graph: impl Into<Arc<VersionGraph>>,
        validator: Arc<dyn SchemaValidator>,
        settings: RuntimeSettings,
    ) -> Result<Self, MigrationError> {
        let graph = graph.into();
        if graph.scheme() != settings.scheme {
            return Err(MigrationError::SchemeMismatch {
                expected: settings.scheme,
                found: graph.scheme(),
            });
        }
        let default_version = settings
            .default_version
            .as_deref()
            .map(|token| {
                graph
                    .resolve(token)
                    .map_err(|source| MigrationError::DefaultVersion {
                        token: token.to_string(),
                        source,
                    })
            })
            .transpose()?;

        Ok(Self {
            graph,
            validator,
            settings,
            default_version,
            endpoints: BTreeMap::new(),
            catalog: None,
        })
    }

    /// Answer 404 for routes a version does not serve.
    pub fn with_catalog(mut self, catalog: EndpointCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_endpoint(mut self, endpoint: EndpointSpec) -> Self {
        self.register_endpoint(endpoint);
        self
    }

    /// Register (or replace) the endpoint served at its method and path.
    pub fn register_endpoint(&mut self, endpoint: EndpointSpec) {
        let key = (endpoint.method.clone(), endpoint.path.clone());
        self.endpoints.insert(key, endpoint);
    }

    pub fn graph(&self) -> &VersionGraph {
        &self.graph
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn endpoint(&self, method: &str, path: &str) -> Result<&EndpointSpec, MigrationError> {
        self.endpoints
            .get(&(method.to_ascii_uppercase(), path.to_string()))
            .ok_or_else(|| MigrationError::UnregisteredEndpoint {
                method: method.to_ascii_uppercase(),
                path: path.to_string(),
            })
    }

    /// The token in `headers` under the configured header name.
    pub fn version_token<'a>(&self, headers: &'a BTreeMap<String, String>) -> Option<&'a str> {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&self.settings.version_header))
            .map(|(_, value)| value.as_str())
    }

    /// Resolve a caller token, falling back to the configured default.
    pub fn resolve(&self, token: Option<&str>) -> Result<ResolvedVersion, MigrationError> {
        match token {
            Some(token) => Ok(self.graph.resolve(token)?),
            None => self
                .default_version
                .clone()
                .ok_or(MigrationError::Resolution(ResolutionError::MissingVersion)),
        }
    }

    /// The endpoint a caller of `version` reaches at `method` and `path`.
    ///
    /// With a catalog the caller's route is traced back to the HEAD endpoint
    /// serving it, so a route whose path changed since `version` is still
    /// found under its old path. Routes the version does not serve are
    /// [`MigrationError::UnknownRoute`].
    fn locate(
        &self,
        method: &str,
        path: &str,
        version: &ResolvedVersion,
    ) -> Result<&EndpointSpec, MigrationError> {
        let Some(catalog) = &self.catalog else {
            return self.endpoint(method, path);
        };
        let label = version.id.to_string();
        let route = catalog
            .route(&label, method, path)
            .ok_or_else(|| MigrationError::UnknownRoute {
                method: method.to_ascii_uppercase(),
                path: path.to_string(),
                version: label.clone(),
            })?;
        match catalog.head_route_of(route) {
            Some((head_method, head_path)) => {
                if head_path != route.path {
                    debug!(
                        version = %label,
                        path = %route.path,
                        head = %head_path,
                        "route moved since caller's version"
                    );
                }
                self.endpoint(&head_method, &head_path)
            }
            None => self.endpoint(method, path),
        }
    }

    /// Run one call end to end. `business_logic` sees a HEAD-shaped (or
    /// internal) request and returns a HEAD-shaped response; side-effect
    /// gates answer for the caller's version while it runs.
    pub async fn handle<F, Fut>(
        &self,
        token: Option<&str>,
        method: &str,
        path: &str,
        request: RequestInfo,
        business_logic: F,
    ) -> Result<ResponseInfo, MigrationError>
    where
        F: FnOnce(RequestInfo) -> Fut,
        Fut: Future<Output = anyhow::Result<ResponseInfo>>,
    {
        let version = self.resolve(token)?;
        let endpoint = self.locate(method, path, &version)?;

        let scoped = version.clone();
        context::scope(scoped, async move {
            let request = self.migrate_request(endpoint, &version, request)?;
            let response = business_logic(request)
                .await
                .map_err(MigrationError::Handler)?;
            self.migrate_response(endpoint, &version, response)
        })
        .await
    }

    /// Validate at the caller's version, convert up to HEAD, validate at HEAD.
    pub fn migrate_request(
        &self,
        endpoint: &EndpointSpec,
        version: &ResolvedVersion,
        mut request: RequestInfo,
    ) -> Result<RequestInfo, MigrationError> {
        let point = version.point();
        let head_schema = endpoint.request_schema.as_deref();

        if let Some(schema) = head_schema {
            let caller = self.caller_schema(endpoint, version, schema, |r| r.request.as_deref());
            let body = std::mem::take(&mut request.body);
            request.body = self
                .validator
                .validate(body, &caller)
                .map_err(|e| client_error(e, &caller))?;
        }

        for r in self
            .graph
            .all_changes_between(point, GraphPoint::Head, Order::Ascending)
        {
            for converter in r.change.request_converters() {
                if !converter
                    .target()
                    .matches(&endpoint.method, &endpoint.path, head_schema)
                {
                    continue;
                }
                debug!(
                    change = r.change.name(),
                    target = %converter.target(),
                    "migrating request"
                );
                converter
                    .apply(&mut request)
                    .map_err(|source| MigrationError::Converter {
                        direction: Direction::Request,
                        change: r.change.name().to_string(),
                        source,
                    })?;
            }
        }

        if let Some(schema) = endpoint.internal_request_schema.as_deref().or(head_schema) {
            let head = SchemaRef::new(self.graph.label(GraphPoint::Head), schema);
            let body = std::mem::take(&mut request.body);
            request.body = self
                .validator
                .validate(body, &head)
                .map_err(|e| integrity_error(e, Direction::Request, &head, version))?;
        }
        Ok(request)
    }

    /// Convert a HEAD response down to the caller's version and validate it.
    /// Error responses are neither converted (unless a converter opts in)
    /// nor validated.
    pub fn migrate_response(
        &self,
        endpoint: &EndpointSpec,
        version: &ResolvedVersion,
        mut response: ResponseInfo,
    ) -> Result<ResponseInfo, MigrationError> {
        let point = version.point();
        let head_schema = endpoint.response_schema.as_deref();

        for r in self
            .graph
            .all_changes_between(point, GraphPoint::Head, Order::Descending)
        {
            for converter in r.change.response_converters() {
                if !converter
                    .target()
                    .matches(&endpoint.method, &endpoint.path, head_schema)
                    || !converter.applies_to(&response)
                {
                    continue;
                }
                debug!(
                    change = r.change.name(),
                    target = %converter.target(),
                    status = response.status_code,
                    "migrating response"
                );
                converter
                    .apply(&mut response)
                    .map_err(|source| MigrationError::Converter {
                        direction: Direction::Response,
                        change: r.change.name().to_string(),
                        source,
                    })?;
            }
        }

        if let Some(schema) = head_schema
            && !response.is_error()
        {
            let caller = self.caller_schema(endpoint, version, schema, |r| r.response.as_deref());
            let body = std::mem::take(&mut response.body);
            response.body = self
                .validator
                .validate(body, &caller)
                .map_err(|e| integrity_error(e, Direction::Response, &caller, version))?;
        }
        Ok(response)
    }

    /// The schema the caller's version validates against: the name its
    /// catalog route declares, else the HEAD name as of that version.
    fn caller_schema(
        &self,
        endpoint: &EndpointSpec,
        version: &ResolvedVersion,
        head_name: &str,
        declared: impl Fn(&RouteEntry) -> Option<&str>,
    ) -> SchemaRef {
        let point = version.point();
        let label = self.graph.label(point);
        let name = self
            .catalog
            .as_ref()
            .and_then(|c| c.route_for_head(&label, &endpoint.method, &endpoint.path))
            .and_then(|r| declared(r).map(str::to_string))
            .unwrap_or_else(|| self.graph.schema_name_at(head_name, point));
        SchemaRef::new(label, name)
    }
}

fn client_error(error: ValidationError, schema: &SchemaRef) -> MigrationError {
    match error {
        ValidationError::Invalid { errors, .. } => MigrationError::ClientValidation {
            schema: schema.to_string(),
            errors,
        },
        ValidationError::UnknownSchema(s) => MigrationError::UnknownSchema {
            schema: s.to_string(),
        },
    }
}

fn integrity_error(
    error: ValidationError,
    direction: Direction,
    schema: &SchemaRef,
    version: &ResolvedVersion,
) -> MigrationError {
    match error {
        ValidationError::Invalid { errors, .. } => {
            warn!(
                %direction,
                schema = %schema,
                version = %version.id,
                errors = errors.len(),
                "migrated body failed validation"
            );
            MigrationError::Integrity {
                direction,
                schema: schema.to_string(),
                errors,
            }
        }
        ValidationError::UnknownSchema(s) => MigrationError::UnknownSchema {
            schema: s.to_string(),
        },
    }
}
