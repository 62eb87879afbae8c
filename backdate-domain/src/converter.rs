//! Runtime body converters attached to version changes.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// What a request converter may rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestInfo {
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
}

impl RequestInfo {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }
}

/// What a response converter may rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub body: Value,
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResponseInfo {
    pub fn new(body: Value, status_code: u16) -> Self {
        Self {
            body,
            status_code,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status_code >= 400
    }
}

/// Which bodies a converter applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConverterTarget {
    /// Every body validated against this HEAD schema.
    Schema(String),
    /// Every body of the endpoint served at `path` for any of `methods`.
    Path {
        path: String,
        methods: BTreeSet<String>,
    },
}

impl ConverterTarget {
    pub fn schema(name: impl Into<String>) -> Self {
        ConverterTarget::Schema(name.into())
    }

    pub fn path<I, S>(path: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ConverterTarget::Path {
            path: path.into(),
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().to_ascii_uppercase())
                .collect(),
        }
    }

    /// `schema` is the HEAD name of the body's schema, if it has one.
    pub fn matches(&self, method: &str, path: &str, schema: Option<&str>) -> bool {
        match self {
            ConverterTarget::Schema(name) => schema == Some(name.as_str()),
            ConverterTarget::Path {
                path: p,
                methods,
            } => p == path && methods.contains(&method.to_ascii_uppercase()),
        }
    }
}

impl fmt::Display for ConverterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterTarget::Schema(name) => write!(f, "schema {name}"),
            ConverterTarget::Path { path, methods } => {
                let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
                write!(f, "{} {path}", methods.join("|"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Request bodies, migrated forward towards HEAD.
    Request,
    /// Response bodies, migrated backward towards the caller's version.
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Request => "request",
            Direction::Response => "response",
        })
    }
}

/// Opaque handle returned when a converter is registered on a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConverterId {
    direction: Direction,
    index: usize,
}

impl ConverterId {
    pub(crate) fn new(direction: Direction, index: usize) -> Self {
        Self { direction, index }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

pub type RequestFn = Arc<dyn Fn(&mut RequestInfo) -> anyhow::Result<()> + Send + Sync>;
pub type ResponseFn = Arc<dyn Fn(&mut ResponseInfo) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct RequestConverter {
    pub(crate) id: ConverterId,
    pub(crate) target: ConverterTarget,
    pub(crate) func: RequestFn,
}

impl RequestConverter {
    pub fn id(&self) -> ConverterId {
        self.id
    }

    pub fn target(&self) -> &ConverterTarget {
        &self.target
    }

    pub fn apply(&self, request: &mut RequestInfo) -> anyhow::Result<()> {
        (self.func)(request)
    }
}

impl fmt::Debug for RequestConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConverter")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ResponseConverter {
    pub(crate) id: ConverterId,
    pub(crate) target: ConverterTarget,
    pub(crate) migrate_http_errors: bool,
    pub(crate) func: ResponseFn,
}

impl ResponseConverter {
    pub fn id(&self) -> ConverterId {
        self.id
    }

    pub fn target(&self) -> &ConverterTarget {
        &self.target
    }

    pub fn migrate_http_errors(&self) -> bool {
        self.migrate_http_errors
    }

    /// Whether this converter runs for `response` at all.
    pub fn applies_to(&self, response: &ResponseInfo) -> bool {
        self.migrate_http_errors || !response.is_error()
    }

    pub fn apply(&self, response: &mut ResponseInfo) -> anyhow::Result<()> {
        (self.func)(response)
    }
}

impl fmt::Debug for ResponseConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseConverter")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("migrate_http_errors", &self.migrate_http_errors)
            .finish_non_exhaustive()
    }
}
