//! Which routes each generated version serves.
//!
//! Endpoints are never added or dropped from the HEAD modules while versions
//! are derived; older versions only edit or hide them. The position of an
//! endpoint in its module is therefore a stable identity across versions,
//! which is how a version's route is traced back to the HEAD endpoint that
//! serves it even after its path or methods changed.

use crate::generate::GeneratedVersions;
use backdate_ir::{EndpointIr, HeadIr};
use std::collections::{BTreeMap, BTreeSet};

/// Stable identity of one `[[endpoints]]` entry: module and position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub module: String,
    pub index: usize,
}

impl EndpointKey {
    fn of(endpoint: &EndpointIr) -> Self {
        Self {
            module: endpoint.module.clone(),
            index: endpoint.index,
        }
    }
}

/// One live route of one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub endpoint: EndpointKey,
    pub method: String,
    pub path: String,
    pub func: Option<String>,
    /// Schema names as this version knows them.
    pub request: Option<String>,
    pub response: Option<String>,
    pub status_code: Option<u16>,
}

/// Where an endpoint lives in HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadRoute {
    pub path: String,
    pub methods: BTreeSet<String>,
    pub exists: bool,
}

type RouteKey = (String, String);

/// Live `(method, path)` pairs per version token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointCatalog {
    head: BTreeMap<EndpointKey, HeadRoute>,
    versions: BTreeMap<String, BTreeMap<RouteKey, RouteEntry>>,
}

impl EndpointCatalog {
    pub fn from_generated(generated: &GeneratedVersions) -> Self {
        let head = generated
            .head_ir()
            .endpoints()
            .into_iter()
            .map(|e| {
                (
                    EndpointKey::of(&e),
                    HeadRoute {
                        path: e.path,
                        methods: e.methods,
                        exists: e.exists,
                    },
                )
            })
            .collect();
        let versions = generated
            .versions()
            .iter()
            .map(|v| (v.id().to_string(), routes_of(v.ir())))
            .collect();
        Self { head, versions }
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.keys().map(String::as_str)
    }

    pub fn routes(&self, version: &str) -> impl Iterator<Item = &RouteEntry> {
        self.versions.get(version).into_iter().flat_map(|r| r.values())
    }

    /// The route a caller of `version` reaches with `method` and `path`.
    pub fn route(&self, version: &str, method: &str, path: &str) -> Option<&RouteEntry> {
        self.versions
            .get(version)?
            .get(&(method.to_ascii_uppercase(), path.to_string()))
    }

    pub fn has_route(&self, version: &str, method: &str, path: &str) -> bool {
        self.route(version, method, path).is_some()
    }

    /// The HEAD `(method, path)` serving `route`.
    ///
    /// The caller's method is kept when HEAD still serves it; otherwise an
    /// endpoint with a single HEAD method maps onto that method.
    pub fn head_route_of(&self, route: &RouteEntry) -> Option<(String, String)> {
        let head = self.head.get(&route.endpoint)?;
        let method = if head.methods.contains(&route.method) {
            route.method.clone()
        } else if head.methods.len() == 1 {
            head.methods.iter().next()?.clone()
        } else {
            return None;
        };
        Some((method, head.path.clone()))
    }

    /// The route of `version` served by the HEAD endpoint at `method` and
    /// `path`, under whatever path and schema names that version uses.
    pub fn route_for_head(&self, version: &str, method: &str, path: &str) -> Option<&RouteEntry> {
        let method = method.to_ascii_uppercase();
        let key = self
            .head
            .iter()
            .filter(|(_, h)| h.path == path && h.methods.contains(&method))
            .max_by_key(|(_, h)| h.exists)
            .map(|(k, _)| k)?;
        let mut candidates = self
            .routes(version)
            .filter(|r| &r.endpoint == key)
            .peekable();
        let first = candidates.peek().copied();
        candidates.find(|r| r.method == method).or(first)
    }
}

fn routes_of(ir: &HeadIr) -> BTreeMap<RouteKey, RouteEntry> {
    let mut routes = BTreeMap::new();
    for endpoint in ir.endpoints().into_iter().filter(|e| e.exists) {
        for method in &endpoint.methods {
            routes.insert(
                (method.clone(), endpoint.path.clone()),
                RouteEntry {
                    endpoint: EndpointKey::of(&endpoint),
                    method: method.clone(),
                    path: endpoint.path.clone(),
                    func: endpoint.func.clone(),
                    request: endpoint.request.clone(),
                    response: endpoint.response.clone(),
                    status_code: endpoint.status_code,
                },
            );
        }
    }
    routes
}
