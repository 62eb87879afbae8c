//! Runtime migration end to end, validated with JSON Schema.

use backdate_core::adapters::{AcceptAll, JsonSchemaValidator};
use backdate_core::catalog::EndpointCatalog;
use backdate_core::generate::generate;
use backdate_core::pipeline::{EndpointSpec, MigrationPipeline};
use backdate_core::ports::SchemaValidator;
use backdate_core::settings::RuntimeSettings;
use backdate_core::MigrationError;
use backdate_domain::context::current_version;
use backdate_domain::{
    ConverterTarget, Direction, RequestInfo, ResolutionError, ResponseInfo, VersionChange,
    VersionGraph,
};
use backdate_ir::HeadIr;
use backdate_types::VersionScheme;
use backdate_types::dsl::{endpoint, schema};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn object(required: &[&str], properties: Value) -> Value {
    json!({
        "type": "object",
        "required": required,
        "properties": properties,
        "additionalProperties": false
    })
}

fn validator() -> Arc<dyn SchemaValidator> {
    let old_request = object(&["address"], json!({ "address": { "type": "string" } }));
    let new_request = object(
        &["addresses"],
        json!({ "addresses": { "type": "array", "items": { "type": "string" }, "minItems": 1 } }),
    );
    let internal_request = object(
        &["addresses"],
        json!({
            "addresses": { "type": "array", "items": { "type": "string" } },
            "primary_address": { "type": "string" }
        }),
    );
    let old_response = object(
        &["id", "address"],
        json!({ "id": { "type": "integer" }, "address": { "type": "string" } }),
    );
    let new_response = object(
        &["id", "addresses"],
        json!({ "id": { "type": "integer" }, "addresses": { "type": "array" } }),
    );

    let mut v = JsonSchemaValidator::new();
    v.insert("2000-01-01", "UserCreateRequest", &old_request).unwrap();
    v.insert("2000-01-01", "UserResource", &old_response).unwrap();
    for version in ["2001-01-01", "HEAD"] {
        v.insert(version, "UserCreateRequest", &new_request).unwrap();
        v.insert(version, "UserResource", &new_response).unwrap();
    }
    v.insert("HEAD", "UserCreateInternal", &internal_request).unwrap();
    Arc::new(v)
}

/// `address` (a string) became `addresses` (a list) in 2001-01-01.
fn addresses_change() -> VersionChange {
    VersionChange::new("users have many addresses", "`address` became `addresses`")
        .with_instructions([schema("UserCreateRequest").field("addresses").had_name("address")])
        .with_request_converter(ConverterTarget::schema("UserCreateRequest"), |request| {
            if let Some(body) = request.body.as_object_mut()
                && let Some(address) = body.remove("address")
            {
                body.insert("addresses".into(), json!([address]));
            }
            Ok(())
        })
        .with_response_converter(ConverterTarget::schema("UserResource"), false, |response| {
            if let Some(body) = response.body.as_object_mut()
                && let Some(addresses) = body.remove("addresses")
            {
                let first = addresses.get(0).cloned().unwrap_or(Value::Null);
                body.insert("address".into(), first);
            }
            Ok(())
        })
}

fn graph_with(change: VersionChange) -> VersionGraph {
    let mut g = VersionGraph::new(VersionScheme::Date);
    g.register("2000-01-01", vec![]).unwrap();
    g.register("2001-01-01", vec![change]).unwrap();
    g
}

fn users() -> EndpointSpec {
    EndpointSpec::new("post", "/users")
        .with_request("UserCreateRequest")
        .with_response("UserResource")
}

fn pipeline_with(change: VersionChange) -> MigrationPipeline {
    MigrationPipeline::new(graph_with(change), validator(), RuntimeSettings::default())
        .unwrap()
        .with_endpoint(users())
}

fn pipeline() -> MigrationPipeline {
    pipeline_with(addresses_change())
}

async fn never(_: RequestInfo) -> anyhow::Result<ResponseInfo> {
    panic!("business logic must not run")
}

fn created(body: Value) -> anyhow::Result<ResponseInfo> {
    Ok(ResponseInfo::new(body, 201))
}

#[tokio::test]
async fn old_requests_and_responses_are_migrated() {
    let pipeline = pipeline();
    let response = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "address": "1 Main St" })),
            |request| async move {
                assert_eq!(request.body, json!({ "addresses": ["1 Main St"] }));
                created(json!({ "id": 1, "addresses": ["1 Main St", "2 Oak St"] }))
            },
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(response.body, json!({ "id": 1, "address": "1 Main St" }));
}

#[tokio::test]
async fn newest_version_passes_through() {
    let pipeline = pipeline();
    let body = json!({ "id": 1, "addresses": ["a", "b"] });
    let expected = body.clone();
    let response = pipeline
        .handle(
            Some("2001-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "addresses": ["a", "b"] })),
            |request| async move {
                assert_eq!(request.body, json!({ "addresses": ["a", "b"] }));
                created(body)
            },
        )
        .await
        .unwrap();
    assert_eq!(response.body, expected);
}

#[tokio::test]
async fn in_between_tokens_use_the_lower_version() {
    let pipeline = pipeline();
    let response = pipeline
        .handle(
            Some("2000-06-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "address": "1 Main St" })),
            |_| async { created(json!({ "id": 7, "addresses": ["x"] })) },
        )
        .await
        .unwrap();
    assert_eq!(response.body, json!({ "id": 7, "address": "x" }));
}

#[tokio::test]
async fn bodies_invalid_for_their_own_version_are_client_errors() {
    let pipeline = pipeline();
    let err = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "addresses": ["1 Main St"] })),
            never,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::ClientValidation { ref schema, .. } if schema == "UserCreateRequest@2000-01-01"));
    assert_eq!(err.status_code(), 422);
    assert!(err.is_client_error());
}

#[tokio::test]
async fn broken_converters_are_integrity_errors() {
    let forgets_to_wrap = VersionChange::new("broken", "forgets to wrap").with_request_converter(
        ConverterTarget::schema("UserCreateRequest"),
        |request| {
            if let Some(body) = request.body.as_object_mut()
                && let Some(address) = body.remove("address")
            {
                body.insert("addresses".into(), address);
            }
            Ok(())
        },
    );
    let pipeline = pipeline_with(forgets_to_wrap);
    let err = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "address": "1 Main St" })),
            never,
        )
        .await
        .unwrap_err();

    match &err {
        MigrationError::Integrity {
            direction, schema, ..
        } => {
            assert_eq!(*direction, Direction::Request);
            assert_eq!(schema, "UserCreateRequest@HEAD");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 500);
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn failing_converters_are_server_errors() {
    let fails = VersionChange::new("fails", "always fails").with_request_converter(
        ConverterTarget::path("/users", ["POST"]),
        |_| anyhow::bail!("cannot convert"),
    );
    let err = pipeline_with(fails)
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "address": "x" })),
            never,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Converter { ref change, .. } if change == "fails"));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn error_responses_skip_converters_unless_opted_in() {
    let schema_calls = Arc::new(AtomicUsize::new(0));
    let counter = schema_calls.clone();
    let change = addresses_change()
        .with_response_converter(ConverterTarget::schema("UserResource"), false, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .with_response_converter(ConverterTarget::path("/users", ["POST"]), true, |response| {
            if response.is_error()
                && let Some(body) = response.body.as_object_mut()
                && let Some(detail) = body.remove("detail")
            {
                body.insert("message".into(), detail);
            }
            Ok(())
        });
    let pipeline = pipeline_with(change);

    let response = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "address": "x" })),
            |_| async { Ok(ResponseInfo::new(json!({ "detail": "conflict" }), 409)) },
        )
        .await
        .unwrap();

    assert_eq!(response.status_code, 409);
    assert_eq!(response.body, json!({ "message": "conflict" }));
    assert_eq!(schema_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn internal_schemas_widen_the_head_boundary() {
    let keeps_primary = VersionChange::new("keep primary", "keep the original address")
        .with_request_converter(ConverterTarget::path("/users/import", ["POST"]), |request| {
            if let Some(body) = request.body.as_object_mut()
                && let Some(address) = body.remove("address")
            {
                body.insert("primary_address".into(), address.clone());
                body.insert("addresses".into(), json!([address]));
            }
            Ok(())
        });
    let import = EndpointSpec::new("POST", "/users/import").with_request("UserCreateRequest");

    let strict = pipeline_with(keeps_primary.clone()).with_endpoint(import.clone());
    let err = strict
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users/import",
            RequestInfo::new(json!({ "address": "1 Main St" })),
            never,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Integrity { .. }));

    let wide = pipeline_with(keeps_primary)
        .with_endpoint(import.with_internal_request("UserCreateInternal"));
    let response = wide
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users/import",
            RequestInfo::new(json!({ "address": "1 Main St" })),
            |request| async move {
                assert_eq!(
                    request.body,
                    json!({ "addresses": ["1 Main St"], "primary_address": "1 Main St" })
                );
                Ok(ResponseInfo::new(Value::Null, 204))
            },
        )
        .await
        .unwrap();
    assert_eq!(response.status_code, 204);
}

#[tokio::test]
async fn side_effect_gates_follow_the_caller_version() {
    let mut g = VersionGraph::new(VersionScheme::Date);
    g.register("2000-01-01", vec![]).unwrap();
    g.register(
        "2001-01-01",
        vec![VersionChange::new("prices include tax", "tax is now included").with_side_effects()],
    )
    .unwrap();
    let gate = g.side_effect("prices include tax").unwrap();
    let pipeline = MigrationPipeline::new(g, Arc::new(AcceptAll), RuntimeSettings::default())
        .unwrap()
        .with_endpoint(EndpointSpec::new("GET", "/prices"));

    for (token, applied) in [("2000-01-01", false), ("2001-01-01", true), ("2005-01-01", true)] {
        let gate = gate.clone();
        let response = pipeline
            .handle(Some(token), "GET", "/prices", RequestInfo::default(), |_| async move {
                Ok(ResponseInfo::new(json!({ "applied": gate.is_applied() }), 200))
            })
            .await
            .unwrap();
        assert_eq!(response.body, json!({ "applied": applied }), "{token}");
    }
    assert!(gate.is_applied());
    assert!(current_version().is_none());
}

#[tokio::test]
async fn routes_missing_from_a_version_are_not_found() {
    let head = HeadIr::from_sources([(
        "users",
        "[[endpoints]]\npath = \"/users/{id}\"\nmethods = [\"DELETE\"]\nfunc = \"delete_user\"\n",
    )])
    .unwrap();
    let graph = graph_with(
        VersionChange::new("deletion", "users can be deleted")
            .with_instructions([endpoint("/users/{id}", ["DELETE"]).didnt_exist()]),
    );
    let catalog = EndpointCatalog::from_generated(&generate(&head, &graph).unwrap());
    let pipeline = MigrationPipeline::new(graph, Arc::new(AcceptAll), RuntimeSettings::default())
        .unwrap()
        .with_catalog(catalog)
        .with_endpoint(EndpointSpec::new("DELETE", "/users/{id}"));

    let err = pipeline
        .handle(Some("2000-01-01"), "DELETE", "/users/{id}", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::UnknownRoute { .. }));
    assert_eq!(err.status_code(), 404);

    let response = pipeline
        .handle(Some("2001-01-01"), "DELETE", "/users/{id}", RequestInfo::default(), |_| async {
            Ok(ResponseInfo::new(Value::Null, 204))
        })
        .await
        .unwrap();
    assert_eq!(response.status_code, 204);
}

async fn listed(_: RequestInfo) -> anyhow::Result<ResponseInfo> {
    Ok(ResponseInfo::new(json!([]), 200))
}

#[tokio::test]
async fn moved_routes_are_served_under_their_old_path() {
    let head = HeadIr::from_sources([(
        "members",
        "[[endpoints]]\npath = \"/members\"\nmethods = [\"GET\"]\nfunc = \"list_members\"\n",
    )])
    .unwrap();
    let graph = graph_with(
        VersionChange::new("members", "`/users` became `/members`")
            .with_instructions([endpoint("/members", ["GET"]).had("path", "/users")]),
    );
    let catalog = EndpointCatalog::from_generated(&generate(&head, &graph).unwrap());
    let pipeline = MigrationPipeline::new(graph, Arc::new(AcceptAll), RuntimeSettings::default())
        .unwrap()
        .with_catalog(catalog)
        .with_endpoint(EndpointSpec::new("GET", "/members"));

    let response = pipeline
        .handle(Some("2000-01-01"), "get", "/users", RequestInfo::default(), listed)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);

    let err = pipeline
        .handle(Some("2000-01-01"), "GET", "/members", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::UnknownRoute { .. }));
    assert_eq!(err.status_code(), 404);

    let response = pipeline
        .handle(Some("2001-01-01"), "GET", "/members", RequestInfo::default(), listed)
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);

    let err = pipeline
        .handle(Some("2001-01-01"), "GET", "/users", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn caller_validates_against_the_schema_its_route_declared() {
    let head = HeadIr::from_sources([(
        "users",
        "[[endpoints]]\npath = \"/users\"\nmethods = [\"POST\"]\nrequest = \"UserCreateRequest\"\n",
    )])
    .unwrap();
    let graph = graph_with(
        VersionChange::new("new request body", "POST /users takes a new body")
            .with_instructions([endpoint("/users", ["POST"]).had("request", "LegacyUserCreate")]),
    );
    let catalog = EndpointCatalog::from_generated(&generate(&head, &graph).unwrap());

    let mut v = JsonSchemaValidator::new();
    v.insert(
        "2000-01-01",
        "LegacyUserCreate",
        &object(&["login"], json!({ "login": { "type": "string" } })),
    )
    .unwrap();
    v.insert("HEAD", "UserCreateRequest", &json!({ "type": "object" }))
        .unwrap();
    let pipeline = MigrationPipeline::new(graph, Arc::new(v), RuntimeSettings::default())
        .unwrap()
        .with_catalog(catalog)
        .with_endpoint(EndpointSpec::new("POST", "/users").with_request("UserCreateRequest"));

    let err = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "name": "x" })),
            never,
        )
        .await
        .unwrap_err();
    match &err {
        MigrationError::ClientValidation { schema, .. } => {
            assert_eq!(schema, "LegacyUserCreate@2000-01-01")
        }
        other => panic!("expected a client validation error, got {other:?}"),
    }
    assert_eq!(err.status_code(), 422);

    let response = pipeline
        .handle(
            Some("2000-01-01"),
            "POST",
            "/users",
            RequestInfo::new(json!({ "login": "x" })),
            listed,
        )
        .await
        .unwrap();
    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn resolution_and_registration_failures() {
    let pipeline = pipeline();

    let err = pipeline
        .handle(Some("1999-01-01"), "POST", "/users", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Resolution(ResolutionError::VersionTooOld { .. })
    ));
    assert_eq!(err.status_code(), 400);

    let err = pipeline
        .handle(None, "POST", "/users", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Resolution(ResolutionError::MissingVersion)
    ));

    let err = pipeline
        .handle(Some("2000-01-01"), "GET", "/nowhere", RequestInfo::default(), never)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::UnregisteredEndpoint { .. }));
    assert_eq!(err.status_code(), 500);

    let err = pipeline
        .handle(Some("2001-01-01"), "POST", "/users", RequestInfo::new(json!({ "addresses": ["a"] })), |_| async {
            Err(anyhow::anyhow!("database is down"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Handler(_)));
}

#[test]
fn settings_are_checked_against_the_graph() {
    let opaque = RuntimeSettings {
        scheme: VersionScheme::Opaque,
        ..RuntimeSettings::default()
    };
    let err = MigrationPipeline::new(graph_with(addresses_change()), validator(), opaque).unwrap_err();
    assert!(matches!(err, MigrationError::SchemeMismatch { .. }));

    let too_old = RuntimeSettings {
        default_version: Some("1990-01-01".into()),
        ..RuntimeSettings::default()
    };
    let err = MigrationPipeline::new(graph_with(addresses_change()), validator(), too_old).unwrap_err();
    assert!(matches!(err, MigrationError::DefaultVersion { .. }));
}

#[tokio::test]
async fn default_version_applies_without_a_token() {
    let settings = RuntimeSettings {
        default_version: Some("2000-01-01".into()),
        ..RuntimeSettings::default()
    };
    let pipeline = MigrationPipeline::new(graph_with(addresses_change()), validator(), settings)
        .unwrap()
        .with_endpoint(users());

    let headers = BTreeMap::from([("X-API-Version".to_string(), "2001-01-01".to_string())]);
    assert_eq!(pipeline.version_token(&headers), Some("2001-01-01"));
    assert_eq!(pipeline.version_token(&BTreeMap::new()), None);

    let response = pipeline
        .handle(None, "POST", "/users", RequestInfo::new(json!({ "address": "a" })), |_| async {
            created(json!({ "id": 1, "addresses": ["a"] }))
        })
        .await
        .unwrap();
    assert_eq!(response.body, json!({ "id": 1, "address": "a" }));
}

#[test]
fn migrations_can_run_without_handle() {
    let pipeline = pipeline();
    let version = pipeline.resolve(Some("2000-01-01")).unwrap();
    let endpoint = pipeline.endpoint("POST", "/users").unwrap();

    let request = pipeline
        .migrate_request(endpoint, &version, RequestInfo::new(json!({ "address": "a" })))
        .unwrap();
    assert_eq!(request.body, json!({ "addresses": ["a"] }));

    let response = pipeline
        .migrate_response(
            endpoint,
            &version,
            ResponseInfo::new(json!({ "id": 1, "addresses": ["a"] }), 200),
        )
        .unwrap();
    assert_eq!(response.body, json!({ "id": 1, "address": "a" }));

    let bad = pipeline
        .migrate_response(endpoint, &version, ResponseInfo::new(json!({ "id": "one" }), 200))
        .unwrap_err();
    assert!(matches!(
        bad,
        MigrationError::Integrity {
            direction: Direction::Response,
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_do_not_leak_versions() {
    let pipeline = Arc::new(pipeline());
    let mut handles = Vec::new();
    for i in 0..64 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            let old = i % 2 == 0;
            let (token, body) = if old {
                ("2000-01-01", json!({ "address": "a" }))
            } else {
                ("2001-01-01", json!({ "addresses": ["a"] }))
            };
            let response = pipeline
                .handle(Some(token), "POST", "/users", RequestInfo::new(body), |_| async move {
                    tokio::task::yield_now().await;
                    let seen = current_version().map(|v| v.requested);
                    assert_eq!(seen.as_deref(), Some(token));
                    created(json!({ "id": i, "addresses": ["a"] }))
                })
                .await
                .unwrap();
            (old, response.body)
        }));
    }
    for handle in handles {
        let (old, body) = handle.await.unwrap();
        assert_eq!(body.get("address").is_some(), old);
        assert_eq!(body.get("addresses").is_some(), !old);
    }
}

proptest::proptest! {
    /// Forward then backward across the change is lossless for data both
    /// versions can express.
    #[test]
    fn single_addresses_survive_the_round_trip(address in "[a-zA-Z0-9 ]{1,24}") {
        let pipeline = pipeline();
        let version = pipeline.resolve(Some("2000-01-01")).unwrap();
        let endpoint = pipeline.endpoint("POST", "/users").unwrap();

        let request = pipeline
            .migrate_request(endpoint, &version, RequestInfo::new(json!({ "address": address.clone() })))
            .unwrap();
        let mut head = request.body;
        head["id"] = json!(1);

        let response = pipeline
            .migrate_response(endpoint, &version, ResponseInfo::new(head, 200))
            .unwrap();
        proptest::prop_assert_eq!(response.body, json!({ "id": 1, "address": address }));
    }
}
