//! Request-scoped version context and side-effect gates.

use backdate_domain::context::{current_version, scope, sync_scope};
use backdate_domain::{VersionChange, VersionGraph};
use backdate_types::VersionScheme;

fn graph() -> VersionGraph {
    let mut g = VersionGraph::new(VersionScheme::Date);
    g.register("2000-01-01", vec![]).unwrap();
    g.register(
        "2001-01-01",
        vec![VersionChange::new("tax in price", "prices include tax").with_side_effects()],
    )
    .unwrap();
    g.register("2002-01-01", vec![]).unwrap();
    g.register_head_changes(vec![
        VersionChange::new("unreleased", "not yet released").with_side_effects(),
    ])
    .unwrap();
    g
}

#[test]
fn no_version_outside_a_scope() {
    assert!(current_version().is_none());
    let gate = graph().side_effect("tax in price").unwrap();
    assert!(gate.is_applied());
}

#[test]
fn sync_scope_exposes_the_version() {
    let g = graph();
    let gate = g.side_effect("tax in price").unwrap();

    let old = g.resolve("2000-01-01").unwrap();
    assert!(!sync_scope(old, || gate.is_applied()));

    let same = g.resolve("2001-01-01").unwrap();
    assert!(sync_scope(same, || gate.is_applied()));

    let waterfalled = g.resolve("2001-09-01").unwrap();
    assert!(sync_scope(waterfalled, || gate.is_applied()));
}

#[test]
fn head_changes_never_apply_to_versioned_requests() {
    let g = graph();
    let gate = g.side_effect("unreleased").unwrap();
    assert!(gate.is_applied());
    let newest = g.resolve("2002-01-01").unwrap();
    assert!(!sync_scope(newest, || gate.is_applied()));
}

#[tokio::test]
async fn async_scope_sets_and_clears_the_version() {
    let g = graph();
    let resolved = g.resolve("2000-06-01").unwrap();
    let seen = scope(resolved.clone(), async { current_version() }).await;
    assert_eq!(seen, Some(resolved));
    assert!(current_version().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_isolated() {
    let g = std::sync::Arc::new(graph());
    let mut handles = Vec::new();
    for i in 0..32 {
        let g = g.clone();
        handles.push(tokio::spawn(async move {
            let token = if i % 2 == 0 { "2000-01-01" } else { "2002-01-01" };
            let resolved = g.resolve(token).unwrap();
            let gate = g.side_effect("tax in price").unwrap();
            scope(resolved, async move {
                tokio::task::yield_now().await;
                (i, gate.is_applied(), current_version().map(|v| v.requested))
            })
            .await
        }));
    }
    for handle in handles {
        let (i, applied, requested) = handle.await.unwrap();
        let even = i % 2 == 0;
        assert_eq!(applied, !even);
        let expected = if even { "2000-01-01" } else { "2002-01-01" };
        assert_eq!(requested.as_deref(), Some(expected));
    }
}
