//! Version resolution: exact match, waterfall, opaque schemes.

use backdate_domain::{ResolutionError, VersionGraph};
use backdate_types::VersionScheme;
use proptest::prelude::*;

fn dated(tokens: &[&str]) -> VersionGraph {
    let mut g = VersionGraph::new(VersionScheme::Date);
    for t in tokens {
        g.register(t, vec![]).unwrap();
    }
    g
}

#[test]
fn exact_match_wins() {
    let g = dated(&["2000-01-01", "2001-01-01"]);
    let r = g.resolve("2001-01-01").unwrap();
    assert_eq!(r.position, 1);
    assert!(r.exact);
}

#[test]
fn in_between_tokens_waterfall_to_the_lower_version() {
    let g = dated(&["2000-01-01", "2001-01-01"]);
    let r = g.resolve("2000-06-01").unwrap();
    assert_eq!(r.id.to_string(), "2000-01-01");
    assert_eq!(r.requested, "2000-06-01");
    assert!(!r.exact);

    let r = g.resolve("2030-01-01").unwrap();
    assert_eq!(r.id.to_string(), "2001-01-01");
}

#[test]
fn tokens_before_the_oldest_version_are_too_old() {
    let g = dated(&["2000-01-01", "2001-01-01"]);
    assert_eq!(
        g.resolve("1999-01-01").unwrap_err(),
        ResolutionError::VersionTooOld {
            requested: "1999-01-01".into(),
            oldest: "2000-01-01".into()
        }
    );
}

#[test]
fn malformed_tokens_are_invalid() {
    let g = dated(&["2000-01-01"]);
    let err = g.resolve("2000-13-01").unwrap_err();
    assert!(matches!(err, ResolutionError::InvalidToken { .. }));
    assert_eq!(err.status_code(), 400);
}

#[test]
fn opaque_schemes_never_waterfall() {
    let mut g = VersionGraph::new(VersionScheme::Opaque);
    g.register("v1", vec![]).unwrap();
    g.register("v2", vec![]).unwrap();
    assert_eq!(g.resolve("v2").unwrap().position, 1);
    assert_eq!(
        g.resolve("v1.5").unwrap_err(),
        ResolutionError::UnknownVersion("v1.5".into())
    );
}

#[test]
fn empty_graphs_resolve_nothing() {
    let g = VersionGraph::new(VersionScheme::Date);
    assert_eq!(g.resolve("2000-01-01").unwrap_err(), ResolutionError::NoVersions);
    assert!(g.latest().is_none());
}

#[test]
fn latest_is_the_newest_marker() {
    let g = dated(&["2000-01-01", "2001-01-01"]);
    assert_eq!(g.latest().unwrap().position, 1);
}

fn arb_day() -> impl Strategy<Value = u32> {
    0u32..3650
}

fn token(day: u32) -> String {
    let base = chrono_like_date(day);
    format!("{:04}-{:02}-{:02}", base.0, base.1, base.2)
}

/// Maps an index onto valid dates whose order matches the index order:
/// twelve 28-day months per year.
fn chrono_like_date(day: u32) -> (u32, u32, u32) {
    (2000 + day / 336, 1 + (day % 336) / 28, 1 + day % 28)
}

proptest! {
    /// A token never resolves to a marker newer than itself, and always to
    /// the newest marker not newer than it.
    #[test]
    fn resolution_is_monotonic(
        markers in prop::collection::btree_set(arb_day(), 1..6),
        requested in arb_day(),
    ) {
        let tokens: Vec<String> = markers.iter().map(|d| token(*d)).collect();
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let g = dated(&refs);

        let expected = markers.iter().rposition(|d| *d <= requested);
        match (g.resolve(&token(requested)), expected) {
            (Ok(r), Some(pos)) => {
                prop_assert_eq!(r.position, pos);
                prop_assert_eq!(r.exact, markers.contains(&requested));
            }
            (Err(ResolutionError::VersionTooOld { .. }), None) => {}
            (other, expected) => prop_assert!(false, "got {:?}, expected {:?}", other, expected),
        }
    }
}
