//! Property tests for version id ordering.

use backdate_types::version::{VersionId, VersionScheme};
use proptest::prelude::*;
use std::cmp::Ordering;

fn arb_date_token() -> impl Strategy<Value = String> {
    (1990i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
}

proptest! {
    /// Canonical date tokens order the same way as the dates they name.
    #[test]
    fn date_order_matches_canonical_text_order(a in arb_date_token(), b in arb_date_token()) {
        let va = VersionScheme::Date.parse(&a).unwrap();
        let vb = VersionScheme::Date.parse(&b).unwrap();
        prop_assert_eq!(va.partial_cmp(&vb), Some(a.cmp(&b)));
    }

    /// Parsing is stable under re-display.
    #[test]
    fn display_is_canonical(a in arb_date_token()) {
        let v = VersionScheme::Date.parse(&a).unwrap();
        prop_assert_eq!(v.to_string(), a);
    }

    /// Distinct opaque ids never compare.
    #[test]
    fn opaque_ids_are_incomparable(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        prop_assume!(a != b);
        let va = VersionId::Opaque(a);
        let vb = VersionId::Opaque(b);
        prop_assert_eq!(va.partial_cmp(&vb), None::<Ordering>);
    }
}

#[test]
fn dates_and_opaque_ids_do_not_compare() {
    let d = VersionScheme::Date.parse("2000-01-01").unwrap();
    let o = VersionScheme::Opaque.parse("2000-01-01").unwrap();
    assert_eq!(d.partial_cmp(&o), None);
    assert_ne!(d, o);
}
