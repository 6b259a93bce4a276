// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for kube-test-harness.
//!
//! Uses proptest to generate random test names and verify the naming
//! invariants object names depend on.

use proptest::prelude::*;

use kube_test_harness::naming::{MAX_SLUG_LEN, object_name, test_id, test_slug, to_snake};

/// Strategy for test names shaped like Rust test paths.
fn rust_test_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z][a-z0-9_]{0,12}", 0..3),
        "test_[a-z0-9_]{1,40}",
    )
        .prop_map(|(modules, func)| {
            let mut parts = modules;
            parts.push(func);
            parts.join("::")
        })
}

/// Strategy for arbitrary printable names, including punctuation.
fn any_name() -> impl Strategy<Value = String> {
    "[ -~]{0,80}"
}

fn is_label_safe(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
        && !s.contains("--")
}

proptest! {
    #[test]
    fn slug_is_non_empty_and_label_safe(name in any_name()) {
        let slug = test_slug(&name);
        prop_assert!(!slug.is_empty());
        prop_assert!(slug.len() <= MAX_SLUG_LEN, "slug too long: {}", slug);
        prop_assert!(is_label_safe(&slug), "unsafe slug {:?} from {:?}", slug, name);
    }

    #[test]
    fn id_has_no_slash(name in any_name(), secs in 0i64..4_000_000_000) {
        let id = test_id(&name, secs);
        prop_assert!(!id.contains('/'));
        let suffix = format!("-{secs}");
        prop_assert!(id.ends_with(&suffix), "{} does not end with {}", id, suffix);
    }

    #[test]
    fn truncated_names_stay_distinct(
        prefix in "[a-z]{45,60}",
        a in "[a-z]{1,8}",
        b in "[a-z]{1,8}",
    ) {
        prop_assume!(a != b);
        let first = format!("test_{prefix}_{a}");
        let second = format!("test_{prefix}_{b}");
        prop_assert_ne!(test_id(&first, 1_700_000_000), test_id(&second, 1_700_000_000));
    }

    #[test]
    fn distinct_test_paths_give_distinct_ids(a in rust_test_path(), b in rust_test_path()) {
        prop_assume!(a != b);
        prop_assert_ne!(test_id(&a, 1_700_000_000), test_id(&b, 1_700_000_000));
    }

    #[test]
    fn distinct_names_give_distinct_ids(a in any_name(), b in any_name()) {
        prop_assume!(a != b);
        prop_assert_ne!(test_id(&a, 1_700_000_000), test_id(&b, 1_700_000_000));
    }

    #[test]
    fn to_snake_is_idempotent(name in any_name()) {
        let once = to_snake(&name);
        prop_assert_eq!(to_snake(&once), once.clone());
    }

    #[test]
    fn namespace_names_fit_in_a_label(name in any_name(), n in 1u64..100_000) {
        let id = test_id(&name, 1_700_000_000);
        let namespace = object_name(&id, "ns", n);
        prop_assert!(namespace.len() <= 63, "{} is {} chars", namespace, namespace.len());
    }
}
