//! Property-based test generators using proptest.
//!
//! Provides strategies for generating revisions, KV keys and payloads.

use certsync_protocol::Revision;
use proptest::prelude::*;

/// Strategy for generating a single non-zero revision.
pub fn revision_strategy() -> impl Strategy<Value = Revision> {
    (1u64..=u64::MAX / 2).prop_map(Revision::new)
}

/// Strategy for generating a sequence of arbitrary (possibly repeating,
/// possibly decreasing) revisions as a store might report across passes.
pub fn revision_sequence_strategy() -> impl Strategy<Value = Vec<Revision>> {
    prop::collection::vec(1u64..64, 1..24)
        .prop_map(|raw| raw.into_iter().map(Revision::new).collect())
}

/// Strategy for generating a strictly increasing revision sequence.
pub fn increasing_revisions_strategy() -> impl Strategy<Value = Vec<Revision>> {
    prop::collection::vec(1u64..1_000, 1..16).prop_map(|steps| {
        let mut current = 0u64;
        steps
            .into_iter()
            .map(|step| {
                current += step;
                Revision::new(current)
            })
            .collect()
    })
}

/// Strategy for generating KV keys shaped like `/service/<name>/tls`.
pub fn kv_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("/[a-z]{1,12}(/[a-z0-9_-]{1,12}){0,3}").expect("Invalid regex")
}

/// Strategy for generating PEM-looking text with arbitrary base64 bodies.
pub fn pem_like_strategy(label: &'static str) -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::string::string_regex("[A-Za-z0-9+/]{1,64}").expect("Invalid regex"),
        1..8,
    )
    .prop_map(move |lines| {
        format!(
            "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
            lines.join("\n")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn increasing_is_strictly_increasing(revs in increasing_revisions_strategy()) {
            for pair in revs.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            prop_assert!(revs[0] > Revision::ZERO);
        }

        #[test]
        fn keys_are_absolute(key in kv_key_strategy()) {
            prop_assert!(key.starts_with('/'));
        }

        #[test]
        fn pem_like_has_armor(text in pem_like_strategy("CERTIFICATE")) {
            prop_assert!(text.starts_with("-----BEGIN CERTIFICATE-----\n"));
            prop_assert!(text.ends_with("-----END CERTIFICATE-----\n"));
        }
    }
}
