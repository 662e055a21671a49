//! Property tests for chain and merge invariants.
//!
//! Uses proptest to verify:
//! 1. Path resolution is deterministic and shaped `loa/ns/name/args/...`
//! 2. Chains with a base anywhere but the tail are rejected
//! 3. Name disambiguation yields unique names and keeps first occurrences

use proptest::prelude::*;
use std::collections::HashSet;
use queryset_core::data::distinct_names;
use queryset_core::domain::{
    resolve, Argument, ChainError, LevelOfAnalysis, Namespace, Operation, OperationChain,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,8}(\\.[a-z_]{1,8})?"
}

fn arb_argument() -> impl Strategy<Value = Argument> {
    prop_oneof![
        (-24i64..24).prop_map(Argument::Int),
        "[a-z][a-z0-9]{0,5}".prop_map(Argument::Str),
    ]
}

fn arb_operation(namespace: Namespace) -> impl Strategy<Value = Operation> {
    (arb_name(), prop::collection::vec(arb_argument(), 0..3))
        .prop_map(move |(name, args)| Operation::new(namespace, name, args).unwrap())
}

fn arb_chain() -> impl Strategy<Value = OperationChain> {
    (
        prop::collection::vec(arb_operation(Namespace::Transform), 0..4),
        arb_operation(Namespace::Base),
    )
        .prop_map(|(mut transforms, base)| {
            transforms.push(base);
            OperationChain::new(transforms).unwrap()
        })
}

fn arb_loa() -> impl Strategy<Value = LevelOfAnalysis> {
    prop_oneof![
        Just("priogrid_month"),
        Just("country_month"),
        Just("country_year"),
    ]
    .prop_map(|s| LevelOfAnalysis::new(s).unwrap())
}

// ── 1. Path resolution ───────────────────────────────────────────────

proptest! {
    #[test]
    fn resolution_is_deterministic(chain in arb_chain(), loa in arb_loa()) {
        let first = resolve(&chain, &loa);
        let second = resolve(&chain.clone(), &loa);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn resolution_has_three_segments_per_operation(chain in arb_chain(), loa in arb_loa()) {
        let path = resolve(&chain, &loa);
        let segments: Vec<&str> = path.split('/').collect();
        prop_assert_eq!(segments.len(), 1 + 3 * chain.len());
        prop_assert_eq!(segments[0], loa.as_str());
        prop_assert_eq!(segments[segments.len() - 3], "base");
    }

    #[test]
    fn pipeline_roundtrip(chain in arb_chain()) {
        let reparsed = OperationChain::from_pipeline(&chain.to_pipeline()).unwrap();
        let loa = LevelOfAnalysis::new("country_month").unwrap();
        prop_assert_eq!(resolve(&reparsed, &loa), resolve(&chain, &loa));
    }
}

// ── 2. Chain validation ──────────────────────────────────────────────

proptest! {
    #[test]
    fn base_before_tail_is_rejected(
        chain in arb_chain(),
        extra in arb_operation(Namespace::Transform),
    ) {
        // Appending a transform after the base makes the base non-terminal.
        let mut ops = chain.operations().to_vec();
        ops.push(extra);
        let err = OperationChain::new(ops).unwrap_err();
        let is_base_not_terminal = matches!(err, ChainError::BaseNotTerminal { .. });
        prop_assert!(is_base_not_terminal);
    }
}

// ── 3. Name disambiguation ───────────────────────────────────────────

proptest! {
    #[test]
    fn distinct_names_are_unique(names in prop::collection::vec("[ab_]{1,3}", 0..12)) {
        let out = distinct_names(&names);
        prop_assert_eq!(out.len(), names.len());
        let unique: HashSet<&String> = out.iter().collect();
        prop_assert_eq!(unique.len(), out.len());
    }

    #[test]
    fn renames_only_prepend_underscores(names in prop::collection::vec("[ab]{1,2}", 1..12)) {
        let out = distinct_names(&names);
        for (original, renamed) in names.iter().zip(out.iter()) {
            let prefix = &renamed[..renamed.len() - original.len()];
            prop_assert!(renamed.ends_with(original.as_str()));
            prop_assert!(prefix.chars().all(|c| c == '_'));
        }
        prop_assert_eq!(&out[0], &names[0]);
    }
}
