// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{Cluster, ClusterPartition};
use cstat_sync::{ExternalSelection, SelectionBridge, parse_external_selection};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use std::collections::BTreeSet;

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

fn partition_of(len: usize) -> ClusterPartition {
    ClusterPartition::new(
        (0..len)
            .map(|i| Cluster::new(format!("c{i}"), vec![i as u32]))
            .collect(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_selection.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn render_after_apply_marks_exactly_valid_ordinals(
        len in 0usize..24,
        selected in prop::collection::vec(0u32..48, 0..32),
    ) {
        let mut partition = partition_of(len);
        let outcome = SelectionBridge::apply_external_selection(&mut partition, selected.iter().copied())
            .expect("validated selection always applies");
        let rendered = SelectionBridge::render_selection(&partition);

        let valid = selected
            .iter()
            .copied()
            .filter(|ordinal| (*ordinal as usize) < len)
            .collect::<BTreeSet<_>>();
        prop_assert_eq!(rendered.len(), len);
        for (ordinal, flag) in rendered.iter().enumerate() {
            prop_assert_eq!(*flag, valid.contains(&(ordinal as u32)));
        }
        prop_assert_eq!(outcome.dropped, selected.iter().filter(|o| **o as usize >= len).count());
    }

    #[test]
    fn rendered_flags_reapply_to_the_same_selection(
        len in 0usize..24,
        selected in prop::collection::vec(0u32..24, 0..32),
    ) {
        let mut partition = partition_of(len);
        SelectionBridge::apply_external_selection(&mut partition, selected)
            .expect("validated selection always applies");
        let rendered = SelectionBridge::render_selection(&partition);

        let mut other = partition_of(len);
        SelectionBridge::apply(&mut other, &ExternalSelection::Flags(rendered.clone()))
            .expect("flags always apply");
        prop_assert_eq!(SelectionBridge::render_selection(&other), rendered);
    }

    #[test]
    fn parser_never_panics_on_arbitrary_text(raw in ".{0,64}") {
        let _ = parse_external_selection(&raw);
    }
}
