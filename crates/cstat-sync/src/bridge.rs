// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{ClusterPartition, CstatError, SelectionSet};
use serde_json::Value;
use tracing::warn;

/// Selection reported by the visualization surface. Never trusted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalSelection {
    Ordinals(Vec<u32>),
    /// Dense list, one flag per cluster ordinal.
    Flags(Vec<bool>),
}

/// Result of applying an external selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectionOutcome {
    /// The persisted selection differs from what it was before.
    pub changed: bool,
    /// Out-of-range entries that were discarded.
    pub dropped: usize,
}

/// Maps between cluster ordinals and the surface's selection representation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectionBridge;

impl SelectionBridge {
    /// Replaces the partition's selection with the in-range subset of
    /// `selected`. Out-of-range ordinals are dropped and logged.
    pub fn apply_external_selection(
        partition: &mut ClusterPartition,
        selected: impl IntoIterator<Item = u32>,
    ) -> Result<SelectionOutcome, CstatError> {
        let (selection, dropped) = SelectionSet::from_untrusted(selected, partition.len());
        if !dropped.is_empty() {
            warn!(
                dropped = ?dropped,
                clusters = partition.len(),
                "dropping out-of-range selection ordinals"
            );
        }
        Self::replace(partition, selection, dropped.len())
    }

    pub fn apply(
        partition: &mut ClusterPartition,
        selection: &ExternalSelection,
    ) -> Result<SelectionOutcome, CstatError> {
        match selection {
            ExternalSelection::Ordinals(ordinals) => {
                Self::apply_external_selection(partition, ordinals.iter().copied())
            }
            ExternalSelection::Flags(flags) => {
                let (selection, dropped) = SelectionSet::from_flags(flags, partition.len());
                if dropped > 0 {
                    warn!(
                        dropped,
                        flags = flags.len(),
                        clusters = partition.len(),
                        "dropping selection flags past the cluster count"
                    );
                }
                Self::replace(partition, selection, dropped)
            }
        }
    }

    fn replace(
        partition: &mut ClusterPartition,
        selection: SelectionSet,
        dropped: usize,
    ) -> Result<SelectionOutcome, CstatError> {
        let changed = partition.selection() != &selection;
        partition.replace_selection(selection)?;
        Ok(SelectionOutcome { changed, dropped })
    }

    /// One flag per cluster ordinal, `true` iff selected.
    pub fn render_selection(partition: &ClusterPartition) -> Vec<bool> {
        partition.selection().to_flags()
    }

    /// One-hot flags for a hovered cluster; all `false` when `ordinal` is not
    /// a valid ordinal.
    pub fn render_highlight(partition: &ClusterPartition, ordinal: i64) -> Vec<bool> {
        let mut flags = vec![false; partition.len()];
        if let Ok(index) = usize::try_from(ordinal)
            && let Some(flag) = flags.get_mut(index)
        {
            *flag = true;
        }
        flags
    }
}

/// Widget form of a flag list.
pub fn flags_to_bits(flags: &[bool]) -> Vec<u8> {
    flags.iter().map(|flag| u8::from(*flag)).collect()
}

fn ordinal_from_value(value: &Value) -> Option<u32> {
    if let Some(int) = value.as_u64() {
        return u32::try_from(int).ok();
    }
    let float = value.as_f64()?;
    if float >= 0.0 && float.fract() == 0.0 && float <= f64::from(u32::MAX) {
        Some(float as u32)
    } else {
        None
    }
}

fn flag_from_value(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|x| x != 0.0),
        _ => false,
    }
}

fn is_bit(value: &Value) -> bool {
    value.as_u64().is_some_and(|bit| bit <= 1)
}

fn ordinals_from(values: &[Value]) -> Vec<u32> {
    values.iter().filter_map(ordinal_from_value).collect()
}

/// Decodes a selection message from the visualization surface.
///
/// Accepts `{"ordinals": [..]}`, `{"flags": [..]}` (booleans or 0/1), a bare
/// boolean array (flags) or a bare number array (ordinals). Entries that
/// cannot be ordinals are skipped. Returns `None` when the message has none
/// of these shapes.
pub fn parse_external_selection(raw: &str) -> Option<ExternalSelection> {
    decode_selection(raw, None)
}

/// Like [`parse_external_selection`], but a bare list of 0/1 integers with
/// exactly `cluster_count` entries is read as the widget's dense flag list.
pub fn parse_widget_selection(raw: &str, cluster_count: usize) -> Option<ExternalSelection> {
    decode_selection(raw, Some(cluster_count))
}

fn decode_selection(raw: &str, dense_len: Option<usize>) -> Option<ExternalSelection> {
    let value: Value = serde_json::from_str(raw).ok()?;
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(values)) = map.get("ordinals") {
                Some(ExternalSelection::Ordinals(ordinals_from(values)))
            } else if let Some(Value::Array(values)) = map.get("flags") {
                Some(ExternalSelection::Flags(
                    values.iter().map(flag_from_value).collect(),
                ))
            } else {
                None
            }
        }
        Value::Array(values) => {
            if values.is_empty() {
                Some(ExternalSelection::Ordinals(vec![]))
            } else if values.iter().all(Value::is_boolean)
                || (dense_len == Some(values.len()) && values.iter().all(is_bit))
            {
                Some(ExternalSelection::Flags(
                    values.iter().map(flag_from_value).collect(),
                ))
            } else if values.iter().all(Value::is_number) {
                Some(ExternalSelection::Ordinals(ordinals_from(&values)))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ExternalSelection, SelectionBridge, SelectionOutcome, flags_to_bits,
        parse_external_selection, parse_widget_selection,
    };
    use cstat_core::{Cluster, ClusterPartition};

    fn three_clusters() -> ClusterPartition {
        ClusterPartition::new(vec![
            Cluster::new("a", vec![0]),
            Cluster::new("b", vec![1]),
            Cluster::new("c", vec![2]),
        ])
    }

    #[test]
    fn out_of_range_ordinal_is_dropped_silently() {
        let mut partition = three_clusters();
        let outcome = SelectionBridge::apply_external_selection(&mut partition, [0, 2, 5])
            .expect("apply should succeed");

        assert_eq!(
            outcome,
            SelectionOutcome {
                changed: true,
                dropped: 1
            }
        );
        let rendered = SelectionBridge::render_selection(&partition);
        assert_eq!(rendered, vec![true, false, true]);
        assert_eq!(flags_to_bits(&rendered), vec![1, 0, 1]);
    }

    #[test]
    fn reapplying_the_same_selection_is_not_a_change() {
        let mut partition = three_clusters();
        SelectionBridge::apply_external_selection(&mut partition, [1])
            .expect("apply should succeed");
        let outcome = SelectionBridge::apply_external_selection(&mut partition, [1, 1])
            .expect("apply should succeed");
        assert!(!outcome.changed);
    }

    #[test]
    fn flag_lists_are_padded_or_truncated() {
        let mut partition = three_clusters();
        let outcome = SelectionBridge::apply(
            &mut partition,
            &ExternalSelection::Flags(vec![false, true]),
        )
        .expect("short flags should apply");
        assert_eq!(outcome.dropped, 0);
        assert_eq!(SelectionBridge::render_selection(&partition), vec![false, true, false]);

        let outcome = SelectionBridge::apply(
            &mut partition,
            &ExternalSelection::Flags(vec![true, false, false, true, true]),
        )
        .expect("long flags should apply");
        assert_eq!(outcome.dropped, 2);
        assert_eq!(SelectionBridge::render_selection(&partition), vec![true, false, false]);
    }

    #[test]
    fn empty_partition_renders_empty() {
        let mut partition = ClusterPartition::new(vec![]);
        SelectionBridge::apply_external_selection(&mut partition, [0])
            .expect("apply should succeed");
        assert!(SelectionBridge::render_selection(&partition).is_empty());
    }

    #[test]
    fn highlight_is_one_hot_or_blank() {
        let partition = three_clusters();
        assert_eq!(
            SelectionBridge::render_highlight(&partition, 1),
            vec![false, true, false]
        );
        assert_eq!(SelectionBridge::render_highlight(&partition, -1), vec![false; 3]);
        assert_eq!(SelectionBridge::render_highlight(&partition, 3), vec![false; 3]);
    }

    #[test]
    fn parser_accepts_supported_shapes() {
        assert_eq!(
            parse_external_selection(r#"{"ordinals":[0,2,5]}"#),
            Some(ExternalSelection::Ordinals(vec![0, 2, 5]))
        );
        assert_eq!(
            parse_external_selection(r#"{"flags":[1,0,true]}"#),
            Some(ExternalSelection::Flags(vec![true, false, true]))
        );
        assert_eq!(
            parse_external_selection("[true,false]"),
            Some(ExternalSelection::Flags(vec![true, false]))
        );
        assert_eq!(
            parse_external_selection("[3,-1,1.5,2.0]"),
            Some(ExternalSelection::Ordinals(vec![3, 2]))
        );
        assert_eq!(
            parse_external_selection("[]"),
            Some(ExternalSelection::Ordinals(vec![]))
        );
    }

    #[test]
    fn widget_dense_list_matching_cluster_count_is_flags() {
        assert_eq!(
            parse_widget_selection("[1,0,1]", 3),
            Some(ExternalSelection::Flags(vec![true, false, true]))
        );
        assert_eq!(
            parse_widget_selection("[1,0]", 3),
            Some(ExternalSelection::Ordinals(vec![1, 0]))
        );
        assert_eq!(
            parse_widget_selection("[2,0,1]", 3),
            Some(ExternalSelection::Ordinals(vec![2, 0, 1]))
        );
        assert_eq!(
            parse_widget_selection(r#"{"ordinals":[1,0,1]}"#, 3),
            Some(ExternalSelection::Ordinals(vec![1, 0, 1]))
        );
        assert_eq!(
            parse_widget_selection("[1,0,1]", 3),
            parse_external_selection("[true,false,true]")
        );
    }

    #[test]
    fn parser_rejects_garbage() {
        for raw in ["", "not json", "42", r#"{"other":[1]}"#, r#"[1,"a"]"#, "null"] {
            assert_eq!(parse_external_selection(raw), None, "input {raw:?}");
        }
    }
}
