// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use cstat_core::{Cluster, ClusterPartition};
use cstat_sync::{
    ExternalSelection, SelectionBridge, SyncConfig, SyncController, SyncEvent,
    parse_external_selection,
};
use libfuzzer_sys::fuzz_target;

fn build_partition(cursor: &mut common::ByteCursor<'_>, n: usize) -> ClusterPartition {
    let clusters = common::bounded(cursor.next_u8(), 0, 12);
    ClusterPartition::new(
        (0..clusters)
            .map(|i| {
                let len = common::bounded(cursor.next_u8(), 0, 6);
                let indices = (0..len)
                    .map(|_| (usize::from(cursor.next_u8()) % n.max(1)) as u32)
                    .collect();
                Cluster::new(format!("c{i}"), indices)
            })
            .collect(),
    )
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);
    let n = common::bounded(cursor.next_u8(), 1, 32);
    let d = common::bounded(cursor.next_u8(), 1, 4);
    let mut partition = build_partition(&mut cursor, n);
    let highlight = i64::from(cursor.next_i16());
    let text = String::from_utf8_lossy(cursor.rest()).into_owned();

    let Some(selection) = parse_external_selection(&text) else {
        return;
    };
    let Ok(outcome) = SelectionBridge::apply(&mut partition, &selection) else {
        return;
    };
    let rendered = SelectionBridge::render_selection(&partition);
    assert_eq!(rendered.len(), partition.len());
    assert!(outcome.dropped <= match &selection {
        ExternalSelection::Ordinals(ordinals) => ordinals.len(),
        ExternalSelection::Flags(flags) => flags.len(),
    });
    let highlighted = SelectionBridge::render_highlight(&partition, highlight);
    assert!(highlighted.iter().filter(|flag| **flag).count() <= 1);

    let source = cstat_core::PointBuffer::new(vec![0.5; n * d], n, d)
        .map(cstat_core::SourceHandle::from);
    let Ok(source) = source else {
        return;
    };
    let Ok(mut controller) = SyncController::new(SyncConfig::default()) else {
        return;
    };
    let events = [
        SyncEvent::BindPointSource {
            name: "points".to_string(),
            source,
        },
        SyncEvent::BindClusterPartition {
            name: "clusters".to_string(),
            partition,
        },
        SyncEvent::UpstreamDataChanged,
        SyncEvent::ExternalSelection(selection),
        SyncEvent::Highlight { ordinal: highlight },
    ];
    for event in events {
        let _ = controller.handle(event);
    }
});
