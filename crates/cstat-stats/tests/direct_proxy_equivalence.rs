// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{
    Cluster, ClusterPartition, ComposedProxy, MemoryLayout, PointBuffer, PointSource, PointView,
    SourceCapability, SourceHandle,
};
use cstat_stats::StatisticsAggregator;
use std::sync::Arc;

const N: usize = 48;
const D: usize = 5;

fn point_major_values(n: usize, d: usize, offset: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(n * d);
    for p in 0..n {
        for dim in 0..d {
            let x = (p + offset) as f32 + 1.0;
            let y = dim as f32 + 1.0;
            values.push((0.3 * x).sin() * 10.0 + 0.25 * x * y - y);
        }
    }
    values
}

fn transpose(values: &[f32], n: usize, d: usize) -> Vec<f32> {
    let mut out = vec![0.0; n * d];
    for p in 0..n {
        for dim in 0..d {
            out[dim * n + p] = values[p * d + dim];
        }
    }
    out
}

fn partition() -> ClusterPartition {
    ClusterPartition::new(vec![
        Cluster::new("evens", (0..N as u32).step_by(2).collect()),
        Cluster::new("odds", (1..N as u32).step_by(2).collect()),
        Cluster::new("tail", vec![47, 46, 45, 44]),
        Cluster::new("empty", vec![]),
        Cluster::new("repeat", vec![3, 3, 3, 9]),
    ])
}

fn aggregate(source: &PointSource<'_>) -> ClusterPartition {
    let mut partition = partition();
    StatisticsAggregator::default()
        .compute_statistics(source, &mut partition)
        .expect("aggregation should succeed");
    partition
}

fn assert_bit_identical(label: &str, expected: &ClusterPartition, actual: &ClusterPartition) {
    for (a, b) in expected.clusters().iter().zip(actual.clusters()) {
        for dim in 0..D {
            assert_eq!(
                a.mean[dim].to_bits(),
                b.mean[dim].to_bits(),
                "{label} mean mismatch for cluster '{}' at dim={dim}",
                a.name
            );
            assert_eq!(
                a.stddev[dim].to_bits(),
                b.stddev[dim].to_bits(),
                "{label} stddev mismatch for cluster '{}' at dim={dim}",
                a.name
            );
        }
    }
}

#[test]
fn column_major_and_strided_layouts_match_point_major() {
    let values = point_major_values(N, D, 0);
    let direct = PointView::from_f32(&values, N, D, MemoryLayout::CContiguous, None)
        .expect("point-major view should be valid");
    let expected = aggregate(&PointSource::Direct(direct));

    let columns = transpose(&values, N, D);
    let column_major = PointView::from_f32(&columns, N, D, MemoryLayout::FContiguous, None)
        .expect("column-major view should be valid");
    assert_bit_identical("FContiguous", &expected, &aggregate(&PointSource::Direct(column_major)));

    let strided = PointView::from_f32(
        &columns,
        N,
        D,
        MemoryLayout::Strided {
            row_stride: 1,
            col_stride: N as isize,
        },
        None,
    )
    .expect("strided view should be valid");
    assert_bit_identical("Strided", &expected, &aggregate(&PointSource::Direct(strided)));
}

#[test]
fn composed_proxy_matches_concatenated_direct_buffer() {
    let head = point_major_values(20, D, 0);
    let tail = point_major_values(N - 20, D, 20);
    let mut all = head.clone();
    all.extend_from_slice(&tail);

    let direct = PointView::from_f32(&all, N, D, MemoryLayout::CContiguous, None)
        .expect("direct view should be valid");
    let expected = aggregate(&PointSource::Direct(direct));

    let proxy = ComposedProxy::new(vec![
        Arc::new(PointBuffer::new(head, 20, D).expect("head buffer should be valid")),
        Arc::new(PointBuffer::new(tail, N - 20, D).expect("tail buffer should be valid")),
    ])
    .expect("members share d");
    let handle = SourceHandle::from(proxy);
    let source = handle.as_source();
    assert_eq!(source.capability(), SourceCapability::ColumnExtractable);
    assert_eq!(source.num_points(), N);

    let mut actual = partition();
    let diagnostics = StatisticsAggregator::default()
        .compute_statistics(&source, &mut actual)
        .expect("proxy aggregation should succeed");

    assert_eq!(diagnostics.columns_extracted, D);
    assert_eq!(diagnostics.degenerate_clusters, vec![3]);
    assert_bit_identical("ComposedProxy", &expected, &actual);
}

#[test]
fn f64_input_is_narrowed_before_aggregation() {
    let narrow = point_major_values(N, D, 0);
    let wide = narrow.iter().map(|v| f64::from(*v)).collect::<Vec<_>>();

    let from_f32 = PointView::from_f32(&narrow, N, D, MemoryLayout::CContiguous, None)
        .expect("f32 view should be valid");
    let from_f64 = PointView::from_f64(&wide, N, D, MemoryLayout::CContiguous, None)
        .expect("f64 view should be valid");

    assert_bit_identical(
        "f64",
        &aggregate(&PointSource::Direct(from_f32)),
        &aggregate(&PointSource::Direct(from_f64)),
    );
}
