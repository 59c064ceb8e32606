// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

use cstat_core::{Cluster, ClusterPartition, ComposedProxy, PointBuffer, SourceHandle};
use std::sync::Arc;

pub const N: usize = 12;
pub const D: usize = 3;

pub fn point_values(n: usize, d: usize, offset: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(n * d);
    for p in 0..n {
        for dim in 0..d {
            values.push(((p + offset) * (dim + 1)) as f32 + 0.5 * dim as f32);
        }
    }
    values
}

pub fn dimension_names() -> Vec<String> {
    (0..D).map(|dim| format!("marker_{dim}")).collect()
}

pub fn direct_source() -> SourceHandle {
    SourceHandle::from(
        PointBuffer::new(point_values(N, D, 0), N, D)
            .expect("fixture buffer should be valid")
            .with_dimension_names(dimension_names()),
    )
}

/// Same logical points as [`direct_source`], split over two members.
pub fn proxy_source() -> SourceHandle {
    let head = PointBuffer::new(point_values(5, D, 0), 5, D)
        .expect("head buffer should be valid")
        .with_dimension_names(dimension_names());
    let tail = PointBuffer::new(point_values(N - 5, D, 5), N - 5, D)
        .expect("tail buffer should be valid");
    SourceHandle::from(
        ComposedProxy::new(vec![Arc::new(head), Arc::new(tail)]).expect("members share d"),
    )
}

pub fn partition() -> ClusterPartition {
    ClusterPartition::new(vec![
        Cluster::new("first", vec![0, 1, 2, 3]),
        Cluster::new("second", vec![4, 5, 6, 7]),
        Cluster::new("", vec![8, 9, 10, 11]),
    ])
}
