// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use cstat_core::{Cluster, ClusterPartition, ComposedProxy, CstatError, PointBuffer};
use std::sync::Arc;

/// Deterministic point-major values.
pub fn generate_points(n: usize, d: usize) -> Vec<f32> {
    let mut values = Vec::with_capacity(n * d);
    for p in 0..n {
        for dim in 0..d {
            let x = p as f32 + 1.0;
            let y = dim as f32 + 1.0;
            values.push((0.03 * x).sin() * y + (0.07 * y).cos() + 0.001 * x);
        }
    }
    values
}

/// `k` clusters that together cover every point exactly once.
pub fn round_robin_partition(n: usize, k: usize) -> ClusterPartition {
    let k = k.max(1);
    let mut indices = vec![Vec::with_capacity(n / k + 1); k];
    for p in 0..n {
        indices[p % k].push(p as u32);
    }
    ClusterPartition::new(
        indices
            .into_iter()
            .enumerate()
            .map(|(i, members)| Cluster::new(format!("cluster {i}"), members))
            .collect(),
    )
}

/// The same points as [`generate_points`], split into `parts` members.
pub fn composed_proxy(n: usize, d: usize, parts: usize) -> Result<ComposedProxy, CstatError> {
    let values = generate_points(n, d);
    let rows_per_part = n.div_ceil(parts.clamp(1, n.max(1))).max(1);
    let members = values
        .chunks(rows_per_part * d.max(1))
        .map(|chunk| PointBuffer::new(chunk.to_vec(), chunk.len() / d.max(1), d).map(Arc::new))
        .collect::<Result<Vec<_>, _>>()?;
    ComposedProxy::new(members)
}
