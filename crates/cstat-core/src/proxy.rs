// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CstatError;
use crate::point_source::{MemoryLayout, PointSource, PointView};
use std::sync::Arc;

/// A virtual point collection that can only be read one dimension at a time.
///
/// Implementations may allocate a fresh column on every call; callers are
/// expected to extract each dimension at most once per aggregation pass.
pub trait ProxySource {
    fn num_points(&self) -> usize;

    fn num_dimensions(&self) -> usize;

    fn dimension_names(&self) -> Option<&[String]> {
        None
    }

    /// Returns exactly `num_points()` values for dimension `dim`, indexed by
    /// point index.
    fn extract_dimension(&self, dim: usize) -> Result<Vec<f32>, CstatError>;
}

/// Owned point-major `f32` point buffer with optional dimension names.
#[derive(Clone, Debug, PartialEq)]
pub struct PointBuffer {
    values: Vec<f32>,
    n: usize,
    d: usize,
    dimension_names: Vec<String>,
}

impl PointBuffer {
    pub fn new(values: Vec<f32>, n: usize, d: usize) -> Result<Self, CstatError> {
        // Reuse the view validation so owned and borrowed shapes agree.
        PointView::from_f32(&values, n, d, MemoryLayout::CContiguous, None)?;
        Ok(Self {
            values,
            n,
            d,
            dimension_names: vec![],
        })
    }

    /// Attaches dimension names. Any count is accepted; display code falls
    /// back to placeholders when it does not match `d`.
    pub fn with_dimension_names(mut self, names: Vec<String>) -> Self {
        self.dimension_names = names;
        self
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn d(&self) -> usize {
        self.d
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension_names(&self) -> &[String] {
        &self.dimension_names
    }

    pub fn as_view(&self) -> PointView<'_> {
        PointView {
            values: crate::point_source::DTypeView::F32(&self.values),
            n: self.n,
            d: self.d,
            layout: MemoryLayout::CContiguous,
            dimension_names: if self.dimension_names.is_empty() {
                None
            } else {
                Some(&self.dimension_names)
            },
        }
    }
}

/// Virtual dataset formed by concatenating the points of several member
/// buffers that share one dimension count.
///
/// Point `i` of the proxy is point `i - offset(m)` of member `m`. There is no
/// single backing buffer, so only column extraction is offered.
#[derive(Clone, Debug)]
pub struct ComposedProxy {
    members: Vec<Arc<PointBuffer>>,
    n: usize,
    d: usize,
    dimension_names: Vec<String>,
}

impl ComposedProxy {
    pub fn new(members: Vec<Arc<PointBuffer>>) -> Result<Self, CstatError> {
        let first = members.first().ok_or_else(|| {
            CstatError::invalid_source("composed proxy requires at least one member")
        })?;
        let d = first.d();
        if d == 0 {
            return Err(CstatError::invalid_source(
                "composed proxy members must have d >= 1",
            ));
        }

        let mut n = 0usize;
        for (idx, member) in members.iter().enumerate() {
            if member.d() != d {
                return Err(CstatError::invalid_source(format!(
                    "composed proxy member {idx} has d={}, expected d={d}",
                    member.d()
                )));
            }
            n = n.checked_add(member.n()).ok_or_else(|| {
                CstatError::invalid_source("composed proxy point count overflow")
            })?;
        }

        let dimension_names = first.dimension_names().to_vec();
        Ok(Self {
            members,
            n,
            d,
            dimension_names,
        })
    }

    pub fn members(&self) -> &[Arc<PointBuffer>] {
        &self.members
    }
}

impl ProxySource for ComposedProxy {
    fn num_points(&self) -> usize {
        self.n
    }

    fn num_dimensions(&self) -> usize {
        self.d
    }

    fn dimension_names(&self) -> Option<&[String]> {
        if self.dimension_names.is_empty() {
            None
        } else {
            Some(&self.dimension_names)
        }
    }

    fn extract_dimension(&self, dim: usize) -> Result<Vec<f32>, CstatError> {
        if dim >= self.d {
            return Err(CstatError::out_of_range(format!(
                "dimension {dim} >= d={}",
                self.d
            )));
        }
        let mut column = Vec::with_capacity(self.n);
        for member in &self.members {
            column.extend(member.as_view().column(dim)?);
        }
        Ok(column)
    }
}

/// Owned, shareable handle over a point source, held by long-lived bindings.
#[derive(Clone)]
pub enum SourceHandle {
    Direct(Arc<PointBuffer>),
    Proxy(Arc<dyn ProxySource + Send + Sync>),
}

impl SourceHandle {
    /// Borrows the handle as a [`PointSource`] for one aggregation pass.
    pub fn as_source(&self) -> PointSource<'_> {
        match self {
            Self::Direct(buffer) => PointSource::Direct(buffer.as_view()),
            Self::Proxy(proxy) => PointSource::Proxy(proxy.as_ref()),
        }
    }

    pub fn num_points(&self) -> usize {
        self.as_source().num_points()
    }

    pub fn num_dimensions(&self) -> usize {
        self.as_source().num_dimensions()
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.as_source(), f)
    }
}

impl From<PointBuffer> for SourceHandle {
    fn from(buffer: PointBuffer) -> Self {
        Self::Direct(Arc::new(buffer))
    }
}

impl From<ComposedProxy> for SourceHandle {
    fn from(proxy: ComposedProxy) -> Self {
        Self::Proxy(Arc::new(proxy))
    }
}

#[cfg(test)]
mod tests {
    use super::{ComposedProxy, PointBuffer, ProxySource, SourceHandle};
    use crate::{CstatError, SourceCapability};
    use std::sync::Arc;

    fn buffer(values: &[f32], n: usize, d: usize) -> Arc<PointBuffer> {
        Arc::new(PointBuffer::new(values.to_vec(), n, d).expect("valid buffer"))
    }

    #[test]
    fn composed_proxy_concatenates_member_columns() {
        let proxy = ComposedProxy::new(vec![
            buffer(&[1.0, 10.0, 2.0, 20.0], 2, 2),
            buffer(&[3.0, 30.0, 4.0, 40.0], 2, 2),
        ])
        .expect("members share d");

        assert_eq!(proxy.num_points(), 4);
        assert_eq!(proxy.num_dimensions(), 2);
        assert_eq!(
            proxy.extract_dimension(1).expect("in range"),
            vec![10.0, 20.0, 30.0, 40.0]
        );
    }

    #[test]
    fn composed_proxy_rejects_mismatched_dimensions() {
        let err = ComposedProxy::new(vec![
            buffer(&[1.0, 2.0], 1, 2),
            buffer(&[1.0, 2.0, 3.0], 1, 3),
        ])
        .expect_err("mismatched d must fail");
        assert!(matches!(err, CstatError::InvalidSource(_)));

        let empty = ComposedProxy::new(vec![]).expect_err("no members must fail");
        assert!(empty.to_string().contains("at least one member"));
    }

    #[test]
    fn proxy_handle_refuses_single_element_access() {
        let proxy = ComposedProxy::new(vec![buffer(&[1.0, 2.0], 2, 1)]).expect("valid");
        let handle = SourceHandle::from(proxy);
        let source = handle.as_source();

        assert!(source.is_proxy());
        assert_eq!(source.capability(), SourceCapability::ColumnExtractable);
        let err = source.value_at(0, 0).expect_err("proxy has no random access");
        assert!(matches!(err, CstatError::NotSupported(_)));
        assert_eq!(source.extract_dimension(0).expect("in range"), vec![1.0, 2.0]);
    }

    #[test]
    fn buffer_names_flow_into_views() {
        let named = PointBuffer::new(vec![1.0, 2.0], 1, 2)
            .expect("valid")
            .with_dimension_names(vec!["a".into(), "b".into()]);
        let handle = SourceHandle::from(named);
        assert_eq!(
            handle.as_source().resolved_dimension_names(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(handle.num_points(), 1);
    }
}
