// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::CstatError;
use crate::proxy::ProxySource;

/// Borrowed numeric data view over either f32 or f64 values.
#[derive(Clone, Copy, Debug)]
pub enum DTypeView<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl DTypeView<'_> {
    fn len(&self) -> usize {
        match self {
            Self::F32(slice) => slice.len(),
            Self::F64(slice) => slice.len(),
        }
    }

    fn get(&self, idx: usize) -> Option<f32> {
        match self {
            Self::F32(slice) => slice.get(idx).copied(),
            Self::F64(slice) => slice.get(idx).map(|value| *value as f32),
        }
    }
}

/// Memory layout metadata for underlying point storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryLayout {
    /// Point-major: all dimensions of point 0, then point 1, ...
    CContiguous,
    /// Dimension-major: one contiguous column per dimension.
    FContiguous,
    Strided {
        row_stride: isize,
        col_stride: isize,
    },
}

/// How a source can be read, fixed once when the source is constructed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceCapability {
    /// O(1) random access to any (point, dimension) pair.
    DirectIndexable,
    /// Only whole columns can be materialised, one dimension at a time.
    ColumnExtractable,
}

impl SourceCapability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DirectIndexable => "direct",
            Self::ColumnExtractable => "column",
        }
    }
}

/// Zero-copy view over a borrowed `n x d` point buffer.
#[derive(Clone, Copy, Debug)]
pub struct PointView<'a> {
    pub values: DTypeView<'a>,
    pub n: usize,
    pub d: usize,
    pub layout: MemoryLayout,
    pub dimension_names: Option<&'a [String]>,
}

impl<'a> PointView<'a> {
    /// Constructs a validated `PointView`.
    ///
    /// `n == 0` is accepted (an empty dataset); `d == 0` is not.
    pub fn new(
        values: DTypeView<'a>,
        n: usize,
        d: usize,
        layout: MemoryLayout,
        dimension_names: Option<&'a [String]>,
    ) -> Result<Self, CstatError> {
        if d == 0 {
            return Err(CstatError::invalid_source("d must be >= 1"));
        }

        let expected_len = n
            .checked_mul(d)
            .ok_or_else(|| CstatError::invalid_input("n*d overflow while validating shape"))?;

        match layout {
            MemoryLayout::CContiguous | MemoryLayout::FContiguous => {
                let value_len = values.len();
                if value_len != expected_len {
                    return Err(CstatError::invalid_input(format!(
                        "value length mismatch: got {value_len}, expected {expected_len} (n={n}, d={d})"
                    )));
                }
            }
            MemoryLayout::Strided {
                row_stride,
                col_stride,
            } => {
                if row_stride == 0 || col_stride == 0 {
                    return Err(CstatError::invalid_input(format!(
                        "Strided layout requires non-zero strides: row_stride={row_stride}, col_stride={col_stride}"
                    )));
                }
            }
        }

        Ok(Self {
            values,
            n,
            d,
            layout,
            dimension_names,
        })
    }

    /// Convenience constructor for point-major f32 data.
    pub fn from_f32(
        values: &'a [f32],
        n: usize,
        d: usize,
        layout: MemoryLayout,
        dimension_names: Option<&'a [String]>,
    ) -> Result<Self, CstatError> {
        Self::new(DTypeView::F32(values), n, d, layout, dimension_names)
    }

    /// Convenience constructor for f64 data; values are narrowed to f32 on read.
    pub fn from_f64(
        values: &'a [f64],
        n: usize,
        d: usize,
        layout: MemoryLayout,
        dimension_names: Option<&'a [String]>,
    ) -> Result<Self, CstatError> {
        Self::new(DTypeView::F64(values), n, d, layout, dimension_names)
    }

    /// Reads the value of `point` in dimension `dim`.
    pub fn value_at(&self, point: usize, dim: usize) -> Result<f32, CstatError> {
        if point >= self.n {
            return Err(CstatError::out_of_range(format!(
                "point index {point} >= n={}",
                self.n
            )));
        }
        if dim >= self.d {
            return Err(CstatError::out_of_range(format!(
                "dimension {dim} >= d={}",
                self.d
            )));
        }

        let idx = match self.layout {
            // Bounds above keep these products below n*d, which was checked at construction.
            MemoryLayout::CContiguous => point * self.d + dim,
            MemoryLayout::FContiguous => dim * self.n + point,
            MemoryLayout::Strided {
                row_stride,
                col_stride,
            } => strided_linear_index(point, dim, row_stride, col_stride, self.values.len())?,
        };

        self.values.get(idx).ok_or_else(|| {
            CstatError::out_of_range(format!(
                "buffer index {idx} out of bounds at point={point}, dim={dim}"
            ))
        })
    }

    /// Materialises column `dim` as `n` values, one per point.
    pub fn column(&self, dim: usize) -> Result<Vec<f32>, CstatError> {
        if dim >= self.d {
            return Err(CstatError::out_of_range(format!(
                "dimension {dim} >= d={}",
                self.d
            )));
        }
        if let (MemoryLayout::FContiguous, DTypeView::F32(values)) = (self.layout, self.values) {
            let column = dim
                .checked_mul(self.n)
                .and_then(|start| values.get(start..start.checked_add(self.n)?));
            return column.map(<[f32]>::to_vec).ok_or_else(|| {
                CstatError::out_of_range(format!(
                    "column {dim} with n={} exceeds value buffer of length {}",
                    self.n,
                    values.len()
                ))
            });
        }
        (0..self.n)
            .map(|point| self.value_at(point, dim))
            .collect()
    }
}

fn strided_linear_index(
    point: usize,
    dim: usize,
    row_stride: isize,
    col_stride: isize,
    len: usize,
) -> Result<usize, CstatError> {
    let point_isize = isize::try_from(point).map_err(|_| {
        CstatError::out_of_range(format!(
            "strided index overflow: point={point} does not fit into isize"
        ))
    })?;
    let dim_isize = isize::try_from(dim).map_err(|_| {
        CstatError::out_of_range(format!(
            "strided index overflow: dim={dim} does not fit into isize"
        ))
    })?;

    let index = point_isize
        .checked_mul(row_stride)
        .and_then(|left| {
            dim_isize
                .checked_mul(col_stride)
                .and_then(|right| left.checked_add(right))
        })
        .ok_or_else(|| {
            CstatError::out_of_range(format!(
                "strided index overflow at point={point}, dim={dim}, row_stride={row_stride}, col_stride={col_stride}"
            ))
        })?;

    let index_usize = usize::try_from(index).map_err(|_| {
        CstatError::out_of_range(format!(
            "strided index negative at point={point}, dim={dim}: idx={index}"
        ))
    })?;

    if index_usize >= len {
        return Err(CstatError::out_of_range(format!(
            "strided index out of bounds at point={point}, dim={dim}: idx={index_usize}, len={len}"
        )));
    }

    Ok(index_usize)
}

/// Uniform accessor over direct and proxy point storage, borrowed for the
/// duration of one aggregation pass.
#[derive(Clone, Copy)]
pub enum PointSource<'a> {
    Direct(PointView<'a>),
    Proxy(&'a dyn ProxySource),
}

impl<'a> PointSource<'a> {
    pub fn num_points(&self) -> usize {
        match self {
            Self::Direct(view) => view.n,
            Self::Proxy(proxy) => proxy.num_points(),
        }
    }

    pub fn num_dimensions(&self) -> usize {
        match self {
            Self::Direct(view) => view.d,
            Self::Proxy(proxy) => proxy.num_dimensions(),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::Proxy(_))
    }

    pub fn capability(&self) -> SourceCapability {
        match self {
            Self::Direct(_) => SourceCapability::DirectIndexable,
            Self::Proxy(_) => SourceCapability::ColumnExtractable,
        }
    }

    pub fn dimension_names(&self) -> Option<&'a [String]> {
        match self {
            Self::Direct(view) => view.dimension_names,
            Self::Proxy(proxy) => proxy.dimension_names(),
        }
    }

    /// Rejects sources with no dimensions.
    pub fn validate(&self) -> Result<(), CstatError> {
        if self.num_dimensions() == 0 {
            return Err(CstatError::invalid_source(
                "point source must have at least one dimension; got d=0",
            ));
        }
        Ok(())
    }

    /// Random access read. Proxy sources cannot serve single elements and
    /// must be read through [`PointSource::extract_dimension`].
    pub fn value_at(&self, point: usize, dim: usize) -> Result<f32, CstatError> {
        match self {
            Self::Direct(view) => view.value_at(point, dim),
            Self::Proxy(_) => Err(CstatError::not_supported(
                "proxy sources only support per-dimension column extraction",
            )),
        }
    }

    /// Materialises one dimension as a column of exactly `num_points` values.
    pub fn extract_dimension(&self, dim: usize) -> Result<Vec<f32>, CstatError> {
        let d = self.num_dimensions();
        if dim >= d {
            return Err(CstatError::out_of_range(format!("dimension {dim} >= d={d}")));
        }
        let column = match self {
            Self::Direct(view) => view.column(dim)?,
            Self::Proxy(proxy) => proxy.extract_dimension(dim).map_err(|err| match err {
                CstatError::InvalidSource(_) => err,
                other => CstatError::invalid_source(format!(
                    "proxy extraction failed for dimension {dim}: {other}"
                )),
            })?,
        };
        let n = self.num_points();
        if column.len() != n {
            return Err(CstatError::invalid_source(format!(
                "extracted column {dim} has {} values, expected n={n}",
                column.len()
            )));
        }
        Ok(column)
    }

    /// Dimension names for display, one per dimension.
    ///
    /// Falls back to `"dimension <i>"` for every entry when the source has no
    /// names or the count does not match `d`.
    pub fn resolved_dimension_names(&self) -> Vec<String> {
        let d = self.num_dimensions();
        match self.dimension_names() {
            Some(names) if names.len() == d => names.to_vec(),
            _ => (0..d).map(|i| format!("dimension {i}")).collect(),
        }
    }
}

impl std::fmt::Debug for PointSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointSource")
            .field("capability", &self.capability())
            .field("n", &self.num_points())
            .field("d", &self.num_dimensions())
            .finish()
    }
}
