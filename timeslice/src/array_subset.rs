//! Array subsets.
//!
//! An [`ArraySubset`] is a rectangular region of an array, defined by a start and a shape.

use std::{fmt::Display, num::NonZeroU64, ops::Range};

use itertools::izip;
use thiserror::Error;

/// An array subset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ArraySubset {
    start: Vec<u64>,
    shape: Vec<u64>,
}

/// An incompatible dimensionality error.
#[derive(Clone, Debug, Error)]
#[error("incompatible dimensionality {_0}, expected {_1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

impl Display for ArraySubset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_ranges()).finish()
    }
}

impl ArraySubset {
    /// Create a new array subset from `ranges`.
    #[must_use]
    pub fn new_with_ranges(ranges: &[Range<u64>]) -> Self {
        let start = ranges.iter().map(|range| range.start).collect();
        let shape = ranges
            .iter()
            .map(|range| range.end.saturating_sub(range.start))
            .collect();
        Self { start, shape }
    }

    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: Vec<u64>) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the size of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: Vec<u64>,
        shape: Vec<u64>,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError(start.len(), shape.len()))
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> Vec<u64> {
        izip!(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the array subset as a vec of ranges.
    #[must_use]
    pub fn to_ranges(&self) -> Vec<Range<u64>> {
        izip!(&self.start, &self.shape)
            .map(|(&start, &size)| start..start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    ///
    /// Equal to the product of the components of its shape.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the array subset contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&size| size == 0)
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds_shape(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(self.end_exc(), array_shape).all(|(end, &size)| end <= size)
    }

    /// Return the overlapping subset between this array subset and `subset_other`.
    ///
    /// The overlap is empty if the subsets are disjoint.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the dimensionality of `subset_other` does not match the dimensionality of this array subset.
    pub fn overlap(&self, subset_other: &Self) -> Result<Self, IncompatibleDimensionalityError> {
        if subset_other.dimensionality() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError(
                subset_other.dimensionality(),
                self.dimensionality(),
            ));
        }
        let ranges: Vec<_> = izip!(self.to_ranges(), subset_other.to_ranges())
            .map(|(a, b)| {
                let start = a.start.max(b.start);
                start..a.end.min(b.end).max(start)
            })
            .collect();
        Ok(Self::new_with_ranges(&ranges))
    }

    /// Return this array subset relative to `start`.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` does not match the dimensionality of this array subset.
    pub fn relative_to(&self, start: &[u64]) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError(
                start.len(),
                self.dimensionality(),
            ));
        }
        Ok(Self {
            start: izip!(&self.start, start)
                .map(|(a, b)| a.saturating_sub(*b))
                .collect(),
            shape: self.shape.clone(),
        })
    }

    /// Return the indices of the chunks of a regular grid with `chunk_shape` which intersect this array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `chunk_shape` does not match the dimensionality of this array subset.
    pub fn chunks(
        &self,
        chunk_shape: &[NonZeroU64],
    ) -> Result<Indices, IncompatibleDimensionalityError> {
        if chunk_shape.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError(
                chunk_shape.len(),
                self.dimensionality(),
            ));
        }
        if self.is_empty() {
            return Ok(Indices::empty());
        }
        let ranges: Vec<_> = izip!(self.to_ranges(), chunk_shape)
            .map(|(range, chunk_size)| {
                range.start / chunk_size.get()..range.end.div_ceil(chunk_size.get())
            })
            .collect();
        Ok(Self::new_with_ranges(&ranges).indices())
    }

    /// Return an iterator over the indices of elements within the subset in C order.
    #[must_use]
    pub fn indices(&self) -> Indices {
        if self.is_empty() {
            Indices::empty()
        } else {
            Indices {
                next: Some(self.start.clone()),
                subset: self.clone(),
            }
        }
    }
}

/// An iterator over the indices of an [`ArraySubset`] in C order.
///
/// A zero dimensional subset yields a single empty index.
#[derive(Clone, Debug)]
pub struct Indices {
    subset: ArraySubset,
    next: Option<Vec<u64>>,
}

impl Indices {
    fn empty() -> Self {
        Self {
            subset: ArraySubset::default(),
            next: None,
        }
    }
}

impl Iterator for Indices {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut successor = current.clone();
        for dim in (0..successor.len()).rev() {
            successor[dim] += 1;
            if successor[dim] < self.subset.start[dim] + self.subset.shape[dim] {
                self.next = Some(successor);
                break;
            }
            successor[dim] = self.subset.start[dim];
        }
        Some(current)
    }
}

/// Return the linear (C order) index of `indices` within an array of `shape`.
pub(crate) fn ravel_indices(indices: &[u64], shape: &[u64]) -> u64 {
    izip!(indices, shape).fold(0, |acc, (&index, &size)| acc * size + index)
}

/// Copy the elements of `src_region` of a C order buffer with `src_shape` into a C order buffer with
/// `dst_shape`, placing the region at `dst_start`.
///
/// The region and destination placement must be in bounds.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn copy_region(
    src: &[u8],
    src_shape: &[u64],
    src_region: &ArraySubset,
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_start: &[u64],
    element_size: usize,
) {
    let Some((&contiguous, outer_shape)) = src_region.shape().split_last() else {
        // zero dimensional
        dst[..element_size].copy_from_slice(&src[..element_size]);
        return;
    };
    let run_bytes = contiguous as usize * element_size;
    let outer = ArraySubset::new_with_shape(outer_shape.to_vec());
    let n = src_region.dimensionality();
    let mut src_index = vec![0; n];
    let mut dst_index = vec![0; n];
    for outer_index in outer.indices() {
        for dim in 0..n - 1 {
            src_index[dim] = src_region.start()[dim] + outer_index[dim];
            dst_index[dim] = dst_start[dim] + outer_index[dim];
        }
        src_index[n - 1] = src_region.start()[n - 1];
        dst_index[n - 1] = dst_start[n - 1];
        let src_offset = ravel_indices(&src_index, src_shape) as usize * element_size;
        let dst_offset = ravel_indices(&dst_index, dst_shape) as usize * element_size;
        dst[dst_offset..dst_offset + run_bytes]
            .copy_from_slice(&src[src_offset..src_offset + run_bytes]);
    }
}
