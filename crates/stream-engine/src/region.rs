//! Axis-aligned regions over an N-dimensional index space
//!
//! A region is a starting index plus a size per axis. Buffers laid out over
//! a region are row-major with axis 0 varying fastest.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Axis-aligned bounding box in index space
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    index: Vec<i64>,
    size: Vec<u64>,
}

impl Region {
    /// Create a region from a start index and a size
    pub fn new(index: impl Into<Vec<i64>>, size: impl Into<Vec<u64>>) -> Result<Self> {
        let index = index.into();
        let size = size.into();
        if index.len() != size.len() {
            return Err(StreamError::DimensionMismatch {
                expected: index.len(),
                actual: size.len(),
            });
        }
        Ok(Self { index, size })
    }

    /// Create a region starting at the origin
    pub fn from_size(size: impl Into<Vec<u64>>) -> Self {
        let size = size.into();
        Self {
            index: vec![0; size.len()],
            size,
        }
    }

    /// An empty region of the given dimension
    pub fn empty(dimension: usize) -> Self {
        Self {
            index: vec![0; dimension],
            size: vec![0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.size.len()
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn size(&self) -> &[u64] {
        &self.size
    }

    /// One past the last index on every axis
    pub fn upper_index(&self) -> Vec<i64> {
        self.index
            .iter()
            .zip(&self.size)
            .map(|(i, s)| i + *s as i64)
            .collect()
    }

    pub fn number_of_elements(&self) -> u64 {
        if self.size.is_empty() {
            return 0;
        }
        self.size.iter().fold(1u64, |acc, s| acc.saturating_mul(*s))
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty() || self.size.iter().any(|s| *s == 0)
    }

    pub fn contains_index(&self, index: &[i64]) -> bool {
        index.len() == self.dimension()
            && index
                .iter()
                .zip(self.index.iter().zip(&self.size))
                .all(|(i, (start, size))| *i >= *start && *i < start + *size as i64)
    }

    /// Whether `other` lies completely inside this region
    ///
    /// An empty region is contained in any region of the same dimension.
    pub fn contains(&self, other: &Region) -> bool {
        if other.dimension() != self.dimension() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        let upper = self.upper_index();
        let other_upper = other.upper_index();
        (0..self.dimension())
            .all(|d| other.index[d] >= self.index[d] && other_upper[d] <= upper[d])
    }

    /// Overlap of two regions, `None` when they are disjoint
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        if other.dimension() != self.dimension() || self.is_empty() || other.is_empty() {
            return None;
        }
        let upper = self.upper_index();
        let other_upper = other.upper_index();
        let mut index = Vec::with_capacity(self.dimension());
        let mut size = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let lo = self.index[d].max(other.index[d]);
            let hi = upper[d].min(other_upper[d]);
            if hi <= lo {
                return None;
            }
            index.push(lo);
            size.push((hi - lo) as u64);
        }
        Some(Region { index, size })
    }

    /// Shrink this region to its overlap with `bounds`
    ///
    /// Returns false and leaves the region untouched when they do not overlap.
    pub fn crop(&mut self, bounds: &Region) -> bool {
        match self.intersect(bounds) {
            Some(overlap) => {
                *self = overlap;
                true
            }
            None => false,
        }
    }

    /// Grow the region by `radius` elements on both sides of every axis
    pub fn pad(&self, radius: &[u64]) -> Result<Region> {
        if radius.len() != self.dimension() {
            return Err(StreamError::DimensionMismatch {
                expected: self.dimension(),
                actual: radius.len(),
            });
        }
        Ok(Region {
            index: self
                .index
                .iter()
                .zip(radius)
                .map(|(i, r)| i - *r as i64)
                .collect(),
            size: self.size.iter().zip(radius).map(|(s, r)| s + 2 * r).collect(),
        })
    }

    /// Sub-region covering `[start, start + len)` along `axis`
    pub fn slice(&self, axis: usize, start: i64, len: u64) -> Region {
        let mut region = self.clone();
        region.index[axis] = start;
        region.size[axis] = len;
        region
    }

    /// Linear buffer offset of `index`, or `None` if it lies outside
    pub fn offset_of(&self, index: &[i64]) -> Option<usize> {
        if !self.contains_index(index) {
            return None;
        }
        let mut offset = 0u64;
        let mut stride = 1u64;
        for d in 0..self.dimension() {
            offset += (index[d] - self.index[d]) as u64 * stride;
            stride *= self.size[d];
        }
        usize::try_from(offset).ok()
    }

    /// Index at linear buffer offset `offset` (inverse of [`offset_of`](Self::offset_of))
    pub fn index_at(&self, offset: u64) -> Option<Vec<i64>> {
        if offset >= self.number_of_elements() {
            return None;
        }
        let mut rest = offset;
        let mut index = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            index.push(self.index[d] + (rest % self.size[d]) as i64);
            rest /= self.size[d];
        }
        Some(index)
    }

    /// Iterate over every index in buffer order
    pub fn indices(&self) -> RegionIndices {
        RegionIndices {
            next: (!self.is_empty()).then(|| self.index.clone()),
            region: self.clone(),
        }
    }

    /// Parts of this region not covered by `other`, as disjoint boxes
    pub fn subtract(&self, other: &Region) -> Vec<Region> {
        let Some(overlap) = self.intersect(other) else {
            return if self.is_empty() {
                Vec::new()
            } else {
                vec![self.clone()]
            };
        };

        let mut pieces = Vec::new();
        let mut rest = self.clone();
        let overlap_upper = overlap.upper_index();
        for d in 0..self.dimension() {
            let rest_upper = rest.index[d] + rest.size[d] as i64;
            if rest.index[d] < overlap.index[d] {
                pieces.push(rest.slice(d, rest.index[d], (overlap.index[d] - rest.index[d]) as u64));
            }
            if rest_upper > overlap_upper[d] {
                pieces.push(rest.slice(d, overlap_upper[d], (rest_upper - overlap_upper[d]) as u64));
            }
            rest = rest.slice(d, overlap.index[d], overlap.size[d]);
        }
        pieces
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: Vec<String>| values.join(", ");
        write!(
            f,
            "[index=({}), size=({})]",
            join(self.index.iter().map(|i| i.to_string()).collect()),
            join(self.size.iter().map(|s| s.to_string()).collect())
        )
    }
}

/// Iterator over the indices of a region, axis 0 fastest
pub struct RegionIndices {
    region: Region,
    next: Option<Vec<i64>>,
}

impl Iterator for RegionIndices {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        let mut advanced = current.clone();
        let upper = self.region.upper_index();
        for d in 0..advanced.len() {
            advanced[d] += 1;
            if advanced[d] < upper[d] {
                self.next = Some(advanced);
                return Some(current);
            }
            advanced[d] = self.region.index[d];
        }
        Some(current)
    }
}
