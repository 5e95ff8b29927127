//! Strategies for dividing a region into pieces
//!
//! Streaming nodes use these to plan their passes. Both strategies may
//! return fewer pieces than requested when the region is too small to be
//! divided that finely; callers must use the count they get back.

use serde::{Deserialize, Serialize};

use crate::region::Region;

/// How a region is divided into pieces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Slabs along the slowest axis with more than one element (row slabs in 2-D)
    #[default]
    Slab,
    /// Balanced tiles across all axes
    Tile,
}

impl SplitStrategy {
    /// Number of pieces `region` is actually divided into when `requested` are asked for
    pub fn number_of_splits(&self, region: &Region, requested: u64) -> u64 {
        let requested = requested.max(1);
        if region.is_empty() {
            return 1;
        }
        match self {
            Self::Slab => match slab_axis(region) {
                Some(axis) => slab_layout(region.size()[axis], requested).1,
                None => 1,
            },
            Self::Tile => tile_counts(region, requested).iter().product(),
        }
    }

    /// Piece `piece` of the division of `region` into `requested` pieces
    ///
    /// Returns `None` when `piece` is not below [`number_of_splits`](Self::number_of_splits).
    pub fn split(&self, region: &Region, piece: u64, requested: u64) -> Option<Region> {
        let requested = requested.max(1);
        if piece >= self.number_of_splits(region, requested) {
            return None;
        }
        if region.is_empty() {
            return Some(region.clone());
        }
        match self {
            Self::Slab => {
                let Some(axis) = slab_axis(region) else {
                    return Some(region.clone());
                };
                let extent = region.size()[axis];
                let (per_piece, _) = slab_layout(extent, requested);
                let offset = piece * per_piece;
                let len = per_piece.min(extent - offset);
                Some(region.slice(axis, region.index()[axis] + offset as i64, len))
            }
            Self::Tile => {
                let counts = tile_counts(region, requested);
                let mut rest = piece;
                let mut tile = region.clone();
                for (axis, count) in counts.iter().enumerate() {
                    let position = rest % count;
                    rest /= count;
                    let extent = region.size()[axis];
                    let start = position * extent / count;
                    let end = (position + 1) * extent / count;
                    tile = tile.slice(axis, region.index()[axis] + start as i64, end - start);
                }
                Some(tile)
            }
        }
    }
}

fn slab_axis(region: &Region) -> Option<usize> {
    (0..region.dimension()).rev().find(|d| region.size()[*d] > 1)
}

/// Elements per slab and number of slabs used for `extent` split `requested` ways
fn slab_layout(extent: u64, requested: u64) -> (u64, u64) {
    let per_piece = extent.div_ceil(requested.min(extent));
    (per_piece, extent.div_ceil(per_piece))
}

/// Prime factors of `n`, largest first
fn prime_factors(mut n: u64) -> Vec<u64> {
    let mut factors = Vec::new();
    let mut f = 2;
    while f * f <= n {
        while n % f == 0 {
            factors.push(f);
            n /= f;
        }
        f += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors.reverse();
    factors
}

/// Pieces per axis, giving each factor to the axis that currently has the largest tiles
fn tile_counts(region: &Region, requested: u64) -> Vec<u64> {
    let size = region.size();
    let mut counts = vec![1u64; size.len()];
    for factor in prime_factors(requested) {
        let axis = (0..size.len())
            .filter(|d| counts[*d] * factor <= size[*d])
            .max_by_key(|d| size[*d] / counts[*d]);
        if let Some(d) = axis {
            counts[d] *= factor;
        }
    }
    counts
}
