use assert2::debug_assert;

use super::{BuildSettings, primitive_table::PrimitiveRef};
use crate::geometry::{Axis, FloatType, WorldBox};

/// Strategy for dividing a range of primitives into two children.
pub trait SplitPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reorder `refs` so that the first `n` entries form the left child and return `n`.
    /// `axis` is the axis of the largest centroid extent, `centroid_bounds` is guaranteed
    /// to have a nonzero extent along it.
    ///
    /// Returning `None` (or a split with an empty side) makes the builder fall back
    /// to `split_at_median`.
    /// The result must only depend on the set of primitives, not on their order in `refs`.
    fn split(
        &self,
        refs: &mut [PrimitiveRef],
        axis: Axis,
        centroid_bounds: &WorldBox,
        settings: &BuildSettings,
    ) -> Option<usize>;
}

/// Splits every range into two halves of the same size. Produces the shallowest trees.
#[derive(Copy, Clone, Debug, Default)]
pub struct MedianSplit;

impl SplitPolicy for MedianSplit {
    fn name(&self) -> &'static str {
        "median"
    }

    fn split(
        &self,
        refs: &mut [PrimitiveRef],
        axis: Axis,
        _centroid_bounds: &WorldBox,
        _settings: &BuildSettings,
    ) -> Option<usize> {
        Some(split_at_median(refs, axis))
    }
}

/// Binned surface area heuristic.
#[derive(Copy, Clone, Debug, Default)]
pub struct SahSplit;

#[derive(Copy, Clone, Debug)]
struct Bin {
    bounds: WorldBox,
    count: usize,
}

impl Default for Bin {
    fn default() -> Self {
        Bin {
            bounds: WorldBox::empty(),
            count: 0,
        }
    }
}

impl Bin {
    fn merge(&self, other: &Bin) -> Bin {
        Bin {
            bounds: self.bounds.union(&other.bounds),
            count: self.count + other.count,
        }
    }

    fn cost(&self) -> FloatType {
        self.bounds.surface_area() * self.count as FloatType
    }
}

impl SplitPolicy for SahSplit {
    fn name(&self) -> &'static str {
        "sah"
    }

    fn split(
        &self,
        refs: &mut [PrimitiveRef],
        axis: Axis,
        centroid_bounds: &WorldBox,
        settings: &BuildSettings,
    ) -> Option<usize> {
        let bin_count = settings.sah_bin_count();
        let extent = centroid_bounds.extent(axis);
        if !(extent > 0.0) {
            return None;
        }

        let min = centroid_bounds.min[axis.index()];
        let scale = bin_count as FloatType / extent;
        let bin_index = |r: &PrimitiveRef| {
            (((r.centroid[axis.index()] - min) * scale) as usize).min(bin_count - 1)
        };

        let mut bins = vec![Bin::default(); bin_count];
        for r in refs.iter() {
            let bin = &mut bins[bin_index(r)];
            bin.bounds = bin.bounds.union(&r.bounds);
            bin.count += 1;
        }

        // right[i] covers bins[i..]
        let mut right = vec![Bin::default(); bin_count + 1];
        for i in (0..bin_count).rev() {
            right[i] = right[i + 1].merge(&bins[i]);
        }

        // Boundary i puts bins[..=i] to the left
        let mut best: Option<(usize, FloatType)> = None;
        let mut left = Bin::default();
        for i in 0..(bin_count - 1) {
            left = left.merge(&bins[i]);
            let right = &right[i + 1];
            if left.count == 0 || right.count == 0 {
                continue;
            }
            let cost = left.cost() + right.cost();
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((i, cost));
            }
        }

        let (boundary, _) = best?;
        Some(itertools::partition(refs.iter_mut(), |r| {
            bin_index(r) <= boundary
        }))
    }
}

/// Reorders `refs` so that the lower half (by centroid along `axis`) comes first.
/// Never produces an empty side for two or more primitives.
pub fn split_at_median(refs: &mut [PrimitiveRef], axis: Axis) -> usize {
    debug_assert!(refs.len() >= 2);
    let mid = refs.len() / 2;
    refs.select_nth_unstable_by(mid, |a, b| a.cmp_along(b, axis));
    mid
}
