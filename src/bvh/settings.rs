use bon::bon;
use thiserror::Error;

/// Hard upper bound on the tree depth, traversal stacks are sized by this.
pub const MAX_DEPTH_LIMIT: u32 = 64;

pub const DEFAULT_MAX_LEAF_SIZE: u32 = 4;
pub const DEFAULT_MAX_DEPTH: u32 = MAX_DEPTH_LIMIT;
pub const DEFAULT_SAH_BIN_COUNT: usize = 16;
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16 * 1024;

const MAX_SAH_BIN_COUNT: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BuildSettings {
    max_leaf_size: u32,
    max_depth: u32,
    sah_bin_count: usize,
    parallel: bool,
    parallel_threshold: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Maximum leaf size must be at least 1")]
    ZeroLeafSize,

    #[error("Maximum depth must be between 1 and {max}, got {0}", max = MAX_DEPTH_LIMIT)]
    DepthOutOfRange(u32),

    #[error("SAH bin count must be between 2 and {max}, got {0}", max = MAX_SAH_BIN_COUNT)]
    BinCountOutOfRange(usize),
}

#[bon]
impl BuildSettings {
    /// Settings for building the hierarchy.
    ///
    /// - `max_leaf_size`: ranges with at most this many triangles become leaves
    /// - `max_depth`: nodes at this depth become leaves regardless of their size (root is depth 0)
    /// - `sah_bin_count`: number of buckets the surface area heuristic evaluates per split
    /// - `parallel`: build large ranges on the rayon thread pool
    /// - `parallel_threshold`: ranges with fewer triangles are always built on the calling thread
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_MAX_LEAF_SIZE)] max_leaf_size: u32,
        #[builder(default = DEFAULT_MAX_DEPTH)] max_depth: u32,
        #[builder(default = DEFAULT_SAH_BIN_COUNT)] sah_bin_count: usize,
        #[builder(default = true)] parallel: bool,
        #[builder(default = DEFAULT_PARALLEL_THRESHOLD)] parallel_threshold: usize,
    ) -> Result<Self, SettingsError> {
        if max_leaf_size == 0 {
            return Err(SettingsError::ZeroLeafSize);
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&max_depth) {
            return Err(SettingsError::DepthOutOfRange(max_depth));
        }
        if !(2..=MAX_SAH_BIN_COUNT).contains(&sah_bin_count) {
            return Err(SettingsError::BinCountOutOfRange(sah_bin_count));
        }

        Ok(BuildSettings {
            max_leaf_size,
            max_depth,
            sah_bin_count,
            parallel,
            parallel_threshold,
        })
    }
}

impl BuildSettings {
    pub fn max_leaf_size(&self) -> u32 {
        self.max_leaf_size
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn sah_bin_count(&self) -> usize {
        self.sah_bin_count
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    /// Copy of these settings that builds everything on the calling thread.
    pub fn single_threaded(&self) -> Self {
        BuildSettings {
            parallel: false,
            ..*self
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            max_leaf_size: DEFAULT_MAX_LEAF_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            sah_bin_count: DEFAULT_SAH_BIN_COUNT,
            parallel: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}
