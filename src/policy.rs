//! Tuning knobs for `Devector` reallocation.

/// Growth and placement constants for a [`Devector`](crate::Devector).
///
/// The defaults are empirically tuned for a general-purpose heap allocator.
/// Any policy accepted by [`GrowthPolicy::new`] keeps push at both ends
/// amortized O(1).
///
/// # Example
///
/// ```
/// use devector::{Devector, GrowthPolicy};
///
/// let policy = GrowthPolicy::new(2.0, 0.75, 0.1).unwrap();
/// let mut dv: Devector<u8> = Devector::with_policy(policy);
/// dv.push_front(1);
/// assert_eq!(dv.front(), Some(&1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthPolicy {
    growth_factor: f64,
    reallocation_limit: f64,
    min_relative_gap: f64,
}

impl GrowthPolicy {
    /// Default multiplier applied to the capacity on reallocation.
    pub const DEFAULT_GROWTH_FACTOR: f64 = 1.9;
    /// Default utilization below which the contents are shifted instead of
    /// reallocated.
    pub const DEFAULT_REALLOCATION_LIMIT: f64 = 0.8;
    /// Default smallest share of free space kept on either side.
    pub const DEFAULT_MIN_RELATIVE_GAP: f64 = 0.05;

    /// Creates a policy, or `None` if a constant is out of range.
    ///
    /// - `growth_factor` must be greater than 1.
    /// - `reallocation_limit` must be in `(0, 1]`.
    /// - `min_relative_gap` must be in `[0, 0.5)`.
    pub fn new(growth_factor: f64, reallocation_limit: f64, min_relative_gap: f64) -> Option<Self> {
        let valid = growth_factor.is_finite()
            && growth_factor > 1.0
            && reallocation_limit > 0.0
            && reallocation_limit <= 1.0
            && (0.0..0.5).contains(&min_relative_gap);
        valid.then_some(Self {
            growth_factor,
            reallocation_limit,
            min_relative_gap,
        })
    }

    /// Capacity multiplier used when growing.
    #[inline]
    pub const fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Utilization threshold separating shift from grow.
    #[inline]
    pub const fn reallocation_limit(&self) -> f64 {
        self.reallocation_limit
    }

    /// Smallest fraction of free space placed on each side.
    #[inline]
    pub const fn min_relative_gap(&self) -> f64 {
        self.min_relative_gap
    }

    /// Capacity to allocate when growing from `capacity` while holding `len`
    /// elements. Always leaves at least two free slots.
    pub(crate) fn grown_capacity(&self, capacity: usize, len: usize) -> Option<usize> {
        // Float to int casts saturate.
        let scaled = (capacity as f64 * self.growth_factor) as usize;
        let floor = len.checked_add(2)?;
        Some(scaled.saturating_add(2).max(floor))
    }

    /// Whether a buffer with `len` of `capacity` slots in use should be
    /// shifted rather than reallocated.
    pub(crate) fn should_shift(&self, len: usize, capacity: usize) -> bool {
        capacity != 0
            && capacity - len >= 2
            && (len as f64 / capacity as f64) < self.reallocation_limit
    }

    /// Number of free slots to place before the live range.
    ///
    /// `inserted_front` and `inserted_back` count the elements pushed on
    /// each side since the last reallocation. The side that saw more pushes
    /// gets more room; both gaps are at least one slot. `free` must be at
    /// least 2.
    pub(crate) fn left_gap(&self, free: usize, inserted_front: usize, inserted_back: usize) -> usize {
        debug_assert!(free >= 2);
        let total = inserted_front as f64 + inserted_back as f64 + 1.0;
        let front_ratio = inserted_front as f64 / total;
        let fraction =
            self.min_relative_gap + (1.0 - 2.0 * self.min_relative_gap) * front_ratio;

        let gap = (fraction * free as f64) as usize;
        gap.clamp(1, free - 1)
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            growth_factor: Self::DEFAULT_GROWTH_FACTOR,
            reallocation_limit: Self::DEFAULT_REALLOCATION_LIMIT,
            min_relative_gap: Self::DEFAULT_MIN_RELATIVE_GAP,
        }
    }
}
