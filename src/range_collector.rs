//! The range collector: turns a bag of
//! byte-lexicographic intervals (one per submitted CIDR) into an LPM
//! mapping every key in the domain to an *interval index*, plus a
//! [`RangeIndex`] giving each submitted interval's `[start, stop)` slice of
//! those indices — classic coordinate compression over interval endpoints.

use std::collections::{BTreeSet, HashMap};

use crate::bigkey::{key_pred, key_succ};
use crate::lpm::Lpm;

/// Accumulates intervals over `N`-byte keys and compiles them into an LPM
/// plus a range index.
pub struct RangeCollector<const N: usize> {
    intervals: Vec<([u8; N], [u8; N])>,
}

/// Each submitted interval's `[start, stop)` slice of elementary interval
/// indices, in submission order, plus the total elementary interval count.
pub struct RangeIndex {
    slices: Vec<(u32, u32)>,
    count: u32,
}

impl RangeIndex {
    pub fn slice(&self, submitted_index: usize) -> (u32, u32) {
        self.slices[submitted_index]
    }

    /// Total number of elementary intervals the collector produced — the
    /// width to use for the owning attribute's value table.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl<const N: usize> RangeCollector<N> {
    pub fn new() -> Self {
        Self { intervals: Vec::new() }
    }

    /// Submit an inclusive interval `[from, to]`. Returns a handle to use
    /// with [`RangeIndex::slice`] after [`build`](Self::build).
    pub fn submit(&mut self, from: [u8; N], to: [u8; N]) -> usize {
        self.intervals.push((from, to));
        self.intervals.len() - 1
    }

    /// Compile all submitted intervals into an LPM (leaves carry
    /// ascending interval indices) and the matching range index.
    pub fn build(self) -> (Lpm<N>, RangeIndex) {
        let mut breakpoints: BTreeSet<[u8; N]> = BTreeSet::new();
        breakpoints.insert([0u8; N]);
        for (from, to) in &self.intervals {
            breakpoints.insert(*from);
            if let Some(succ) = key_succ(to) {
                breakpoints.insert(succ);
            }
        }

        let sorted: Vec<[u8; N]> = breakpoints.into_iter().collect();
        let mut position: HashMap<[u8; N], usize> = HashMap::with_capacity(sorted.len());
        for (i, k) in sorted.iter().enumerate() {
            position.insert(*k, i);
        }
        let count = sorted.len();

        let mut lpm = Lpm::<N>::new();
        for i in 0..count {
            let lo = sorted[i];
            let hi = if i + 1 < count {
                key_pred(&sorted[i + 1]).expect("breakpoints are strictly increasing")
            } else {
                [0xFFu8; N]
            };
            lpm.insert(&lo, &hi, i as u32);
        }

        let mut slices = Vec::with_capacity(self.intervals.len());
        for (from, to) in &self.intervals {
            let start = position[from] as u32;
            let stop = match key_succ(to) {
                Some(succ) => position[&succ] as u32,
                None => count as u32,
            };
            slices.push((start, stop));
        }

        (lpm, RangeIndex { slices, count: count as u32 })
    }
}

impl<const N: usize> Default for RangeCollector<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_interval_covers_whole_domain_slice() {
        let mut rc = RangeCollector::<4>::new();
        let h = rc.submit([10, 0, 0, 0], [10, 0, 255, 255]);
        let (lpm, idx) = rc.build();
        let (start, stop) = idx.slice(h);
        assert!(stop > start);
        // Every address in the submitted range resolves to one of the
        // indices in [start, stop).
        for addr in [[10u8, 0, 0, 0], [10, 0, 128, 1], [10, 0, 255, 255]] {
            let v = lpm.lookup(&addr).unwrap();
            assert!(v >= start && v < stop, "addr {:?} -> {} not in [{},{})", addr, v, start, stop);
        }
        // An address outside the submitted range must land outside the slice.
        let outside = lpm.lookup(&[10, 1, 0, 0]).unwrap();
        assert!(outside < start || outside >= stop);
    }

    #[test]
    fn overlapping_intervals_share_elementary_indices() {
        let mut rc = RangeCollector::<4>::new();
        let a = rc.submit([10, 0, 0, 0], [10, 0, 0, 255]);
        let b = rc.submit([10, 0, 0, 128], [10, 0, 1, 255]);
        let (_lpm, idx) = rc.build();
        let (a_start, a_stop) = idx.slice(a);
        let (b_start, b_stop) = idx.slice(b);
        // The overlap [10.0.0.128, 10.0.0.255] must be represented by
        // indices common to both slices.
        let a_set: Vec<u32> = (a_start..a_stop).collect();
        let b_set: Vec<u32> = (b_start..b_stop).collect();
        assert!(a_set.iter().any(|v| b_set.contains(v)));
    }
}
