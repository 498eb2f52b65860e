//! Domain partitioning for distributed sweeps.
//!
//! This is a pure oracle: it computes which cells a rank owns
//! and which ghost cells it must refresh after each sweep,
//! but performs no communication itself.
//! The single collective exchange point per sweep
//! is the refresh of [`ghost_indices`][Partition::ghost_indices]
//! after variables are written back.

use std::ops::Range;

/// One rank's slice of a cell numbering split across `ranks` ranks.
///
/// Cells are divided as evenly as possible;
/// when the total does not divide evenly,
/// the first `total % ranks` ranks own one extra cell.
/// Ghost layers of up to `overlap` cells extend the owned range
/// on both sides, clamped at the ends of the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    total: usize,
    start: usize,
    end: usize,
    ghost_below: usize,
    ghost_above: usize,
}

impl Partition {
    /// Compute rank `rank`'s partition of `total` cells
    /// over `ranks` ranks with ghost layers `overlap` cells deep.
    ///
    /// # Panics
    ///
    /// Panics if `ranks` is zero or `rank >= ranks`.
    pub fn new(total: usize, rank: usize, ranks: usize, overlap: usize) -> Self {
        assert!(ranks > 0, "cannot partition over zero ranks");
        assert!(rank < ranks, "rank {rank} out of range for {ranks} ranks");

        let base = total / ranks;
        let remainder = total % ranks;
        let start = rank * base + rank.min(remainder);
        let size = base + usize::from(rank < remainder);
        let end = start + size;

        Self {
            total,
            start,
            end,
            ghost_below: overlap.min(start),
            ghost_above: overlap.min(total - end),
        }
    }

    /// The cells this rank owns and writes to.
    #[inline]
    pub fn owned(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The owned cells plus the ghost layers,
    /// i.e. every cell the rank reads during assembly.
    #[inline]
    pub fn local(&self) -> Range<usize> {
        (self.start - self.ghost_below)..(self.end + self.ghost_above)
    }

    /// Number of owned cells.
    #[inline]
    pub fn owned_len(&self) -> usize {
        self.end - self.start
    }

    /// Number of local cells including ghosts.
    #[inline]
    pub fn local_len(&self) -> usize {
        self.local().len()
    }

    /// The ghost cells owned by neighboring ranks,
    /// which must be refreshed from them after every sweep.
    pub fn ghost_indices(&self) -> impl Iterator<Item = usize> {
        ((self.start - self.ghost_below)..self.start).chain(self.end..(self.end + self.ghost_above))
    }

    /// The size of the whole partitioned domain.
    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn remainder_cells_go_to_the_low_ranks() {
        let parts: Vec<_> = (0..3).map(|r| Partition::new(10, r, 3, 0)).collect();
        assert_eq!(parts[0].owned(), 0..4);
        assert_eq!(parts[1].owned(), 4..7);
        assert_eq!(parts[2].owned(), 7..10);
        // ranks tile the domain without gaps or overlap
        let covered: Vec<usize> = parts.iter().flat_map(|p| p.owned()).collect();
        assert_eq!(covered, (0..10).collect_vec());
    }

    #[test]
    fn ghosts_clamp_at_the_domain_ends() {
        let first = Partition::new(10, 0, 3, 2);
        assert_eq!(first.local(), 0..6);
        assert_eq!(first.ghost_indices().collect_vec(), vec![4, 5]);

        let middle = Partition::new(10, 1, 3, 1);
        assert_eq!(middle.local(), 3..8);
        assert_eq!(middle.ghost_indices().collect_vec(), vec![3, 7]);

        let last = Partition::new(10, 2, 3, 2);
        assert_eq!(last.local(), 5..10);
        assert_eq!(last.ghost_indices().collect_vec(), vec![5, 6]);
    }

    #[test]
    fn single_rank_owns_everything_without_ghosts() {
        let only = Partition::new(7, 0, 1, 3);
        assert_eq!(only.owned(), 0..7);
        assert_eq!(only.local(), 0..7);
        assert_eq!(only.ghost_indices().count(), 0);
        assert_eq!(only.owned_len(), 7);
        assert_eq!(only.local_len(), 7);
    }

    #[test]
    fn more_ranks_than_cells_leaves_empty_high_ranks() {
        let parts: Vec<_> = (0..4).map(|r| Partition::new(2, r, 4, 1)).collect();
        assert_eq!(parts[0].owned_len(), 1);
        assert_eq!(parts[1].owned_len(), 1);
        assert_eq!(parts[2].owned_len(), 0);
        assert_eq!(parts[3].owned_len(), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_rank_panics() {
        Partition::new(10, 3, 3, 0);
    }
}
