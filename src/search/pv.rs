//! Triangular principal variation table, indexed by ply from root.

use crate::board::Move;

use super::MAX_PLY;

pub struct PvTable {
    lines: Box<[[Move; MAX_PLY]; MAX_PLY]>,
    lengths: [usize; MAX_PLY],
}

impl PvTable {
    #[must_use]
    pub fn new() -> Self {
        PvTable {
            lines: Box::new([[Move::NULL; MAX_PLY]; MAX_PLY]),
            lengths: [0; MAX_PLY],
        }
    }

    /// Start a fresh line at `ply`; called on entry to every PV node.
    #[inline]
    pub fn update_length(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.lengths[ply] = ply;
        }
    }

    /// Prepend `mv` at `ply`, adopting the child line below it.
    pub fn update(&mut self, mv: Move, ply: usize) {
        if ply + 1 >= MAX_PLY {
            return;
        }
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        let child = &tail[0];
        line[ply] = mv;
        let child_len = self.lengths[ply + 1].clamp(ply + 1, MAX_PLY);
        line[(ply + 1)..child_len].copy_from_slice(&child[(ply + 1)..child_len]);
        self.lengths[ply] = child_len;
    }

    /// The best line from the root.
    #[must_use]
    pub fn best_line(&self) -> &[Move] {
        &self.lines[0][..self.lengths[0]]
    }

    pub fn clear(&mut self) {
        self.lengths = [0; MAX_PLY];
    }
}

impl Default for PvTable {
    fn default() -> Self {
        PvTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::moved_bit;
    use crate::board::{Piece, Square};

    fn mv(from: usize, to: usize) -> Move {
        Move::new(
            Square::from_index(from),
            Square::from_index(to),
            moved_bit(Piece::Knight),
        )
    }

    #[test]
    fn lines_accumulate_from_the_leaves() {
        let mut pv = PvTable::new();
        // Leaf at ply 2, then the parents adopt the child lines.
        pv.update_length(2);
        pv.update_length(1);
        pv.update(mv(10, 20), 1);
        pv.update_length(0);
        pv.update(mv(1, 2), 0);

        let line = pv.best_line();
        assert_eq!(line.len(), 2);
        assert_eq!(line[0], mv(1, 2));
        assert_eq!(line[1], mv(10, 20));
    }

    #[test]
    fn new_root_move_replaces_the_line() {
        let mut pv = PvTable::new();
        pv.update_length(1);
        pv.update_length(0);
        pv.update(mv(1, 2), 0);
        assert_eq!(pv.best_line(), &[mv(1, 2)]);

        pv.update_length(1);
        pv.update(mv(3, 4), 0);
        assert_eq!(pv.best_line(), &[mv(3, 4)]);
    }
}
