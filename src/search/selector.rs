//! Staged move selector.
//!
//! Yields one move per call without sorting the full list up front:
//! the TT move first, then winning captures by MVV-LVA plus capture
//! history, killers, the counter move, history-ordered quiets and
//! finally the deferred losing captures. Underpromotions and captures
//! failing SEE are parked in the bad-capture stage as they surface.
//! Callers may switch quiets off mid-iteration; the current stage is
//! exposed for pruning rules that depend on the move class.

use crate::board::{Board, Move, MAX_MOVES};

use super::history::SearchHistory;

/// The stage a yielded move came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    TtMove,
    GoodCaptures,
    Killers,
    Counter,
    Quiets,
    BadCaptures,
    Done,
}

#[derive(Clone, Copy, Default)]
struct ScoredIndex {
    score: i32,
    index: u8,
}

pub struct MoveSelector<'a> {
    moves: &'a [Move],
    phase: Phase,
    yielded_phase: Phase,
    skip_quiets: bool,

    tt_index: Option<u8>,
    killer_indices: [u8; 2],
    num_killers: usize,
    counter_index: Option<u8>,

    captures: [ScoredIndex; MAX_MOVES],
    num_captures: usize,
    next_capture: usize,
    captures_sorted: bool,

    quiets: [ScoredIndex; MAX_MOVES],
    num_quiets: usize,
    next_quiet: usize,
    quiets_sorted: bool,

    bad_captures: [u8; MAX_MOVES],
    num_bad_captures: usize,
    next_bad_capture: usize,
}

impl<'a> MoveSelector<'a> {
    /// Classify and score the move list in one pass. `move_stack` is the
    /// per-ply move history used by the continuation tables.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        moves: &'a [Move],
        board: &Board,
        history: &SearchHistory,
        move_stack: &[Move],
        ply: usize,
        tt_move: Move,
        prev_move: Move,
    ) -> Self {
        let mut selector = MoveSelector {
            moves,
            phase: Phase::TtMove,
            yielded_phase: Phase::TtMove,
            skip_quiets: false,
            tt_index: None,
            killer_indices: [0; 2],
            num_killers: 0,
            counter_index: None,
            captures: [ScoredIndex::default(); MAX_MOVES],
            num_captures: 0,
            next_capture: 0,
            captures_sorted: false,
            quiets: [ScoredIndex::default(); MAX_MOVES],
            num_quiets: 0,
            next_quiet: 0,
            quiets_sorted: false,
            bad_captures: [0; MAX_MOVES],
            num_bad_captures: 0,
            next_bad_capture: 0,
        };

        // A single reply needs neither scoring nor sorting.
        if moves.len() == 1 {
            selector.tt_index = Some(0);
            return selector;
        }

        let turn = board.turn();
        for (i, &mv) in moves.iter().enumerate() {
            let index = i as u8;
            if mv == tt_move {
                selector.tt_index = Some(index);
                continue;
            }

            if mv.is_capture() || mv.is_promotion() {
                let mut score = 0;
                if let Some(victim) = mv.captured_piece() {
                    score += 16 * (victim.exchange_value() - mv.moved_piece().exchange_value());
                    score += history.capture.get(mv, turn);
                }
                if let Some(promo) = mv.promotion() {
                    score += promo.exchange_value() * 16;
                }
                selector.captures[selector.num_captures] = ScoredIndex { score, index };
                selector.num_captures += 1;
                continue;
            }

            if history.killers.contains(mv, ply) {
                if selector.num_killers < 2 {
                    selector.killer_indices[selector.num_killers] = index;
                    selector.num_killers += 1;
                }
                continue;
            }

            if history.counters.contains(mv, prev_move, turn) {
                selector.counter_index = Some(index);
                continue;
            }

            let score = history.quiet.get(mv, turn)
                + history.continuation.get(move_stack, ply, mv, turn);
            selector.quiets[selector.num_quiets] = ScoredIndex { score, index };
            selector.num_quiets += 1;
        }

        selector
    }

    /// The stage the most recently yielded move belongs to.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.yielded_phase
    }

    /// Skip the remaining quiet moves; the selector proceeds directly to
    /// the deferred bad captures.
    pub fn skip_quiets(&mut self) {
        self.skip_quiets = true;
    }

    #[must_use]
    pub fn is_skipping_quiets(&self) -> bool {
        self.skip_quiets
    }

    /// Quiet moves not yet yielded (used for pruning statistics).
    #[must_use]
    pub fn num_quiets_left(&self) -> usize {
        self.num_quiets - self.next_quiet
    }

    /// The next move, or `None` when every stage is exhausted. The board
    /// is consulted for the SEE verdict that splits good captures from
    /// bad ones.
    pub fn next(&mut self, board: &Board) -> Option<Move> {
        loop {
            match self.phase {
                Phase::TtMove => {
                    self.phase = Phase::GoodCaptures;
                    if let Some(index) = self.tt_index.take() {
                        self.yielded_phase = Phase::TtMove;
                        return Some(self.moves[index as usize]);
                    }
                }
                Phase::GoodCaptures => {
                    if !self.captures_sorted {
                        self.captures[..self.num_captures]
                            .sort_by(|a, b| b.score.cmp(&a.score));
                        self.captures_sorted = true;
                    }
                    while self.next_capture < self.num_captures {
                        let entry = self.captures[self.next_capture];
                        self.next_capture += 1;
                        let mv = self.moves[entry.index as usize];
                        // Losing captures and underpromotions wait for
                        // the final stage, keeping this order.
                        if mv.is_underpromotion() || !board.see_ge(mv, 0) {
                            self.bad_captures[self.num_bad_captures] = entry.index;
                            self.num_bad_captures += 1;
                            continue;
                        }
                        self.yielded_phase = Phase::GoodCaptures;
                        return Some(mv);
                    }
                    self.phase = Phase::Killers;
                }
                Phase::Killers => {
                    if self.num_killers > 0 {
                        self.num_killers -= 1;
                        self.yielded_phase = Phase::Killers;
                        return Some(self.moves[self.killer_indices[self.num_killers] as usize]);
                    }
                    self.phase = Phase::Counter;
                }
                Phase::Counter => {
                    self.phase = Phase::Quiets;
                    if let Some(index) = self.counter_index.take() {
                        self.yielded_phase = Phase::Counter;
                        return Some(self.moves[index as usize]);
                    }
                }
                Phase::Quiets => {
                    if self.skip_quiets {
                        self.phase = Phase::BadCaptures;
                        continue;
                    }
                    if !self.quiets_sorted {
                        self.quiets[..self.num_quiets].sort_by(|a, b| b.score.cmp(&a.score));
                        self.quiets_sorted = true;
                    }
                    if self.next_quiet < self.num_quiets {
                        let entry = self.quiets[self.next_quiet];
                        self.next_quiet += 1;
                        self.yielded_phase = Phase::Quiets;
                        return Some(self.moves[entry.index as usize]);
                    }
                    self.phase = Phase::BadCaptures;
                }
                Phase::BadCaptures => {
                    if self.next_bad_capture < self.num_bad_captures {
                        let mv = self.moves[self.bad_captures[self.next_bad_capture] as usize];
                        self.next_bad_capture += 1;
                        self.yielded_phase = Phase::BadCaptures;
                        return Some(mv);
                    }
                    self.phase = Phase::Done;
                }
                Phase::Done => return None,
            }
        }
    }
}
