//! Quiescence search: captures only (full evasions when in check) with
//! the corrected static eval as a stand-pat bound and SEE pruning of
//! losing captures.

use crate::board::{Board, Move};
use crate::eval::{Eval, MATE_SCORE};
use crate::tt::TtFlag;

use super::selector::MoveSelector;
use super::{Searcher, MAX_PLY};

impl Searcher {
    pub(crate) fn quiescence(
        &mut self,
        board: &mut Board,
        mut alpha: Eval,
        beta: Eval,
        ply: usize,
        is_pv: bool,
    ) -> Eval {
        if self.should_stop() {
            return 0;
        }

        self.nodes += 1;
        self.stats.qsearch_nodes += 1;
        if is_pv {
            self.pv.update_length(ply);
            self.seldepth = self.seldepth.max(ply);
            self.stats.pv_nodes += 1;
        } else {
            self.stats.non_pv_nodes += 1;
        }

        if self.is_draw(board, ply) {
            return 0;
        }

        let mut best_score: Eval = -MATE_SCORE;

        let entry = self.tt.probe(board.hash(), ply);
        let tt_move = match &entry {
            Some(hit) => self.resolve_tt_move(board, hit.packed_move),
            None => Move::NULL,
        };

        // Any stored depth suffices at the horizon.
        if let Some(hit) = &entry {
            if !is_pv {
                match hit.flag {
                    TtFlag::Exact => {
                        self.stats.exact_tt_cutoffs += 1;
                        return hit.score;
                    }
                    TtFlag::LowerBound if hit.score >= beta => {
                        self.stats.lower_tt_cutoffs += 1;
                        return hit.score;
                    }
                    TtFlag::UpperBound if hit.score < alpha => {
                        self.stats.upper_tt_cutoffs += 1;
                        return hit.score;
                    }
                    _ => {}
                }
            }
        }

        self.heuristics.killers.clear_ply(ply + 1);

        let raw_eval = match &entry {
            Some(hit) => hit.static_eval,
            None => {
                self.stats.evaluations += 1;
                self.evaluator.evaluate(board, ply)
            }
        };
        let static_eval = self.adjust_eval(board, raw_eval);

        let in_check = board.is_checked();

        if !in_check {
            // Stand pat: the side to move may decline every capture.
            if static_eval >= beta {
                return static_eval;
            }
            alpha = alpha.max(static_eval);
            best_score = static_eval;
        }

        if ply >= MAX_PLY - 1 {
            return static_eval;
        }

        let moves: Vec<Move> = if in_check {
            board.get_legal_moves_from_check().to_vec()
        } else {
            board.get_legal_capture_moves().to_vec()
        };
        if moves.is_empty() {
            // Mated or no capture worth playing; the static eval already
            // encodes mate when in check with no evasions.
            return static_eval;
        }

        let prev_move = if ply > 0 { self.stacks.moves[ply - 1] } else { Move::NULL };
        self.stacks.hashes[ply] = board.hash();
        self.stacks.static_evals[ply] = static_eval;
        self.stacks.moves[ply] = Move::NULL;

        let mut selector = MoveSelector::new(
            &moves,
            board,
            &self.heuristics,
            &self.stacks.moves,
            ply,
            tt_move,
            prev_move,
        );

        let mut flag = TtFlag::UpperBound;
        let mut best_move = Move::NULL;

        while let Some(mv) = selector.next(board) {
            // Losing captures cannot rescue a standing pat.
            if !in_check && !mv.is_promotion() && !board.see_ge(mv, 0) {
                self.stats.see_pruned += 1;
                continue;
            }

            let mut child = board.clone();
            child.perform_move(mv);
            self.tt.prefetch(child.hash());
            self.evaluator.push_move(board, mv);
            self.stacks.moves[ply] = mv;

            let score = -self.quiescence(&mut child, -beta, -alpha, ply + 1, is_pv);

            self.evaluator.pop_move();

            if score > best_score {
                best_score = score;
                best_move = mv;
            }

            if best_score >= alpha {
                if is_pv {
                    self.pv.update(mv, ply);
                    flag = TtFlag::Exact;
                }
                alpha = best_score;
            }

            if alpha >= beta {
                flag = TtFlag::LowerBound;
                if mv.is_quiet() {
                    self.heuristics.killers.add(mv, ply);
                }
                break;
            }
        }

        if self.stopped {
            return 0;
        }

        self.tt.store(
            board.hash(),
            best_score,
            best_move.packed(),
            is_pv,
            0,
            ply,
            raw_eval,
            flag,
            self.num_pieces_root,
            board.num_pieces(),
        );

        best_score
    }
}
