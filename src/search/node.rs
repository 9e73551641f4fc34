//! The alpha-beta node procedure: transposition and tablebase probes,
//! pre-move pruning, the staged move loop with reductions and
//! extensions, and the cutoff bookkeeping.

use crate::board::{Board, Move, PackedMove};
use crate::eval::{
    is_close_to_mate, is_losing_score, is_mate_score, Eval, MATE_SCORE,
    TB_MATE_SCORE,
};
use crate::tb::WdlResult;
use crate::tt::{TtFlag, TtHit};

use super::selector::MoveSelector;
use super::{Searcher, MAX_PLY};

const SINGULAR_MIN_DEPTH: i32 = 7;
const SINGULAR_MARGIN: Eval = 3;
const PROBCUT_MARGIN: Eval = 300;
const MAX_TOTAL_EXTENSIONS: u32 = 32;

impl Searcher {
    /// Full-width search of one node. `skip_move` is excluded from the
    /// move loop during singular verification searches.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub(crate) fn alpha_beta(
        &mut self,
        board: &mut Board,
        mut alpha: Eval,
        mut beta: Eval,
        depth: i32,
        ply: usize,
        is_pv: bool,
        cutnode: bool,
        mut total_extensions: u32,
        skip_move: Move,
    ) -> Eval {
        if self.should_stop() {
            return 0;
        }

        if depth <= 0 {
            return self.quiescence(board, alpha, beta, ply, is_pv);
        }

        self.nodes += 1;
        if is_pv {
            self.pv.update_length(ply);
            self.seldepth = self.seldepth.max(ply);
            self.stats.pv_nodes += 1;
        } else {
            self.stats.non_pv_nodes += 1;
        }

        if ply >= MAX_PLY - 1 {
            let raw = self.evaluator.evaluate(board, ply);
            return self.adjust_eval(board, raw);
        }

        if self.is_draw(board, ply) {
            return 0;
        }

        // Mate distance pruning.
        alpha = alpha.max(ply as Eval - MATE_SCORE);
        beta = beta.min(MATE_SCORE - ply as Eval - 1);
        if alpha >= beta {
            return alpha;
        }

        let original_alpha = alpha;
        let mut best_score: Eval = -MATE_SCORE;
        let mut max_score: Eval = MATE_SCORE;
        let skip_move_active = !skip_move.is_null();

        let entry: Option<TtHit> = self.tt.probe(board.hash(), ply);
        let tt_move = match &entry {
            Some(hit) => self.resolve_tt_move(board, hit.packed_move),
            None => Move::NULL,
        };

        if let Some(hit) = &entry {
            if !is_pv && hit.depth >= depth && !skip_move_active {
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

        // Tablebase probe: piece count within range, no castle rights.
        if !skip_move_active
            && board.num_pieces() <= self.tb.max_pieces()
            && board.castle_rights().is_empty()
        {
            let wdl = self.tb.probe_wdl(board);
            if wdl != WdlResult::Failed {
                self.stats.tb_hits += 1;
                let (tb_score, tb_flag) = match wdl {
                    WdlResult::Win => (TB_MATE_SCORE - ply as Eval, TtFlag::LowerBound),
                    WdlResult::Loss => (-TB_MATE_SCORE + ply as Eval, TtFlag::UpperBound),
                    _ => (0, TtFlag::Exact),
                };

                let cutoff = match tb_flag {
                    TtFlag::Exact => true,
                    TtFlag::LowerBound => tb_score >= beta,
                    TtFlag::UpperBound => tb_score <= alpha,
                };
                if cutoff {
                    self.tt.store(
                        board.hash(),
                        tb_score,
                        PackedMove::NULL,
                        is_pv,
                        depth,
                        ply,
                        tb_score,
                        tb_flag,
                        self.num_pieces_root,
                        board.num_pieces(),
                    );
                    return tb_score;
                }
                if tb_flag == TtFlag::LowerBound {
                    best_score = tb_score;
                    alpha = alpha.max(tb_score);
                } else {
                    max_score = tb_score;
                }
            }
        }

        self.heuristics.killers.clear_ply(ply + 1);

        let moves: Vec<Move> = board.get_legal_moves().to_vec();

        let raw_eval = match &entry {
            Some(hit) => hit.static_eval,
            None => {
                self.stats.evaluations += 1;
                self.evaluator.evaluate(board, ply)
            }
        };
        let static_eval = self.adjust_eval(board, raw_eval);

        if moves.is_empty() {
            // Mate and stalemate are encoded in the static eval; a
            // singular search with every move excluded fails low.
            return if skip_move_active { alpha } else { static_eval };
        }

        let in_check = board.is_checked();
        let improving = ply > 1 && static_eval > self.stacks.static_evals[ply - 2];
        let worsening = ply > 1 && static_eval < self.stacks.static_evals[ply - 2];
        let opponent_has_easy_capture = board.has_easy_capture(board.turn().opponent());
        let prev_move = self.stacks.moves[ply - 1];
        let after_null_move = prev_move.is_null();

        self.stacks.hashes[ply] = board.hash();
        self.stacks.static_evals[ply] = static_eval;
        self.stacks.moves[ply] = Move::NULL;

        // Internal iterative reduction: a PV node with no table move is
        // searched one ply shallower to populate the table first.
        let mut depth = depth;
        if is_pv && depth >= 5 && entry.is_none() && !in_check && !skip_move_active {
            depth -= 1;
        }

        if !is_pv && !in_check && !skip_move_active {
            // Reverse futility pruning.
            if !is_close_to_mate(board, beta) && depth < 9 {
                let margin = 150 * (depth - Eval::from(!opponent_has_easy_capture));
                if static_eval - margin >= beta {
                    self.stats.reverse_futility_cutoffs += 1;
                    return (static_eval + beta) / 2;
                }
            }

            // Razoring: a hopeless static eval drops into quiescence.
            if !is_close_to_mate(board, alpha) && static_eval + 200 * depth < alpha {
                let razor_score = {
                    let mut probe = board.clone();
                    self.quiescence(&mut probe, alpha, beta, ply, false)
                };
                if razor_score <= alpha {
                    self.stats.razor_cutoffs += 1;
                    return razor_score;
                }
            }

            // Null move pruning.
            if depth > 2
                && !after_null_move
                && static_eval >= beta
                && !is_mate_score(beta)
                && board.has_officers(board.turn())
            {
                let reduction = 2 + Eval::from(improving) + depth / 4;
                let mut child = board.clone();
                child.perform_null_move();
                self.tt.prefetch(child.hash());
                self.stacks.moves[ply] = Move::NULL;
                let null_score = -self.alpha_beta(
                    &mut child,
                    -beta,
                    -beta + 1,
                    depth - reduction,
                    ply + 1,
                    false,
                    !cutnode,
                    total_extensions,
                    Move::NULL,
                );
                if null_score >= beta {
                    self.stats.null_move_cutoffs += 1;
                    return if is_mate_score(null_score) { beta } else { null_score };
                }
            }

            // ProbCut: a capture clearing a raised beta in quiescence and
            // confirmed by a reduced search cuts the node.
            let prob_beta = beta + PROBCUT_MARGIN;
            let tt_blocks_probcut = entry
                .as_ref()
                .map_or(false, |hit| hit.depth >= depth - 3 && hit.score < prob_beta);
            if depth >= 6 && !is_mate_score(beta) && !tt_blocks_probcut {
                let mut selector = MoveSelector::new(
                    &moves,
                    board,
                    &self.heuristics,
                    &self.stacks.moves,
                    ply,
                    tt_move,
                    prev_move,
                );
                selector.skip_quiets();
                let mut probcut_score = None;
                while let Some(mv) = selector.next(board) {
                    let mut child = board.clone();
                    child.perform_move(mv);
                    self.tt.prefetch(child.hash());
                    self.evaluator.push_move(board, mv);
                    self.stacks.moves[ply] = mv;

                    let mut score =
                        -self.quiescence(&mut child, -prob_beta, -prob_beta + 1, ply + 1, false);
                    if score >= prob_beta {
                        score = -self.alpha_beta(
                            &mut child,
                            -prob_beta,
                            -prob_beta + 1,
                            depth - 4,
                            ply + 1,
                            false,
                            cutnode,
                            total_extensions,
                            Move::NULL,
                        );
                    }

                    self.evaluator.pop_move();

                    if score >= prob_beta {
                        probcut_score = Some(score);
                        break;
                    }
                }
                if let Some(score) = probcut_score {
                    self.stats.probcuts += 1;
                    return score;
                }
            }
        }

        let mut selector = MoveSelector::new(
            &moves,
            board,
            &self.heuristics,
            &self.stacks.moves,
            ply,
            tt_move,
            prev_move,
        );

        let mut best_move = Move::NULL;
        let mut move_number: usize = 0;
        let mut quiets_tried = [Move::NULL; 64];
        let mut num_quiets_tried = 0usize;
        let mut captures_tried = [Move::NULL; 32];
        let mut num_captures_tried = 0usize;

        while let Some(mv) = selector.next(board) {
            if mv == skip_move {
                continue;
            }

            // Move-loop pruning, disabled in data-generation mode and
            // whenever the score would matter for mate reasoning.
            if !self.params.datagen
                && !is_pv
                && board.has_officers(board.turn())
                && !is_losing_score(best_score)
            {
                if !mv.is_promotion() && !mv.is_castle() {
                    let margin = self.static_prune_margins[usize::from(mv.is_capture())]
                        [depth.clamp(0, super::MAX_DEPTH - 1) as usize];
                    if !board.see_ge(mv, margin) {
                        self.stats.see_pruned += 1;
                        continue;
                    }
                }

                // Late move pruning: quiet moves after the threshold are
                // skipped wholesale.
                if !in_check
                    && !selector.is_skipping_quiets()
                    && move_number as u32
                        >= self.lmp_thresholds[usize::from(improving)]
                            [depth.clamp(0, super::MAX_DEPTH - 1) as usize]
                {
                    self.stats.lmp_pruned += selector.num_quiets_left() as u64;
                    selector.skip_quiets();
                }

                // History pruning at shallow depth; killers and counters
                // survive even with a bad history score.
                if depth < 4
                    && mv.is_quiet()
                    && move_number != 0
                    && self.heuristics.quiet.get(mv, board.turn()) < -3000 * depth
                    && !self.heuristics.killers.contains(mv, ply)
                    && !self.heuristics.counters.contains(mv, prev_move, board.turn())
                {
                    self.stats.history_pruned += selector.num_quiets_left() as u64 + 1;
                    selector.skip_quiets();
                    continue;
                }

                // Futility pruning on quiet moves.
                if mv.is_quiet()
                    && move_number >= 1
                    && depth <= 10
                    && !in_check
                    && static_eval + 150 * (depth + 1) <= alpha
                {
                    self.stats.futility_pruned += selector.num_quiets_left() as u64;
                    selector.skip_quiets();
                    continue;
                }
            }

            let mut child = board.clone();
            child.perform_move(mv);
            self.tt.prefetch(child.hash());
            let check_or_checking = in_check || child.is_checked();

            // A forced reply is searched a ply deeper.
            let mut extension: u32 = u32::from(moves.len() == 1);

            // Singular extension: when the table move stands far above
            // every alternative, extend it; when even the alternatives
            // beat beta, the node is a multicut.
            if !skip_move_active
                && extension == 0
                && moves.len() > 1
                && depth >= SINGULAR_MIN_DEPTH
                && mv == tt_move
            {
                if let Some(hit) = &entry {
                    if hit.flag != TtFlag::UpperBound
                        && hit.depth >= depth - 2
                        && !is_mate_score(hit.score)
                    {
                        let singular_beta = hit.score - SINGULAR_MARGIN * (depth / 2);
                        let singular_depth = (depth - 1) / 2;
                        let singular_score = self.alpha_beta(
                            board,
                            singular_beta - 1,
                            singular_beta,
                            singular_depth,
                            ply,
                            false,
                            cutnode,
                            total_extensions,
                            mv,
                        );

                        if singular_score < singular_beta {
                            self.stats.singular_extensions += 1;
                            extension = 1;
                        } else if !is_pv
                            && singular_beta >= beta
                            && !is_mate_score(singular_score)
                        {
                            self.stats.singular_cuts += 1;
                            return singular_beta;
                        }
                    }
                }
            }

            if total_extensions > MAX_TOTAL_EXTENSIONS {
                extension = 0;
            }

            self.evaluator.push_move(board, mv);
            self.stacks.moves[ply] = mv;

            let new_depth = depth + extension as i32 - 1;
            total_extensions += extension;

            let mut score: Eval;
            if move_number == 0 {
                score = -self.alpha_beta(
                    &mut child,
                    -beta,
                    -alpha,
                    new_depth,
                    ply + 1,
                    is_pv,
                    !(is_pv || cutnode),
                    total_extensions,
                    Move::NULL,
                );
            } else {
                // Late move reductions for quiet moves clear of checks.
                let mut reduction: i32 = 0;
                if depth >= 3 && !mv.is_capture() && !check_or_checking && !is_mate_score(best_score)
                {
                    reduction = self.lmr_reduction(depth, move_number);
                    reduction += i32::from(worsening);
                    reduction += i32::from(cutnode);
                    reduction -= i32::from(self.heuristics.killers.contains(mv, ply));
                    reduction -=
                        i32::from(self.heuristics.counters.contains(mv, prev_move, board.turn()));
                    reduction -= i32::from(is_pv);
                    reduction = reduction.max(0);
                }

                let reduced_depth = new_depth - reduction;
                score = -self.alpha_beta(
                    &mut child,
                    -alpha - 1,
                    -alpha,
                    reduced_depth,
                    ply + 1,
                    false,
                    !cutnode,
                    total_extensions,
                    Move::NULL,
                );

                // A reduced search beating alpha is repeated at full
                // depth, and a PV node repeats in the full window.
                if score > alpha && new_depth > reduced_depth {
                    score = -self.alpha_beta(
                        &mut child,
                        -alpha - 1,
                        -alpha,
                        new_depth,
                        ply + 1,
                        false,
                        !cutnode,
                        total_extensions,
                        Move::NULL,
                    );
                }
                if score > alpha && is_pv {
                    score = -self.alpha_beta(
                        &mut child,
                        -beta,
                        -alpha,
                        new_depth,
                        ply + 1,
                        true,
                        false,
                        total_extensions,
                        Move::NULL,
                    );
                }
            }

            self.evaluator.pop_move();

            if score > best_score {
                if is_pv {
                    self.pv.update(mv, ply);
                }
                best_score = score;
                best_move = mv;
            }
            alpha = alpha.max(best_score);

            if alpha >= beta {
                if mv.is_quiet() {
                    self.heuristics.killers.add(mv, ply);
                    self.heuristics.counters.set(mv, prev_move, board.turn());
                    self.heuristics.quiet.update(
                        mv,
                        &quiets_tried[..num_quiets_tried],
                        depth,
                        board.turn(),
                    );
                    self.heuristics.continuation.update(
                        &self.stacks.moves,
                        ply,
                        mv,
                        &quiets_tried[..num_quiets_tried],
                        depth,
                        board.turn(),
                    );
                }
                if mv.is_capture() {
                    self.heuristics.capture.update(
                        mv,
                        &captures_tried[..num_captures_tried],
                        depth,
                        board.turn(),
                    );
                }
                break;
            }

            move_number += 1;
            if mv.is_quiet() && num_quiets_tried < quiets_tried.len() {
                quiets_tried[num_quiets_tried] = mv;
                num_quiets_tried += 1;
            }
            if mv.is_capture() && num_captures_tried < captures_tried.len() {
                captures_tried[num_captures_tried] = mv;
                num_captures_tried += 1;
            }
        }

        if self.stopped {
            return 0;
        }

        best_score = best_score.min(max_score);

        if !skip_move_active {
            let flag = if best_score <= original_alpha {
                TtFlag::UpperBound
            } else if best_score >= beta {
                TtFlag::LowerBound
            } else if is_pv {
                TtFlag::Exact
            } else {
                TtFlag::UpperBound
            };

            self.tt.store(
                board.hash(),
                best_score,
                best_move.packed(),
                is_pv,
                depth,
                ply,
                raw_eval,
                flag,
                self.num_pieces_root,
                board.num_pieces(),
            );

            // The correction history absorbs consistent gaps between the
            // static eval and the search result of quiet positions.
            let directional_flag = if best_score >= static_eval {
                TtFlag::LowerBound
            } else {
                TtFlag::UpperBound
            };
            if !in_check
                && !best_move.is_capture()
                && (flag == TtFlag::Exact || flag == directional_flag)
            {
                self.heuristics
                    .correction
                    .update(board, best_score, static_eval, depth);
            }
        }

        best_score
    }
}
