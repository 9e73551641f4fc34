//! Iterative-deepening alpha-beta search.
//!
//! The searcher owns the transposition table, the move-ordering
//! heuristics, the evaluator with its accumulator stack, and the
//! tablebase oracle. Boards are cloned per child node; all per-node
//! context (ancestor hashes, static evals, played moves) lives on
//! explicit stacks indexed by ply from root.

mod history;
mod node;
mod pv;
mod quiescence;
mod selector;

pub use history::SearchHistory;
pub use pv::PvTable;
pub use selector::{MoveSelector, Phase};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::board::{Board, Move, PackedMove};
use crate::eval::{
    clamp_eval, is_mate_score, is_real_mate_score, mate_distance, Eval, Evaluator, MATE_SCORE,
    TB_MATE_SCORE, TB_MAX_MATE_DISTANCE,
};
use crate::nnue::Network;
use crate::tb::{NoTablebase, TablebaseOracle, WdlResult};
use crate::timeman::Timer;
use crate::tt::{TranspositionTable, TtFlag};

/// Hard bound on the search stack depth.
pub const MAX_PLY: usize = 128;

/// Deepest iteration the iterative deepening loop will run.
pub const MAX_DEPTH: i32 = 100;

/// Default transposition table size in MiB.
pub const DEFAULT_TT_MB: usize = 32;

/// Limits and modes for one search.
#[derive(Clone, Default)]
pub struct SearchParameters {
    /// Depth budget; `None` searches until another limit fires.
    pub depth: Option<i32>,
    /// Node budget.
    pub nodes: Option<u64>,
    /// Allocated wall-clock time in milliseconds.
    pub time_ms: Option<u64>,
    /// Restrict the root to these moves (UCI `searchmoves`).
    pub search_moves: Vec<Move>,
    /// Self-play data generation: move-loop pruning is disabled so
    /// recorded scores stay unbiased.
    pub datagen: bool,
}

/// Counters reported at debug level after each search.
#[derive(Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub qsearch_nodes: u64,
    pub pv_nodes: u64,
    pub non_pv_nodes: u64,
    pub evaluations: u64,
    pub exact_tt_cutoffs: u64,
    pub lower_tt_cutoffs: u64,
    pub upper_tt_cutoffs: u64,
    pub null_move_cutoffs: u64,
    pub razor_cutoffs: u64,
    pub reverse_futility_cutoffs: u64,
    pub futility_pruned: u64,
    pub lmp_pruned: u64,
    pub history_pruned: u64,
    pub see_pruned: u64,
    pub singular_extensions: u64,
    pub singular_cuts: u64,
    pub probcuts: u64,
    pub aspiration_fails: u64,
    pub tb_hits: u64,
}

/// One completed depth iteration, handed to the info sink.
#[derive(Clone, Debug)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: usize,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
    pub score: Eval,
    /// Signed moves-to-mate when the score is a forced mate.
    pub mate_in: Option<i32>,
    pub hashfull: u32,
    pub tb_hits: u64,
    pub pv: Vec<Move>,
    /// Piece count at the root, for WDL normalisation downstream.
    pub root_pieces: u32,
}

/// Sink for per-iteration search info.
pub type InfoCallback = Arc<dyn Fn(&SearchInfo) + Send + Sync>;

/// Per-ply context stacks; no parent pointers exist anywhere.
pub(crate) struct SearchStacks {
    pub(crate) hashes: [u64; MAX_PLY],
    pub(crate) static_evals: [Eval; MAX_PLY],
    pub(crate) moves: [Move; MAX_PLY],
}

impl SearchStacks {
    fn new() -> Self {
        SearchStacks {
            hashes: [0; MAX_PLY],
            static_evals: [0; MAX_PLY],
            moves: [Move::NULL; MAX_PLY],
        }
    }
}

pub struct Searcher {
    pub(crate) tt: TranspositionTable,
    pub(crate) heuristics: SearchHistory,
    pub(crate) evaluator: Evaluator,
    pub(crate) tb: Box<dyn TablebaseOracle>,
    /// Position hashes from the game so far, with occurrence counts, for
    /// cross-search repetition detection.
    game_history: HashMap<u64, u8>,
    stop: Arc<AtomicBool>,

    // Per-search state.
    pub(crate) params: SearchParameters,
    pub(crate) stacks: SearchStacks,
    pub(crate) pv: PvTable,
    pub(crate) timer: Timer,
    pub(crate) nodes: u64,
    pub(crate) seldepth: usize,
    pub(crate) num_pieces_root: u32,
    pub(crate) stats: SearchStats,
    pub(crate) stopped: bool,
    /// Budget checks are held off until the first iteration completes so
    /// a best move always exists.
    pub(crate) first_iteration_done: bool,

    lmr_reductions: Box<[[u8; 256]; MAX_DEPTH as usize]>,
    pub(crate) lmp_thresholds: [[u32; MAX_DEPTH as usize]; 2],
    pub(crate) static_prune_margins: [[Eval; MAX_DEPTH as usize]; 2],

    info_callback: Option<InfoCallback>,
}

impl Searcher {
    #[must_use]
    pub fn new(tt_mb: usize) -> Self {
        let mut lmr_reductions = Box::new([[0u8; 256]; MAX_DEPTH as usize]);
        for (depth, row) in lmr_reductions.iter_mut().enumerate().skip(1) {
            for (move_number, cell) in row.iter_mut().enumerate().skip(1) {
                let reduction =
                    (move_number as f64).log2() * (depth as f64).log2() / 4.0;
                *cell = reduction as u8;
            }
        }

        let mut lmp_thresholds = [[0u32; MAX_DEPTH as usize]; 2];
        let mut static_prune_margins = [[0; MAX_DEPTH as usize]; 2];
        for depth in 0..MAX_DEPTH as usize {
            let d = depth as f64;
            lmp_thresholds[0][depth] = (1.5 + 0.5 * d * d) as u32;
            lmp_thresholds[1][depth] = (3.0 + 1.5 * d * d) as u32;
            let d = depth as Eval;
            static_prune_margins[0][depth] = (-25 * d * d).clamp(-10_000, 0);
            static_prune_margins[1][depth] = (-100 * d).clamp(-10_000, 0);
        }

        Searcher {
            tt: TranspositionTable::new(tt_mb),
            heuristics: SearchHistory::new(),
            evaluator: Evaluator::new(),
            tb: Box::new(NoTablebase),
            game_history: HashMap::new(),
            stop: Arc::new(AtomicBool::new(false)),
            params: SearchParameters::default(),
            stacks: SearchStacks::new(),
            pv: PvTable::new(),
            timer: Timer::start(),
            nodes: 0,
            seldepth: 0,
            num_pieces_root: 32,
            stats: SearchStats::default(),
            stopped: false,
            first_iteration_done: false,
            lmr_reductions,
            lmp_thresholds,
            static_prune_margins,
            info_callback: None,
        }
    }

    /// The shared stop flag; setting it ends the search within 256 nodes.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn set_info_callback(&mut self, callback: InfoCallback) {
        self.info_callback = Some(callback);
    }

    pub fn resize_tt(&mut self, mb: usize) {
        self.tt.resize(mb);
    }

    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    /// `ucinewgame`: transposition table, heuristics and game history all
    /// start over.
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.heuristics.clear();
        self.game_history.clear();
    }

    pub fn set_tablebase(&mut self, tb: Box<dyn TablebaseOracle>) {
        self.tb = tb;
    }

    pub fn set_network(&mut self, network: Network) {
        self.evaluator.set_network(network);
    }

    pub fn set_game_history(&mut self, history: HashMap<u64, u8>) {
        self.game_history = history;
    }

    pub fn add_game_position(&mut self, hash: u64) {
        *self.game_history.entry(hash).or_insert(0) += 1;
    }

    #[must_use]
    pub fn hashfull_per_mille(&self) -> u32 {
        self.tt.hashfull_per_mille()
    }

    #[inline]
    pub(crate) fn lmr_reduction(&self, depth: i32, move_number: usize) -> i32 {
        let depth = (depth.max(0) as usize).min(MAX_DEPTH as usize - 1);
        let move_number = move_number.min(255);
        i32::from(self.lmr_reductions[depth][move_number])
    }

    /// Poll the stop conditions. The stop flag is honored immediately;
    /// time and node budgets only once the first iteration has finished,
    /// with the clock sampled every 256 nodes.
    pub(crate) fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.stop.load(Ordering::Relaxed) {
            self.stopped = true;
            return true;
        }
        if !self.first_iteration_done {
            return false;
        }
        if let Some(max_nodes) = self.params.nodes {
            if self.nodes >= max_nodes {
                self.stopped = true;
                return true;
            }
        }
        if (self.nodes & 0xFF) == 0 {
            if let Some(limit) = self.params.time_ms {
                if self.timer.elapsed_ms() >= limit {
                    self.stopped = true;
                    return true;
                }
            }
        }
        false
    }

    /// Draw detection at a search node: repetition against the current
    /// line (stride two, bounded by the half-move clock) and the game
    /// history, the fifty-move rule, and bare-material draws.
    pub(crate) fn is_draw(&self, board: &mut Board, ply_from_root: usize) -> bool {
        let limit = (ply_from_root).min(board.rule50() as usize);
        let mut back = 2;
        while back <= limit {
            if self.stacks.hashes[ply_from_root - back] == board.hash() {
                return true;
            }
            back += 2;
        }

        if self.game_history.get(&board.hash()).copied().unwrap_or(0) >= 2 {
            return true;
        }

        // Fifty-move draws require a legal reply; a mate on the
        // hundredth half-move still counts as mate.
        if board.rule50() >= 100 && (board.has_legal_move() || !board.is_checked()) {
            return true;
        }

        board.is_material_draw()
    }

    /// Raw static eval adjusted by the pawn correction history, clamped
    /// into the legal eval range. Mate scores and in-check nodes pass
    /// through untouched.
    pub(crate) fn adjust_eval(&self, board: &mut Board, raw_eval: Eval) -> Eval {
        if board.is_checked() || is_mate_score(raw_eval) {
            return raw_eval;
        }
        clamp_eval(raw_eval + self.heuristics.correction.get(board))
    }

    /// Resolve a packed TT move against this position's legal moves.
    pub(crate) fn resolve_tt_move(&self, board: &mut Board, packed: PackedMove) -> Move {
        if packed.is_null() {
            return Move::NULL;
        }
        board
            .get_legal_moves()
            .iter()
            .copied()
            .find(|m| {
                m.from() == packed.from()
                    && m.to() == packed.to()
                    && m.promotion() == packed.promotion()
            })
            .unwrap_or(Move::NULL)
    }

    /// Run a search and return the best move with its score. Never
    /// returns a null move for a position with any legal move.
    pub fn search(&mut self, mut board: Board, params: SearchParameters) -> (Move, Eval) {
        // The stop flag must be clear on every entry, whatever path the
        // previous search took out.
        self.stop.store(false, Ordering::Relaxed);
        self.stopped = false;
        self.first_iteration_done = false;
        self.params = params;
        self.nodes = 0;
        self.seldepth = 0;
        self.stats = SearchStats::default();
        self.pv.clear();
        self.timer = Timer::start();
        self.tt.increment_generation();
        self.num_pieces_root = board.num_pieces();

        let mut search_score: Eval = 0;
        let mut search_best_move = Move::NULL;

        // Root moves: an explicit searchmoves list, tablebase-filtered
        // moves, or the full legal set.
        let mut tb_root_result = WdlResult::Failed;
        let root_moves: Vec<Move> = if !self.params.search_moves.is_empty() {
            self.params.search_moves.clone()
        } else {
            let tb_filtered = if board.num_pieces() <= self.tb.max_pieces()
                && board.castle_rights().is_empty()
            {
                self.tb.probe_dtz(&mut board)
            } else {
                None
            };
            match tb_filtered {
                Some((wdl, moves)) if !moves.is_empty() => {
                    self.stats.tb_hits += 1;
                    tb_root_result = wdl;
                    moves
                }
                _ => board.get_legal_moves().to_vec(),
            }
        };
        if root_moves.is_empty() {
            log::warn!("search started in a position with no legal moves");
            return (Move::NULL, 0);
        }

        self.evaluator.init_accumulator_stack(&board);

        // Seed the best move from the table when its move is legal here,
        // so even an immediately stopped search has an answer.
        let raw_eval;
        if let Some(entry) = self.tt.probe(board.hash(), 0) {
            raw_eval = entry.static_eval;
            let tt_move = self.resolve_tt_move(&mut board, entry.packed_move);
            if root_moves.contains(&tt_move) {
                search_best_move = tt_move;
            }
        } else {
            raw_eval = self.evaluator.evaluate(&mut board, 0);
        }
        let static_eval = self.adjust_eval(&mut board, raw_eval);

        self.stacks.hashes[0] = board.hash();
        self.stacks.static_evals[0] = static_eval;
        self.stacks.moves[0] = Move::NULL;

        let mut depth: i32 = 0;
        while self.params.depth.map_or(true, |d| depth < d) {
            depth += 1;

            let mut alpha;
            let mut beta;
            let mut best_move = Move::NULL;
            let mut aspiration_alpha: Eval = 25;
            let mut aspiration_beta: Eval = 25;
            let mut rerun = true;

            while rerun && !self.stopped {
                rerun = false;
                best_move = Move::NULL;
                self.seldepth = 0;

                // Aspiration windows from depth 6, widened by doubling on
                // failure and abandoned near mate scores.
                let use_asp_alpha =
                    depth > 5 && search_score.abs() < 900 && aspiration_alpha < 600;
                let use_asp_beta = depth > 5 && search_score.abs() < 900 && aspiration_beta < 600;
                alpha = if use_asp_alpha { search_score - aspiration_alpha } else { -MATE_SCORE };
                beta = if use_asp_beta { search_score + aspiration_beta } else { MATE_SCORE };

                self.heuristics.killers.clear_ply(1);

                // The previous best move is searched first even when the
                // TT entry was lost to replacement.
                let mut selector = MoveSelector::new(
                    &root_moves,
                    &board,
                    &self.heuristics,
                    &self.stacks.moves,
                    0,
                    search_best_move,
                    Move::NULL,
                );

                let mut move_number = 0usize;
                while let Some(mv) = selector.next(&board) {
                    let mut child = board.clone();
                    child.perform_move(mv);
                    self.tt.prefetch(child.hash());
                    self.evaluator.push_move(&board, mv);
                    self.stacks.moves[0] = mv;

                    let score;
                    if move_number == 0 {
                        score =
                            -self.alpha_beta(&mut child, -beta, -alpha, depth - 1, 1, true, false, 0, Move::NULL);

                        // A first-move fail-low reruns with a wider alpha
                        // window.
                        if use_asp_alpha && score <= alpha && !self.stopped {
                            rerun = true;
                            aspiration_alpha += aspiration_alpha;
                            self.stats.aspiration_fails += 1;
                            self.evaluator.pop_move();
                            break;
                        }
                    } else {
                        let mut null_window_score = -self.alpha_beta(
                            &mut child,
                            -alpha - 1,
                            -alpha,
                            depth - 1,
                            1,
                            false,
                            true,
                            0,
                            Move::NULL,
                        );
                        if null_window_score > alpha && !self.stopped {
                            null_window_score = -self.alpha_beta(
                                &mut child,
                                -beta,
                                -alpha,
                                depth - 1,
                                1,
                                true,
                                false,
                                0,
                                Move::NULL,
                            );
                        }
                        score = null_window_score;
                    }

                    self.evaluator.pop_move();

                    if self.should_stop() {
                        break;
                    }

                    // Fail-high against the aspiration window reruns
                    // before the best move is updated, so a stopped
                    // search never returns a move scored outside the
                    // window.
                    if use_asp_beta && score >= beta {
                        rerun = true;
                        aspiration_beta += aspiration_beta;
                        self.stats.aspiration_fails += 1;
                        break;
                    }

                    if score > alpha {
                        self.pv.update(mv, 0);
                        alpha = score;
                        best_move = mv;
                    }
                    move_number += 1;
                }

                if !best_move.is_null() {
                    search_score = alpha;
                    search_best_move = best_move;
                }
            }

            if self.stopped {
                if depth == 1 {
                    log::warn!(
                        "search stopped before the first iteration completed: {}",
                        crate::board::fen::format(&board)
                    );
                }
                depth = (depth - 1).max(1);
                break;
            }

            self.first_iteration_done = true;

            self.tt.store(
                board.hash(),
                search_score,
                search_best_move.packed(),
                true,
                depth,
                0,
                raw_eval,
                TtFlag::Exact,
                self.num_pieces_root,
                self.num_pieces_root,
            );

            self.send_info(depth, search_score, tb_root_result);

            if depth >= MAX_DEPTH {
                break;
            }
        }

        // A search stopped before any move was scored falls back to the
        // first legal move rather than a null move.
        if search_best_move.is_null() {
            log::warn!("search stopped before evaluating any move; returning the first legal move");
            search_best_move = root_moves[0];
            search_score = 0;
        }

        self.stats.nodes = self.nodes;
        self.log_stats();

        (search_best_move, search_score)
    }

    fn send_info(&self, depth: i32, score: Eval, tb_result: WdlResult) {
        let Some(callback) = &self.info_callback else {
            return;
        };

        let time_ms = self.timer.elapsed_ms();
        let mut reported_score = score;
        let mate_in = if is_real_mate_score(score) {
            let plies = mate_distance(score);
            Some(if score > 0 { (plies + 1) / 2 } else { -(plies + 1) / 2 })
        } else {
            // A tablebase result at the root overrides a non-mate score.
            match tb_result {
                WdlResult::Draw => {
                    reported_score = 0;
                    None
                }
                WdlResult::Win => {
                    reported_score = TB_MATE_SCORE - TB_MAX_MATE_DISTANCE;
                    None
                }
                WdlResult::Loss => {
                    reported_score = -(TB_MATE_SCORE - TB_MAX_MATE_DISTANCE);
                    None
                }
                WdlResult::Failed => None,
            }
        };

        let info = SearchInfo {
            depth,
            seldepth: self.seldepth,
            time_ms,
            nodes: self.nodes,
            nps: if time_ms > 0 { self.nodes * 1000 / time_ms } else { 0 },
            score: reported_score,
            mate_in,
            hashfull: self.tt.hashfull_per_mille(),
            tb_hits: self.stats.tb_hits,
            pv: self.pv.best_line().to_vec(),
            root_pieces: self.num_pieces_root,
        };
        callback(&info);
    }

    fn log_stats(&self) {
        let stats = &self.stats;
        log::debug!(
            "search stats: nodes {} qnodes {} pv {} nonpv {} evals {} tt {}/{}/{} null {} razor {} rfp {} futility {} lmp {} history {} see {} singular {}+{} probcut {} asp {} tb {}",
            stats.nodes,
            stats.qsearch_nodes,
            stats.pv_nodes,
            stats.non_pv_nodes,
            stats.evaluations,
            stats.exact_tt_cutoffs,
            stats.lower_tt_cutoffs,
            stats.upper_tt_cutoffs,
            stats.null_move_cutoffs,
            stats.razor_cutoffs,
            stats.reverse_futility_cutoffs,
            stats.futility_pruned,
            stats.lmp_pruned,
            stats.history_pruned,
            stats.see_pruned,
            stats.singular_extensions,
            stats.singular_cuts,
            stats.probcuts,
            stats.aspiration_fails,
            stats.tb_hits,
        );
    }
}
