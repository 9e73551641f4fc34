//! End-to-end search scenarios: legality of returned moves, forced
//! mates, repetition handling, transposition table lifecycle and the
//! stop protocol.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cobalt::board::{fen, Board, Move};
use cobalt::eval::{is_real_mate_score, mate_distance, MATE_SCORE};
use cobalt::search::{SearchInfo, SearchParameters, Searcher};

fn depth_params(depth: i32) -> SearchParameters {
    SearchParameters {
        depth: Some(depth),
        ..SearchParameters::default()
    }
}

#[test]
fn depth_one_returns_a_legal_move_with_sane_score() {
    let mut searcher = Searcher::new(8);
    let infos: Arc<Mutex<Vec<SearchInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    searcher.set_info_callback(Arc::new(move |info| {
        sink.lock().unwrap().push(info.clone());
    }));

    let mut board = Board::new();
    let (best_move, score) = searcher.search(board.clone(), depth_params(1));

    assert!(!best_move.is_null());
    assert!(board.get_legal_moves().contains(&best_move));
    assert!(score.abs() < 100, "startpos scored {score}");

    let infos = infos.lock().unwrap();
    assert!(!infos.is_empty());
    assert!(!infos.last().unwrap().pv.is_empty());
}

#[test]
fn queen_endgame_is_a_forced_mate() {
    let board = fen::parse("8/8/8/8/1k6/8/1K5Q/8 w - - 0 1").unwrap();
    let mut searcher = Searcher::new(16);
    let infos: Arc<Mutex<Vec<SearchInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    searcher.set_info_callback(Arc::new(move |info| {
        sink.lock().unwrap().push(info.clone());
    }));

    let (best_move, score) = searcher.search(board.clone(), depth_params(10));
    assert!(!best_move.is_null());
    assert!(is_real_mate_score(score), "expected mate, got {score}");
    assert!(score > 0);

    // The PV must deliver the mate it claims.
    let pv = infos.lock().unwrap().last().unwrap().pv.clone();
    let mut replay = board;
    for mv in &pv {
        let legal: Vec<Move> = replay.get_legal_moves().to_vec();
        assert!(legal.contains(mv), "PV move {mv} is illegal");
        replay.perform_move(*mv);
    }
    assert!(replay.is_checked());
    assert!(!replay.has_legal_move(), "PV does not end in mate");
}

#[test]
fn repetition_history_forces_the_non_repeating_mate() {
    let board = fen::parse("k7/1p1p1p2/pPpPpPp1/P1P1P1P1/R7/8/8/K7 w - - 0 1").unwrap();
    let mut searcher = Searcher::new(16);
    let infos: Arc<Mutex<Vec<SearchInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    searcher.set_info_callback(Arc::new(move |info| {
        sink.lock().unwrap().push(info.clone());
    }));

    // The root position has already occurred twice in the game; any
    // line passing through it again is a draw by repetition, so the
    // engine must head straight for the corner mate.
    let mut history = HashMap::new();
    history.insert(board.hash(), 2);
    searcher.set_game_history(history);

    let (best_move, score) = searcher.search(board.clone(), depth_params(8));
    assert!(!best_move.is_null());
    assert!(is_real_mate_score(score), "expected mate, got {score}");
    assert!(score > 0);
    let plies = mate_distance(score);
    assert!(plies <= 5, "mate takes {plies} plies, expected at most five");

    // The winning line must mate without ever revisiting the root.
    let pv = infos.lock().unwrap().last().unwrap().pv.clone();
    let mut replay = board.clone();
    for mv in &pv {
        let legal: Vec<Move> = replay.get_legal_moves().to_vec();
        assert!(legal.contains(mv), "PV move {mv} is illegal");
        replay.perform_move(*mv);
        assert_ne!(replay.hash(), board.hash(), "PV repeats the drawn position");
    }
    assert!(replay.is_checked());
    assert!(!replay.has_legal_move(), "PV does not end in mate");
}

#[test]
fn mate_in_one_positions() {
    // Back-rank and supported-queen mates.
    for fen_str in [
        "6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1",
        "k7/2K5/8/8/8/8/8/1Q6 w - - 0 1",
    ] {
        let mut board = fen::parse(fen_str).unwrap();
        let mut searcher = Searcher::new(8);
        let (best_move, score) = searcher.search(board.clone(), depth_params(4));
        assert_eq!(score, MATE_SCORE - 1, "in {fen_str}");
        board.perform_move(best_move);
        assert!(board.is_checked(), "in {fen_str}");
        assert!(!board.has_legal_move(), "{best_move} does not mate in {fen_str}");
    }
}

#[test]
fn tt_survives_searches_and_clears_on_new_game() {
    let mut searcher = Searcher::new(1);
    let (_, _) = searcher.search(Board::new(), depth_params(6));
    assert!(searcher.hashfull_per_mille() > 0, "table unused by a depth-6 search");

    searcher.new_game();
    assert_eq!(searcher.hashfull_per_mille(), 0, "ucinewgame must clear the table");
}

#[test]
fn stop_flag_ends_an_infinite_search_quickly() {
    let mut searcher = Searcher::new(8);
    let stop = searcher.stop_handle();

    let handle = std::thread::spawn(move || {
        let board = Board::new();
        searcher.search(board, SearchParameters::default())
    });

    std::thread::sleep(Duration::from_millis(10));
    let stop_sent = Instant::now();
    stop.store(true, Ordering::Relaxed);

    let (best_move, _) = handle.join().unwrap();
    assert!(
        stop_sent.elapsed() < Duration::from_millis(50),
        "stop took {:?}",
        stop_sent.elapsed()
    );
    assert!(!best_move.is_null());
    let mut board = Board::new();
    assert!(board.get_legal_moves().contains(&best_move));
}

#[test]
fn fifty_move_and_material_draws_score_zero() {
    // K+B vs K is a dead draw whatever the depth.
    let board = fen::parse("8/8/3k4/8/8/3KB3/8/8 w - - 0 1").unwrap();
    let mut searcher = Searcher::new(8);
    let (_, score) = searcher.search(board, depth_params(6));
    assert_eq!(score, 0);
}

#[test]
fn search_respects_searchmoves() {
    let mut board = Board::new();
    let forced = board.parse_move("a2a3").unwrap();
    let mut searcher = Searcher::new(8);
    let params = SearchParameters {
        depth: Some(4),
        search_moves: vec![forced],
        ..SearchParameters::default()
    };
    let (best_move, _) = searcher.search(board, params);
    assert_eq!(best_move, forced);
}

#[test]
fn node_budget_is_respected() {
    let mut searcher = Searcher::new(8);
    let params = SearchParameters {
        nodes: Some(20_000),
        ..SearchParameters::default()
    };
    let (best_move, _) = searcher.search(Board::new(), params);
    assert!(!best_move.is_null());
}
