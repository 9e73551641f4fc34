//! Board-level integration tests: hashing through played move
//! sequences, FEN round trips, draw rules.

use cobalt::board::{fen, Board, CastlingRights, Color};

fn play(board: &mut Board, moves: &[&str]) {
    for notation in moves {
        let mv = board.parse_move(notation).unwrap();
        board.perform_move(mv);
    }
}

#[test]
fn incremental_hash_matches_position_built_from_fen() {
    // The same position reached by moves and by FEN hashes identically.
    let mut played = Board::new();
    play(&mut played, &["e2e4", "e7e5", "g1f3"]);

    let parsed = fen::parse("rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2")
        .unwrap();
    assert_eq!(played.hash(), parsed.hash());
    assert_eq!(played.pawn_hash(), parsed.pawn_hash());
    assert_eq!(played.material_hash(), parsed.material_hash());
}

#[test]
fn transpositions_share_a_hash() {
    let mut a = Board::new();
    play(&mut a, &["g1f3", "g8f6", "b1c3", "b8c6"]);
    let mut b = Board::new();
    play(&mut b, &["b1c3", "b8c6", "g1f3", "g8f6"]);
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn en_passant_opportunity_distinguishes_hashes() {
    // With and without an en-passant square the hash must differ.
    let with_ep =
        fen::parse("rnbqkbnr/pppp1ppp/8/8/4pP2/8/PPPPP1PP/RNBQKBNR b KQkq f3 0 2").unwrap();
    let without_ep =
        fen::parse("rnbqkbnr/pppp1ppp/8/8/4pP2/8/PPPPP1PP/RNBQKBNR b KQkq - 0 2").unwrap();
    assert_ne!(with_ep.hash(), without_ep.hash());
}

#[test]
fn castling_rights_distinguish_hashes() {
    let full = fen::parse("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
    let partial = fen::parse("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w Qkq - 0 1").unwrap();
    assert_ne!(full.hash(), partial.hash());
    assert!(full.castle_rights().has(CastlingRights::WHITE_KING));
    assert!(!partial.castle_rights().has(CastlingRights::WHITE_KING));
}

#[test]
fn fen_round_trip_through_long_games() {
    let mut board = Board::new();
    play(
        &mut board,
        &[
            "e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6", "b1c3", "a7a6",
            "c1e3", "e7e5", "d4b3", "c8e6", "f2f3", "f8e7", "d1d2", "e8g8",
        ],
    );
    let fen_str = fen::format(&board);
    let reparsed = fen::parse(&fen_str).unwrap();
    assert_eq!(fen::format(&reparsed), fen_str);
    assert_eq!(reparsed.hash(), board.hash());
    assert_eq!(reparsed.turn(), Color::White);
}

#[test]
fn rule50_counter_round_trips() {
    let board = fen::parse("8/8/3k4/8/8/3K4/4R3/8 w - - 87 95").unwrap();
    assert_eq!(board.rule50(), 87);
    assert_eq!(board.full_moves(), 95);
    assert_eq!(fen::format(&board), "8/8/3k4/8/8/3K4/4R3/8 w - - 87 95");
}
