//! Board-level validation: perft counts and property tests.

use proptest::prelude::*;
use rand::prelude::*;
use rand::Rng;

use super::fen;
use super::state::Board;
use super::types::Move;
use crate::perft::perft;

fn perft_of(fen_str: &str, depth: u32) -> u64 {
    let mut board = fen::parse(fen_str).unwrap();
    perft(&mut board, depth)
}

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
const POS3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
const POS4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
const POS5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
const POS6: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

#[test]
fn perft_startpos() {
    let start = fen::START_FEN;
    assert_eq!(perft_of(start, 1), 20);
    assert_eq!(perft_of(start, 2), 400);
    assert_eq!(perft_of(start, 3), 8_902);
    assert_eq!(perft_of(start, 4), 197_281);
}

#[test]
fn perft_kiwipete() {
    assert_eq!(perft_of(KIWIPETE, 1), 48);
    assert_eq!(perft_of(KIWIPETE, 2), 2_039);
    assert_eq!(perft_of(KIWIPETE, 3), 97_862);
}

#[test]
fn perft_endgame_pins() {
    assert_eq!(perft_of(POS3, 1), 14);
    assert_eq!(perft_of(POS3, 2), 191);
    assert_eq!(perft_of(POS3, 3), 2_812);
    assert_eq!(perft_of(POS3, 4), 43_238);
}

#[test]
fn perft_promotion_position() {
    assert_eq!(perft_of(POS4, 1), 6);
    assert_eq!(perft_of(POS4, 2), 264);
    assert_eq!(perft_of(POS4, 3), 9_467);
}

#[test]
fn perft_castling_knight_position() {
    assert_eq!(perft_of(POS5, 1), 44);
    assert_eq!(perft_of(POS5, 2), 1_486);
    assert_eq!(perft_of(POS5, 3), 62_379);
}

#[test]
fn perft_symmetric_middlegame() {
    assert_eq!(perft_of(POS6, 1), 46);
    assert_eq!(perft_of(POS6, 2), 2_079);
    assert_eq!(perft_of(POS6, 3), 89_890);
}

#[test]
#[ignore = "minutes-long: full depth validation"]
fn perft_deep() {
    assert_eq!(perft_of(fen::START_FEN, 5), 4_865_609);
    assert_eq!(perft_of(fen::START_FEN, 6), 119_060_324);
    assert_eq!(perft_of(KIWIPETE, 4), 4_085_603);
    assert_eq!(perft_of(POS3, 5), 674_624);
    assert_eq!(perft_of(POS3, 6), 11_030_083);
    assert_eq!(perft_of(POS4, 4), 422_333);
    assert_eq!(perft_of(POS5, 4), 2_103_487);
    assert_eq!(perft_of(POS6, 4), 3_894_594);
}

/// Walk `num_moves` random legal moves from the start position.
fn random_walk(seed: u64, num_moves: usize) -> Board {
    let mut board = Board::new();
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..num_moves {
        let moves: Vec<Move> = board.get_legal_moves().to_vec();
        if moves.is_empty() {
            break;
        }
        let mv = moves[rng.gen_range(0..moves.len())];
        board.perform_move(mv);
    }
    board
}

proptest! {
    /// Incremental hashes equal the from-scratch recomputation after any
    /// legal move sequence, and after a null move.
    #[test]
    fn prop_incremental_hashes_match_recompute(seed in any::<u64>(), len in 1usize..40) {
        let mut board = random_walk(seed, len);
        let (hash, pawn_hash, material_hash) = board.fresh_hashes();
        prop_assert_eq!(board.hash(), hash);
        prop_assert_eq!(board.pawn_hash(), pawn_hash);
        prop_assert_eq!(board.material_hash(), material_hash);

        board.perform_null_move();
        let (null_hash, null_pawn_hash, _) = board.fresh_hashes();
        prop_assert_eq!(board.hash(), null_hash);
        prop_assert_eq!(board.pawn_hash(), null_pawn_hash);
    }

    /// Every board reached through legal moves satisfies the structural
    /// invariants.
    #[test]
    fn prop_legal_walks_preserve_invariants(seed in any::<u64>(), len in 1usize..60) {
        let board = random_walk(seed, len);
        board.debug_validate();
    }

    /// FEN round-trip is lossless for the positional fields.
    #[test]
    fn prop_fen_roundtrip(seed in any::<u64>(), len in 1usize..40) {
        let board = random_walk(seed, len);
        let fen_str = fen::format(&board);
        let restored = fen::parse(&fen_str).unwrap();
        prop_assert_eq!(fen::format(&restored), fen_str);
        prop_assert_eq!(restored.hash(), board.hash());
    }

    /// `has_legal_move` agrees with the generated move list.
    #[test]
    fn prop_has_legal_move_agrees(seed in any::<u64>(), len in 1usize..60) {
        let mut board = random_walk(seed, len);
        let mut probe = board.clone();
        let expected = !board.get_legal_moves().is_empty();
        prop_assert_eq!(probe.has_legal_move(), expected);
    }

    /// The capture generator yields exactly the capturing subset of the
    /// full move list.
    #[test]
    fn prop_capture_moves_are_the_capture_subset(seed in any::<u64>(), len in 1usize..40) {
        let mut board = random_walk(seed, len);
        let all: Vec<Move> = board.get_legal_moves().to_vec();
        let mut capture_board = board.clone();
        capture_board.invalidate_derived();
        let captures: Vec<Move> = capture_board.get_legal_capture_moves().to_vec();

        for mv in &captures {
            prop_assert!(mv.is_capture());
            prop_assert!(all.contains(mv));
        }
        prop_assert_eq!(captures.len(), all.iter().filter(|m| m.is_capture()).count());
    }

    /// Captures-and-checks contains the captures plus exactly the
    /// checking quiet moves.
    #[test]
    fn prop_capture_and_check_moves(seed in any::<u64>(), len in 1usize..25) {
        let mut board = random_walk(seed, len);
        let all: Vec<Move> = board.get_legal_moves().to_vec();
        let mut tactical_board = board.clone();
        tactical_board.invalidate_derived();
        let tactical: Vec<Move> = tactical_board.get_legal_capture_and_check_moves().to_vec();

        for mv in &all {
            let expected = mv.is_capture() || board.gives_check(*mv);
            prop_assert_eq!(tactical.contains(mv), expected);
        }
        for mv in &tactical {
            prop_assert!(all.contains(mv));
        }
    }
}
