//! Applying moves to the board with incremental hash updates.

use once_cell::sync::Lazy;

use super::state::Board;
use super::types::{
    CastlingRights, Color, Move, Piece, Square, CASTLE_BLACK_KING, CASTLE_BLACK_QUEEN,
    CASTLE_WHITE_KING, CASTLE_WHITE_QUEEN,
};
use super::zobrist::KEYS;

/// Castle rights lost when a piece moves from or to each square.
static RIGHTS_REVOKED: Lazy<[u8; 64]> = Lazy::new(|| {
    let mut table = [0u8; 64];
    table[Square::E1.index()] = CastlingRights::WHITE_KING | CastlingRights::WHITE_QUEEN;
    table[Square::A1.index()] = CastlingRights::WHITE_QUEEN;
    table[Square::H1.index()] = CastlingRights::WHITE_KING;
    table[Square::E8.index()] = CastlingRights::BLACK_KING | CastlingRights::BLACK_QUEEN;
    table[Square::A8.index()] = CastlingRights::BLACK_QUEEN;
    table[Square::H8.index()] = CastlingRights::BLACK_KING;
    table
});

impl Board {
    /// Apply a legal move: bitboards, `pieces[]`, castle rights,
    /// en-passant state, clocks and all three hashes are updated
    /// incrementally, and memoised derived state is invalidated.
    pub fn perform_move(&mut self, mv: Move) {
        debug_assert!(!mv.is_null());
        let us = self.turn;
        let them = us.opponent();
        let from = mv.from();
        let to = mv.to();
        let moved = mv.moved_piece();
        debug_assert_eq!(self.piece_kind_at(from), Some(moved), "{self}\n{mv:?}");

        // The old en-passant state always leaves the hashes.
        self.hash ^= KEYS.en_passant(self.en_passant_square);
        self.pawn_hash ^= KEYS.en_passant(self.en_passant_square);

        // Captures, including the en-passant target pawn.
        if mv.is_en_passant() {
            let target = self.en_passant_target.expect("en passant state is set");
            self.remove_piece(target, them);
            let key = KEYS.piece(Piece::Pawn, them, target);
            self.hash ^= key;
            self.pawn_hash ^= key;
            self.material_drop(Piece::Pawn, them);
        } else if let Some(captured) = mv.captured_piece() {
            debug_assert_eq!(self.piece_kind_at(to), Some(captured), "{self}\n{mv:?}");
            self.remove_piece(to, them);
            let key = KEYS.piece(captured, them, to);
            self.hash ^= key;
            if captured == Piece::Pawn {
                self.pawn_hash ^= key;
            }
            self.material_drop(captured, them);
        }

        // Move the piece, possibly changing its kind on promotion.
        self.remove_piece(from, us);
        self.hash ^= KEYS.piece(moved, us, from);
        if let Some(promo) = mv.promotion() {
            self.set_piece(to, us, promo);
            self.hash ^= KEYS.piece(promo, us, to);
            self.pawn_hash ^= KEYS.piece(Piece::Pawn, us, from);
            self.material_drop(Piece::Pawn, us);
            self.material_gain(promo, us);
        } else {
            self.set_piece(to, us, moved);
            self.hash ^= KEYS.piece(moved, us, to);
            if moved == Piece::Pawn {
                self.pawn_hash ^= KEYS.piece(Piece::Pawn, us, from);
                self.pawn_hash ^= KEYS.piece(Piece::Pawn, us, to);
            }
        }

        // The castle rook accompanies the king.
        if mv.is_castle() {
            let (rook_from, rook_to) = match mv.castle_side() {
                CASTLE_WHITE_KING => (Square::H1, Square::F1),
                CASTLE_WHITE_QUEEN => (Square::A1, Square::D1),
                CASTLE_BLACK_KING => (Square::H8, Square::F8),
                CASTLE_BLACK_QUEEN => (Square::A8, Square::D8),
                _ => unreachable!("castle move without a castle side"),
            };
            self.remove_piece(rook_from, us);
            self.set_piece(rook_to, us, Piece::Rook);
            self.hash ^= KEYS.piece(Piece::Rook, us, rook_from);
            self.hash ^= KEYS.piece(Piece::Rook, us, rook_to);
        }

        // New en-passant state appears only after a double pawn push.
        if mv.is_double_push() {
            let behind = if us == Color::White { to.offset(-8) } else { to.offset(8) };
            self.en_passant_square = Some(behind);
            self.en_passant_target = Some(to);
        } else {
            self.en_passant_square = None;
            self.en_passant_target = None;
        }
        self.hash ^= KEYS.en_passant(self.en_passant_square);
        self.pawn_hash ^= KEYS.en_passant(self.en_passant_square);

        // Castle rights are revoked when the king or a rook leaves its
        // home square, or a rook is captured on one.
        let revoked = RIGHTS_REVOKED[from.index()] | RIGHTS_REVOKED[to.index()];
        if self.castle_rights.bits() & revoked != 0 {
            self.hash ^= KEYS.castling(self.castle_rights);
            self.castle_rights.remove(revoked);
            self.hash ^= KEYS.castling(self.castle_rights);
        }

        // Clocks and side to move.
        if moved == Piece::Pawn || mv.is_capture() {
            self.rule50 = 0;
        } else {
            self.rule50 = self.rule50.saturating_add(1);
        }
        if us == Color::Black {
            self.full_moves += 1;
        }
        self.turn = them;
        self.hash ^= KEYS.side_to_move();

        self.invalidate_derived();

        #[cfg(debug_assertions)]
        {
            let (hash, pawn_hash, material_hash) = self.fresh_hashes();
            assert_eq!(self.hash, hash, "incremental hash diverged\n{self}\n{mv:?}");
            assert_eq!(self.pawn_hash, pawn_hash, "incremental pawn hash diverged\n{self}\n{mv:?}");
            assert_eq!(
                self.material_hash, material_hash,
                "incremental material hash diverged\n{self}\n{mv:?}"
            );
            self.debug_validate();
        }
    }

    /// Swap the side to move without moving a piece: en passant is
    /// cleared, the half-move clock advances and the hashes follow.
    pub fn perform_null_move(&mut self) {
        self.hash ^= KEYS.en_passant(self.en_passant_square);
        self.pawn_hash ^= KEYS.en_passant(self.en_passant_square);
        self.en_passant_square = None;
        self.en_passant_target = None;
        self.hash ^= KEYS.en_passant(None);
        self.pawn_hash ^= KEYS.en_passant(None);

        self.rule50 = self.rule50.saturating_add(1);
        self.turn = self.turn.opponent();
        self.hash ^= KEYS.side_to_move();

        self.invalidate_derived();

        #[cfg(debug_assertions)]
        {
            let (hash, pawn_hash, _) = self.fresh_hashes();
            assert_eq!(self.hash, hash, "null move hash diverged\n{self}");
            assert_eq!(self.pawn_hash, pawn_hash, "null move pawn hash diverged\n{self}");
        }
    }

    /// Material-hash bookkeeping for one piece leaving the board.
    fn material_drop(&mut self, piece: Piece, color: Color) {
        let new_count = self.typed(piece, color).popcount() as usize;
        self.material_hash ^= KEYS.material(piece, color, new_count + 1);
        self.material_hash ^= KEYS.material(piece, color, new_count);
    }

    /// Material-hash bookkeeping for one piece entering the board.
    fn material_gain(&mut self, piece: Piece, color: Color) {
        let new_count = self.typed(piece, color).popcount() as usize;
        self.material_hash ^= KEYS.material(piece, color, new_count - 1);
        self.material_hash ^= KEYS.material(piece, color, new_count);
    }
}

#[cfg(test)]
mod tests {
    use super::super::fen;
    use super::*;

    fn board(fen_str: &str) -> Board {
        fen::parse(fen_str).unwrap()
    }

    fn play(board: &mut Board, moves: &[&str]) {
        for notation in moves {
            let mv = board.parse_move(notation).unwrap();
            board.perform_move(mv);
        }
    }

    #[test]
    fn simple_opening_sequence() {
        let mut b = Board::new();
        play(&mut b, &["e2e4", "e7e5", "g1f3"]);
        assert_eq!(
            fen::format(&b),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn double_push_sets_en_passant() {
        let mut b = Board::new();
        play(&mut b, &["e2e4"]);
        assert_eq!(b.en_passant_square(), Some("e3".parse().unwrap()));
        play(&mut b, &["g8f6"]);
        assert_eq!(b.en_passant_square(), None);
    }

    #[test]
    fn en_passant_removes_the_captured_pawn() {
        let mut b = board("4k3/8/8/8/1p6/8/P7/4K3 w - - 0 1");
        play(&mut b, &["a2a4", "b4a3"]);
        assert_eq!(b.piece_at("a4".parse().unwrap()), None);
        assert_eq!(
            b.piece_at("a3".parse().unwrap()),
            Some((Color::Black, Piece::Pawn))
        );
        assert_eq!(b.typed(Piece::Pawn, Color::White).popcount(), 0);
    }

    #[test]
    fn castling_moves_the_rook() {
        let mut b = board("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1");
        play(&mut b, &["e1g1"]);
        assert_eq!(b.piece_at(Square::G1), Some((Color::White, Piece::King)));
        assert_eq!(b.piece_at(Square::F1), Some((Color::White, Piece::Rook)));
        assert_eq!(b.piece_at(Square::H1), None);
        assert!(!b.castle_rights().has(CastlingRights::WHITE_KING));
        assert!(!b.castle_rights().has(CastlingRights::WHITE_QUEEN));
        assert!(b.castle_rights().has(CastlingRights::BLACK_KING));

        play(&mut b, &["e8c8"]);
        assert_eq!(b.piece_at(Square::C8), Some((Color::Black, Piece::King)));
        assert_eq!(b.piece_at(Square::D8), Some((Color::Black, Piece::Rook)));
        assert!(b.castle_rights().is_empty());
    }

    #[test]
    fn rook_capture_revokes_rights() {
        let mut b = board("r3k2r/8/8/8/8/8/6B1/R3K2R w KQkq - 0 1");
        // Bishop takes the a8 rook: Black loses queenside castling.
        play(&mut b, &["g2a8"]);
        assert!(!b.castle_rights().has(CastlingRights::BLACK_QUEEN));
        assert!(b.castle_rights().has(CastlingRights::BLACK_KING));
    }

    #[test]
    fn promotion_changes_material() {
        let mut b = board("4k3/P7/8/8/8/8/8/4K3 w - - 0 1");
        let before = b.material_hash();
        play(&mut b, &["a7a8q"]);
        assert_ne!(b.material_hash(), before);
        assert_eq!(b.typed(Piece::Queen, Color::White).popcount(), 1);
        assert_eq!(b.typed(Piece::Pawn, Color::White).popcount(), 0);
    }

    #[test]
    fn material_hash_is_permutation_stable() {
        // The same piece sets on different squares hash identically.
        let a = board("4k3/8/8/3N4/8/8/8/4K3 w - - 0 1");
        let b = board("4k3/8/8/8/8/8/N7/4K3 w - - 0 1");
        assert_eq!(a.material_hash(), b.material_hash());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn rule50_resets_on_pawn_moves_and_captures() {
        let mut b = Board::new();
        play(&mut b, &["g1f3", "g8f6"]);
        assert_eq!(b.rule50(), 2);
        play(&mut b, &["e2e4"]);
        assert_eq!(b.rule50(), 0);
        play(&mut b, &["f6e4"]);
        assert_eq!(b.rule50(), 0);
    }

    #[test]
    fn null_move_swaps_turn_and_clears_ep() {
        let mut b = Board::new();
        play(&mut b, &["e2e4"]);
        let hash_before = b.hash();
        b.perform_null_move();
        assert_eq!(b.turn(), Color::White.opponent());
        assert_eq!(b.en_passant_square(), None);
        assert_ne!(b.hash(), hash_before);
    }

    #[test]
    fn full_moves_increment_after_black() {
        let mut b = Board::new();
        play(&mut b, &["e2e4"]);
        assert_eq!(b.full_moves(), 1);
        play(&mut b, &["e7e5"]);
        assert_eq!(b.full_moves(), 2);
    }
}
