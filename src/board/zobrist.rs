//! Zobrist keys for the position, pawn and material hashes.
//!
//! The key set is generated once from a fixed seed and is read-only
//! afterwards. The position hash covers pieces, en passant, castling
//! rights and the side to move; the pawn hash covers pawns and en passant
//! only; the material hash is indexed by per-(piece, color) counts and is
//! therefore stable under piece permutations.

use once_cell::sync::Lazy;
use rand::prelude::*;

use super::types::{CastlingRights, Color, Piece, Square};

/// Largest per-(piece, color) count the material hash can represent:
/// ten of a kind (two originals plus eight promotions).
pub(crate) const MAX_PIECE_COUNT: usize = 10;

pub(crate) struct ZobristKeys {
    /// One key per (piece, color, square).
    pieces: [[[u64; 64]; 2]; 6],
    /// One key per en-passant destination square; the empty slot (64) is
    /// zero so "no en passant" contributes nothing.
    en_passant: [u64; 65],
    /// One key per castle-rights mask.
    castling: [u64; 16],
    side_to_move: u64,
    /// One key per (piece, color, count); count zero is zero.
    material: [[[u64; MAX_PIECE_COUNT + 1]; 2]; 6],
}

impl ZobristKeys {
    fn generate() -> Self {
        let mut rng = StdRng::seed_from_u64(0x5EED_0F_C0BA17);

        let mut pieces = [[[0u64; 64]; 2]; 6];
        for piece in &mut pieces {
            for color in piece.iter_mut() {
                for key in color.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let mut en_passant = [0u64; 65];
        for key in &mut en_passant[..64] {
            *key = rng.gen();
        }

        let mut castling = [0u64; 16];
        for key in &mut castling {
            *key = rng.gen();
        }

        let side_to_move = rng.gen();

        let mut material = [[[0u64; MAX_PIECE_COUNT + 1]; 2]; 6];
        for piece in &mut material {
            for color in piece.iter_mut() {
                for key in color.iter_mut().skip(1) {
                    *key = rng.gen();
                }
            }
        }

        ZobristKeys {
            pieces,
            en_passant,
            castling,
            side_to_move,
            material,
        }
    }

    #[inline]
    pub(crate) fn piece(&self, piece: Piece, color: Color, sq: Square) -> u64 {
        self.pieces[piece.index()][color.index()][sq.index()]
    }

    #[inline]
    pub(crate) fn en_passant(&self, sq: Option<Square>) -> u64 {
        self.en_passant[sq.map_or(64, Square::index)]
    }

    #[inline]
    pub(crate) fn castling(&self, rights: CastlingRights) -> u64 {
        self.castling[rights.bits() as usize]
    }

    #[inline]
    pub(crate) fn side_to_move(&self) -> u64 {
        self.side_to_move
    }

    /// Key for "there are `count` pieces of this (piece, color)".
    #[inline]
    pub(crate) fn material(&self, piece: Piece, color: Color, count: usize) -> u64 {
        debug_assert!(count <= MAX_PIECE_COUNT);
        self.material[piece.index()][color.index()][count]
    }
}

pub(crate) static KEYS: Lazy<ZobristKeys> = Lazy::new(ZobristKeys::generate);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_are_zero() {
        assert_eq!(KEYS.en_passant(None), 0);
        assert_eq!(KEYS.material(Piece::Queen, Color::White, 0), 0);
    }

    #[test]
    fn keys_are_deterministic_and_distinct() {
        let again = ZobristKeys::generate();
        assert_eq!(
            KEYS.piece(Piece::Knight, Color::Black, Square::E8),
            again.piece(Piece::Knight, Color::Black, Square::E8)
        );
        assert_ne!(
            KEYS.piece(Piece::Knight, Color::Black, Square::E8),
            KEYS.piece(Piece::Knight, Color::White, Square::E8)
        );
        assert_ne!(KEYS.side_to_move(), 0);
    }
}
