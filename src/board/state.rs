//! Board state: piece placement, derived bitboards, hashes and draw tests.

use std::fmt;

use once_cell::sync::Lazy;

use super::types::{Bitboard, CastlingRights, Color, Move, MoveList, Piece, Square};
use super::zobrist::KEYS;

/// Which entry point filled the legal move buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum MovesetTag {
    None,
    All,
    Captures,
    CapturesAndChecks,
}

/// Full position state. Cloned per child node during search; all derived
/// state (pin geometry, check flag, move buffer) is memoised and
/// invalidated by `perform_move` / `perform_null_move`.
#[derive(Clone)]
pub struct Board {
    pub(crate) turn: Color,
    /// Piece kind per square, kept in sync with the bitboards. The color
    /// is recovered from `bb_color`.
    pub(crate) pieces: [Option<Piece>; 64],
    pub(crate) bb_all: Bitboard,
    pub(crate) bb_color: [Bitboard; 2],
    pub(crate) bb_typed: [[Bitboard; 2]; 6],
    pub(crate) castle_rights: CastlingRights,
    /// Destination square of the current en-passant opportunity.
    pub(crate) en_passant_square: Option<Square>,
    /// Square of the pawn that would be captured en passant.
    pub(crate) en_passant_target: Option<Square>,
    /// Half-move clock since the last capture or pawn move.
    pub(crate) rule50: u8,
    pub(crate) full_moves: u16,
    pub(crate) hash: u64,
    pub(crate) pawn_hash: u64,
    pub(crate) material_hash: u64,
    /// Pieces of either color shielding king `c` from a slider of color `!c`.
    pub(crate) blockers: [Bitboard; 2],
    /// Sliders of color `!c` pinning a blocker against king `c`.
    pub(crate) pinners: [Bitboard; 2],
    /// For each blocker square, the square of its pinner.
    pub(crate) pinner_of_blocker: [u8; 64],
    pub(crate) checked_cache: Option<bool>,
    pub(crate) move_list: MoveList,
    pub(crate) moveset: MovesetTag,
}

impl Board {
    /// The standard starting position.
    #[must_use]
    pub fn new() -> Self {
        super::fen::parse(super::fen::START_FEN).expect("start FEN is valid")
    }

    pub(crate) fn empty() -> Self {
        Board {
            turn: Color::White,
            pieces: [None; 64],
            bb_all: Bitboard::EMPTY,
            bb_color: [Bitboard::EMPTY; 2],
            bb_typed: [[Bitboard::EMPTY; 2]; 6],
            castle_rights: CastlingRights::NONE,
            en_passant_square: None,
            en_passant_target: None,
            rule50: 0,
            full_moves: 1,
            hash: 0,
            pawn_hash: 0,
            material_hash: 0,
            blockers: [Bitboard::EMPTY; 2],
            pinners: [Bitboard::EMPTY; 2],
            pinner_of_blocker: [0; 64],
            checked_cache: None,
            move_list: MoveList::new(),
            moveset: MovesetTag::None,
        }
    }

    #[inline]
    #[must_use]
    pub fn turn(&self) -> Color {
        self.turn
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    #[must_use]
    pub fn pawn_hash(&self) -> u64 {
        self.pawn_hash
    }

    #[inline]
    #[must_use]
    pub fn material_hash(&self) -> u64 {
        self.material_hash
    }

    #[inline]
    #[must_use]
    pub fn castle_rights(&self) -> CastlingRights {
        self.castle_rights
    }

    #[inline]
    #[must_use]
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant_square
    }

    #[inline]
    #[must_use]
    pub fn rule50(&self) -> u8 {
        self.rule50
    }

    #[inline]
    #[must_use]
    pub fn full_moves(&self) -> u16 {
        self.full_moves
    }

    #[inline]
    #[must_use]
    pub fn all(&self) -> Bitboard {
        self.bb_all
    }

    #[inline]
    #[must_use]
    pub fn colored(&self, color: Color) -> Bitboard {
        self.bb_color[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn typed(&self, piece: Piece, color: Color) -> Bitboard {
        self.bb_typed[piece.index()][color.index()]
    }

    #[inline]
    #[must_use]
    pub fn num_pieces(&self) -> u32 {
        self.bb_all.popcount()
    }

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        let piece = self.pieces[sq.index()]?;
        let color = if self.bb_color[Color::White.index()].contains(sq) {
            Color::White
        } else {
            Color::Black
        };
        Some((color, piece))
    }

    #[inline]
    #[must_use]
    pub(crate) fn piece_kind_at(&self, sq: Square) -> Option<Piece> {
        self.pieces[sq.index()]
    }

    /// The king square of `color`. Exactly one king per color is a board
    /// invariant.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        debug_assert_eq!(self.typed(Piece::King, color).popcount(), 1);
        self.typed(Piece::King, color).lsb()
    }

    /// Whether `color` has at least one piece besides pawns and the king.
    #[must_use]
    pub fn has_officers(&self, color: Color) -> bool {
        let c = color.index();
        let officers = self.bb_color[c]
            ^ self.bb_typed[Piece::Pawn.index()][c]
            ^ self.bb_typed[Piece::King.index()][c];
        !officers.is_empty()
    }

    /// Place a piece, keeping `pieces[]` and the bitboards in sync.
    /// Hashes are not touched; callers update them incrementally or
    /// recompute afterwards.
    pub(crate) fn set_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        debug_assert!(self.pieces[sq.index()].is_none());
        self.pieces[sq.index()] = Some(piece);
        self.bb_all.set(sq);
        self.bb_color[color.index()].set(sq);
        self.bb_typed[piece.index()][color.index()].set(sq);
    }

    /// Remove the piece on `sq`, keeping `pieces[]` and the bitboards in
    /// sync. Returns the removed piece kind.
    pub(crate) fn remove_piece(&mut self, sq: Square, color: Color) -> Piece {
        let piece = self.pieces[sq.index()].expect("removing from an occupied square");
        self.pieces[sq.index()] = None;
        self.bb_all.clear(sq);
        self.bb_color[color.index()].clear(sq);
        self.bb_typed[piece.index()][color.index()].clear(sq);
        piece
    }

    /// Invalidate memoised derived state after any mutation.
    #[inline]
    pub(crate) fn invalidate_derived(&mut self) {
        self.checked_cache = None;
        self.moveset = MovesetTag::None;
        self.move_list.clear();
    }

    /// Recompute all three Zobrist hashes from scratch.
    pub(crate) fn recompute_hashes(&mut self) {
        let (hash, pawn_hash, material_hash) = self.fresh_hashes();
        self.hash = hash;
        self.pawn_hash = pawn_hash;
        self.material_hash = material_hash;
    }

    /// All three hashes recomputed from scratch, without storing them.
    #[must_use]
    pub(crate) fn fresh_hashes(&self) -> (u64, u64, u64) {
        let mut hash = 0u64;
        let mut pawn_hash = 0u64;
        let mut material_hash = 0u64;

        for color in [Color::White, Color::Black] {
            for piece in Piece::ALL {
                let bb = self.typed(piece, color);
                for sq in bb {
                    let key = KEYS.piece(piece, color, sq);
                    hash ^= key;
                    if piece == Piece::Pawn {
                        pawn_hash ^= key;
                    }
                }
                material_hash ^= KEYS.material(piece, color, bb.popcount() as usize);
            }
        }

        hash ^= KEYS.en_passant(self.en_passant_square);
        pawn_hash ^= KEYS.en_passant(self.en_passant_square);
        hash ^= KEYS.castling(self.castle_rights);
        if self.turn == Color::Black {
            hash ^= KEYS.side_to_move();
        }

        (hash, pawn_hash, material_hash)
    }

    /// Drawn by bare material: K vs K, K+B vs K or K+N vs K, detected by
    /// comparing the material hash against the precomputed set.
    #[must_use]
    pub fn is_material_draw(&self) -> bool {
        MATERIAL_DRAW_HASHES.contains(&self.material_hash)
    }

    /// Debug-only consistency check of the structural board invariants.
    pub(crate) fn debug_validate(&self) {
        if cfg!(debug_assertions) {
            let white = Color::White.index();
            let black = Color::Black.index();
            assert!(
                (self.bb_color[white] & self.bb_color[black]).is_empty(),
                "color boards overlap\n{self}"
            );
            assert_eq!(
                self.bb_all,
                self.bb_color[white] | self.bb_color[black],
                "occupancy does not match color boards\n{self}"
            );
            for c in [Color::White, Color::Black] {
                let mut union = Bitboard::EMPTY;
                for piece in Piece::ALL {
                    let bb = self.typed(piece, c);
                    assert!(
                        (bb & !self.colored(c)).is_empty(),
                        "{piece:?} board outside {c} occupancy\n{self}"
                    );
                    assert!((union & bb).is_empty(), "typed boards overlap\n{self}");
                    union |= bb;
                }
                assert_eq!(union, self.colored(c), "typed union mismatch\n{self}");
                assert_eq!(
                    self.typed(Piece::King, c).popcount(),
                    1,
                    "{c} must have exactly one king\n{self}"
                );
            }
            for sq_idx in 0..64 {
                let sq = Square::from_index(sq_idx);
                let from_bb = Piece::ALL
                    .into_iter()
                    .find(|&p| (self.bb_typed[p.index()][white] | self.bb_typed[p.index()][black]).contains(sq));
                assert_eq!(
                    self.pieces[sq_idx], from_bb,
                    "pieces[] disagrees with bitboards at {sq}\n{self}"
                );
            }
            if let Some(ep) = self.en_passant_square {
                assert!(
                    ep.rank() == 2 || ep.rank() == 5,
                    "bad en passant rank\n{self}"
                );
                let target = self.en_passant_target.expect("ep target set with ep square");
                let pawn_color = if ep.rank() == 2 { Color::White } else { Color::Black };
                assert!(
                    self.typed(Piece::Pawn, pawn_color).contains(target),
                    "no pawn on en passant target\n{self}"
                );
            }
            let rights = self.castle_rights;
            let rook_home = |sq: Square, c: Color| self.typed(Piece::Rook, c).contains(sq);
            if rights.has(CastlingRights::WHITE_KING) {
                assert!(self.typed(Piece::King, Color::White).contains(Square::E1));
                assert!(rook_home(Square::H1, Color::White));
            }
            if rights.has(CastlingRights::WHITE_QUEEN) {
                assert!(self.typed(Piece::King, Color::White).contains(Square::E1));
                assert!(rook_home(Square::A1, Color::White));
            }
            if rights.has(CastlingRights::BLACK_KING) {
                assert!(self.typed(Piece::King, Color::Black).contains(Square::E8));
                assert!(rook_home(Square::H8, Color::Black));
            }
            if rights.has(CastlingRights::BLACK_QUEEN) {
                assert!(self.typed(Piece::King, Color::Black).contains(Square::E8));
                assert!(rook_home(Square::A8, Color::Black));
            }
        }
    }

    /// Parse a move in UCI notation and resolve it against the legal
    /// moves of this position.
    pub fn parse_move(&mut self, notation: &str) -> Result<Move, super::error::MoveParseError> {
        use super::error::MoveParseError;

        if notation.len() < 4 || notation.len() > 5 {
            return Err(MoveParseError::InvalidNotation {
                notation: notation.to_string(),
            });
        }
        let from: Square = notation[0..2].parse().map_err(|_| MoveParseError::InvalidNotation {
            notation: notation.to_string(),
        })?;
        let to: Square = notation[2..4].parse().map_err(|_| MoveParseError::InvalidNotation {
            notation: notation.to_string(),
        })?;
        let promotion = match notation.len() {
            5 => match Piece::from_char(notation.as_bytes()[4] as char) {
                Some(p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen)) => Some(p),
                _ => {
                    return Err(MoveParseError::InvalidNotation {
                        notation: notation.to_string(),
                    })
                }
            },
            _ => None,
        };

        self.get_legal_moves()
            .iter()
            .copied()
            .find(|m| m.from() == from && m.to() == to && m.promotion() == promotion)
            .ok_or_else(|| MoveParseError::IllegalMove {
                notation: notation.to_string(),
            })
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

impl fmt::Display for Board {
    /// Rank-by-rank diagram followed by the FEN string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => write!(f, " {}", piece.to_fen_char(color))?,
                    None => write!(f, " .")?,
                }
            }
            writeln!(f)?;
        }
        writeln!(f, "   a b c d e f g h")?;
        write!(f, "{}", super::fen::format(self))
    }
}

/// Material hashes of the insufficient-material configurations.
static MATERIAL_DRAW_HASHES: Lazy<[u64; 5]> = Lazy::new(|| {
    let kings = KEYS.material(Piece::King, Color::White, 1) ^ KEYS.material(Piece::King, Color::Black, 1);
    [
        kings,
        kings ^ KEYS.material(Piece::Knight, Color::White, 1),
        kings ^ KEYS.material(Piece::Knight, Color::Black, 1),
        kings ^ KEYS.material(Piece::Bishop, Color::White, 1),
        kings ^ KEYS.material(Piece::Bishop, Color::Black, 1),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_position_state() {
        let board = Board::new();
        assert_eq!(board.turn(), Color::White);
        assert_eq!(board.num_pieces(), 32);
        assert_eq!(board.castle_rights(), CastlingRights::FULL);
        assert_eq!(board.rule50(), 0);
        assert_eq!(board.full_moves(), 1);
        assert!(board.en_passant_square().is_none());
        assert_eq!(board.king_square(Color::White), Square::E1);
        assert_eq!(board.king_square(Color::Black), Square::E8);
        board.debug_validate();
    }

    #[test]
    fn material_draw_detection() {
        let draw = super::super::fen::parse("8/8/3k4/8/8/3K4/8/8 w - - 0 1").unwrap();
        assert!(draw.is_material_draw());

        let knight = super::super::fen::parse("8/8/3k4/8/8/3KN3/8/8 w - - 0 1").unwrap();
        assert!(knight.is_material_draw());

        let bishop = super::super::fen::parse("8/8/3k1b2/8/8/3K4/8/8 w - - 0 1").unwrap();
        assert!(bishop.is_material_draw());

        let two_knights = super::super::fen::parse("8/8/3k4/8/8/3KNN2/8/8 w - - 0 1").unwrap();
        assert!(!two_knights.is_material_draw());

        let pawn = super::super::fen::parse("8/8/3k4/8/8/3KP3/8/8 w - - 0 1").unwrap();
        assert!(!pawn.is_material_draw());
    }

    #[test]
    fn has_officers() {
        let board = Board::new();
        assert!(board.has_officers(Color::White));
        let pawns_only = super::super::fen::parse("4k3/pppppppp/8/8/8/8/PPPPPPPP/4K3 w - - 0 1").unwrap();
        assert!(!pawns_only.has_officers(Color::White));
        assert!(!pawns_only.has_officers(Color::Black));
    }

    #[test]
    fn piece_lookup_matches_bitboards() {
        let board = Board::new();
        assert_eq!(board.piece_at(Square::E1), Some((Color::White, Piece::King)));
        assert_eq!(board.piece_at(Square::new(7, 3)), Some((Color::Black, Piece::Queen)));
        assert_eq!(board.piece_at(Square::new(3, 3)), None);
    }
}
