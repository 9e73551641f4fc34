//! FEN parsing and formatting.
//!
//! Parsing is tolerant: the half-move and full-move counters may be
//! missing and default to 0 and 1. The round trip `fen -> Board -> fen`
//! is lossless for the positional fields.

use super::error::FenError;
use super::state::Board;
use super::types::{CastlingRights, Color, Piece, Square};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a board.
pub fn parse(fen: &str) -> Result<Board, FenError> {
    let mut fields = fen.split_whitespace();
    let placement = fields.next().ok_or(FenError::MissingFields)?;
    let turn = fields.next().ok_or(FenError::MissingFields)?;
    let castling = fields.next().unwrap_or("-");
    let en_passant = fields.next().unwrap_or("-");
    let halfmove = fields.next().unwrap_or("0");
    let fullmove = fields.next().unwrap_or("1");

    let mut board = Board::empty();

    let mut rank = 7usize;
    let mut file = 0usize;
    for c in placement.chars() {
        match c {
            '/' => {
                if file != 8 || rank == 0 {
                    return Err(FenError::InvalidPlacement(placement.to_string()));
                }
                rank -= 1;
                file = 0;
            }
            '1'..='8' => {
                file += c as usize - '0' as usize;
                if file > 8 {
                    return Err(FenError::InvalidPlacement(placement.to_string()));
                }
            }
            _ => {
                let piece = Piece::from_char(c)
                    .ok_or_else(|| FenError::InvalidPlacement(placement.to_string()))?;
                if file >= 8 {
                    return Err(FenError::InvalidPlacement(placement.to_string()));
                }
                let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                board.set_piece(Square::new(rank, file), color, piece);
                file += 1;
            }
        }
    }
    if rank != 0 || file != 8 {
        return Err(FenError::InvalidPlacement(placement.to_string()));
    }

    board.turn = match turn {
        "w" => Color::White,
        "b" => Color::Black,
        other => return Err(FenError::InvalidTurn(other.to_string())),
    };

    let mut rights = CastlingRights::NONE;
    if castling != "-" {
        for c in castling.chars() {
            let bit = match c {
                'K' => CastlingRights::WHITE_KING,
                'Q' => CastlingRights::WHITE_QUEEN,
                'k' => CastlingRights::BLACK_KING,
                'q' => CastlingRights::BLACK_QUEEN,
                _ => return Err(FenError::InvalidCastling(castling.to_string())),
            };
            rights.add(bit);
        }
    }
    // Drop rights whose king or rook has left its home square.
    let verified = [
        (CastlingRights::WHITE_KING, Square::E1, Square::H1, Color::White),
        (CastlingRights::WHITE_QUEEN, Square::E1, Square::A1, Color::White),
        (CastlingRights::BLACK_KING, Square::E8, Square::H8, Color::Black),
        (CastlingRights::BLACK_QUEEN, Square::E8, Square::A8, Color::Black),
    ];
    for (bit, king_sq, rook_sq, color) in verified {
        if rights.has(bit)
            && !(board.typed(Piece::King, color).contains(king_sq)
                && board.typed(Piece::Rook, color).contains(rook_sq))
        {
            rights.remove(bit);
        }
    }
    board.castle_rights = rights;

    if en_passant != "-" {
        let sq: Square = en_passant
            .parse()
            .map_err(|_| FenError::InvalidEnPassant(en_passant.to_string()))?;
        if sq.rank() != 2 && sq.rank() != 5 {
            return Err(FenError::InvalidEnPassant(en_passant.to_string()));
        }
        // The destination is behind the pawn that just double-pushed.
        let target = if sq.rank() == 2 { sq.offset(8) } else { sq.offset(-8) };
        let pawn_color = if sq.rank() == 2 { Color::White } else { Color::Black };
        // Tolerate a stale en-passant field with no pawn to capture.
        if board.typed(Piece::Pawn, pawn_color).contains(target) {
            board.en_passant_square = Some(sq);
            board.en_passant_target = Some(target);
        }
    }

    board.rule50 = halfmove
        .parse()
        .map_err(|_| FenError::InvalidClock(halfmove.to_string()))?;
    board.full_moves = fullmove
        .parse()
        .map_err(|_| FenError::InvalidClock(fullmove.to_string()))?;

    for color in [Color::White, Color::Black] {
        if board.typed(Piece::King, color).popcount() != 1 {
            return Err(FenError::IllegalPosition(format!(
                "{color} must have exactly one king"
            )));
        }
        let pawns = board.typed(Piece::Pawn, color);
        if !(pawns & (crate::board::types::Bitboard::RANK_1 | crate::board::types::Bitboard::RANK_8))
            .is_empty()
        {
            return Err(FenError::IllegalPosition(format!(
                "{color} pawn on a promotion rank"
            )));
        }
    }

    board.recompute_hashes();
    board.debug_validate();
    Ok(board)
}

/// Format a board as a six-field FEN string.
#[must_use]
pub fn format(board: &Board) -> String {
    let mut out = String::with_capacity(90);

    for rank in (0..8).rev() {
        let mut empty = 0;
        for file in 0..8 {
            match board.piece_at(Square::new(rank, file)) {
                Some((color, piece)) => {
                    if empty > 0 {
                        out.push((b'0' + empty) as char);
                        empty = 0;
                    }
                    out.push(piece.to_fen_char(color));
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push((b'0' + empty) as char);
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push(if board.turn() == Color::White { 'w' } else { 'b' });
    out.push(' ');
    out.push_str(&board.castle_rights().to_string());
    out.push(' ');
    match board.en_passant_square() {
        Some(sq) => out.push_str(&sq.to_string()),
        None => out.push('-'),
    }
    out.push_str(&format!(" {} {}", board.rule50(), board.full_moves()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn start_position_roundtrip() {
        let board = parse(START_FEN).unwrap();
        assert_eq!(format(&board), START_FEN);
    }

    #[test]
    fn complex_positions_roundtrip() {
        for fen in [
            KIWIPETE,
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2",
        ] {
            let board = parse(fen).unwrap();
            assert_eq!(format(&board), fen, "roundtrip failed for {fen}");
            board.debug_validate();
        }
    }

    #[test]
    fn tolerant_of_missing_counters() {
        let board = parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -").unwrap();
        assert_eq!(board.rule50(), 0);
        assert_eq!(board.full_moves(), 1);
        assert_eq!(format(&board), START_FEN);
    }

    #[test]
    fn rejects_malformed_fens() {
        assert!(parse("").is_err());
        assert!(parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP w KQkq - 0 1").is_err());
        assert!(parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
        assert!(parse("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
        assert!(parse("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - x 1").is_err());
    }

    #[test]
    fn castle_rights_require_home_squares() {
        // Rook moved away: the corresponding right is dropped.
        let board = parse("1nbqkbnr/rppppppp/p7/8/8/8/PPPPPPPP/RNBQKBNR w KQk - 0 1").unwrap();
        assert!(!board.castle_rights().has(CastlingRights::BLACK_QUEEN));
        assert!(board.castle_rights().has(CastlingRights::WHITE_KING));
    }

    #[test]
    fn stale_en_passant_is_dropped() {
        // e6 claimed but no black pawn on e5.
        let board = parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq e6 0 1").unwrap();
        assert!(board.en_passant_square().is_none());
    }
}
