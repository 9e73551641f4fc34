//! Precomputed attack tables and move geometry.
//!
//! Sliding piece attacks use hyperbola quintessence (the `o^(o-2r)` trick)
//! on file/diagonal/anti-diagonal masks, with a small lookup table for
//! ranks. All tables derive deterministically from pure functions at first
//! use and are read-only afterwards.

use once_cell::sync::Lazy;

use super::types::{Bitboard, Color, Square};

const FILE_A: u64 = 0x0101_0101_0101_0101;

/// Knight attack table.
static KNIGHT_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    let mut table = [0u64; 64];
    for (sq, entry) in table.iter_mut().enumerate() {
        let rank = (sq / 8) as isize;
        let file = (sq % 8) as isize;
        for (dr, df) in [
            (2, 1),
            (2, -1),
            (-2, 1),
            (-2, -1),
            (1, 2),
            (1, -2),
            (-1, 2),
            (-1, -2),
        ] {
            let (r, f) = (rank + dr, file + df);
            if (0..8).contains(&r) && (0..8).contains(&f) {
                *entry |= 1u64 << (r * 8 + f);
            }
        }
    }
    table
});

/// King attack table.
static KING_ATTACKS: Lazy<[u64; 64]> = Lazy::new(|| {
    let mut table = [0u64; 64];
    for (sq, entry) in table.iter_mut().enumerate() {
        let rank = (sq / 8) as isize;
        let file = (sq % 8) as isize;
        for dr in -1..=1 {
            for df in -1..=1 {
                if dr == 0 && df == 0 {
                    continue;
                }
                let (r, f) = (rank + dr, file + df);
                if (0..8).contains(&r) && (0..8).contains(&f) {
                    *entry |= 1u64 << (r * 8 + f);
                }
            }
        }
    }
    table
});

/// Squares strictly between two collinear squares; empty otherwise.
static BETWEEN: Lazy<Box<[[u64; 64]; 64]>> = Lazy::new(|| {
    let mut table = Box::new([[0u64; 64]; 64]);
    for from in 0..64usize {
        let rank = (from / 8) as isize;
        let file = (from % 8) as isize;
        for (dr, df) in [
            (1, 0),
            (-1, 0),
            (0, 1),
            (0, -1),
            (1, 1),
            (1, -1),
            (-1, 1),
            (-1, -1),
        ] {
            let mut ray = 0u64;
            let (mut r, mut f) = (rank + dr, file + df);
            while (0..8).contains(&r) && (0..8).contains(&f) {
                let to = (r * 8 + f) as usize;
                table[from][to] = ray;
                ray |= 1u64 << to;
                r += dr;
                f += df;
            }
        }
    }
    table
});

/// Diagonal masks (a1-h8 direction) per square.
static DIAG_MASKS: Lazy<[u64; 64]> = Lazy::new(|| ray_masks(&[(1, 1), (-1, -1)]));

/// Anti-diagonal masks (a8-h1 direction) per square.
static ANTI_MASKS: Lazy<[u64; 64]> = Lazy::new(|| ray_masks(&[(1, -1), (-1, 1)]));

/// File masks per square.
static FILE_MASKS: Lazy<[u64; 64]> = Lazy::new(|| {
    let mut masks = [0u64; 64];
    for (sq, mask) in masks.iter_mut().enumerate() {
        *mask = FILE_A << (sq % 8);
    }
    masks
});

fn ray_masks(directions: &[(isize, isize)]) -> [u64; 64] {
    let mut masks = [0u64; 64];
    for (sq, mask) in masks.iter_mut().enumerate() {
        *mask |= 1u64 << sq;
        for &(dr, df) in directions {
            let (mut r, mut f) = ((sq / 8) as isize + dr, (sq % 8) as isize + df);
            while (0..8).contains(&r) && (0..8).contains(&f) {
                *mask |= 1u64 << (r * 8 + f);
                r += dr;
                f += df;
            }
        }
    }
    masks
}

/// Rank attacks indexed by `8 * inner_occupancy + file`, stored on rank 1.
static RANK_ATTACKS: Lazy<[u64; 512]> = Lazy::new(|| {
    let mut attacks = [0u64; 512];
    for occ_6bit in 0..64usize {
        for file in 0..8usize {
            let mut attack = 0u64;
            for f in (file + 1)..8 {
                attack |= 1u64 << f;
                if (1..=6).contains(&f) && (occ_6bit & (1 << (f - 1))) != 0 {
                    break;
                }
            }
            for f in (0..file).rev() {
                attack |= 1u64 << f;
                if (1..=6).contains(&f) && (occ_6bit & (1 << (f - 1))) != 0 {
                    break;
                }
            }
            attacks[8 * occ_6bit + file] = attack;
        }
    }
    attacks
});

/// Hyperbola quintessence for a single ray mask.
#[inline]
fn hyp_quint(occupied: u64, mask: u64, square: usize) -> u64 {
    let piece_bit = 1u64 << square;
    let forward = occupied & mask & !piece_bit;
    let backward = forward.swap_bytes();
    let forward_attacks = forward.wrapping_sub(piece_bit.wrapping_mul(2));
    let backward_attacks = backward
        .wrapping_sub(piece_bit.swap_bytes().wrapping_mul(2))
        .swap_bytes();
    (forward_attacks ^ backward_attacks) & mask
}

#[inline]
fn rank_attacks(occupied: u64, square: usize) -> u64 {
    let rank = square / 8;
    let file = square % 8;
    let occ_6bit = ((occupied >> (rank * 8 + 1)) & 63) as usize;
    RANK_ATTACKS[8 * occ_6bit + file] << (rank * 8)
}

/// Squares strictly between `a` and `b` when collinear, otherwise empty.
#[inline]
#[must_use]
pub fn between(a: Square, b: Square) -> Bitboard {
    Bitboard(BETWEEN[a.index()][b.index()])
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    Bitboard(KNIGHT_ATTACKS[sq.index()])
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    Bitboard(KING_ATTACKS[sq.index()])
}

/// Attack squares of every pawn in `pawns` at once.
#[inline]
#[must_use]
pub fn pawn_attacks(pawns: Bitboard, color: Color) -> Bitboard {
    match color {
        Color::White => pawns.north().east() | pawns.north().west(),
        Color::Black => pawns.south().east() | pawns.south().west(),
    }
}

/// Single-step pushes of every pawn in `pawns` (ignoring occupancy).
#[inline]
#[must_use]
pub fn pawn_pushes(pawns: Bitboard, color: Color) -> Bitboard {
    match color {
        Color::White => pawns.north(),
        Color::Black => pawns.south(),
    }
}

#[inline]
#[must_use]
pub fn bishop_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    let idx = sq.index();
    Bitboard(
        hyp_quint(occupied.0, DIAG_MASKS[idx], idx) | hyp_quint(occupied.0, ANTI_MASKS[idx], idx),
    )
}

#[inline]
#[must_use]
pub fn rook_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    let idx = sq.index();
    Bitboard(hyp_quint(occupied.0, FILE_MASKS[idx], idx) | rank_attacks(occupied.0, idx))
}

#[inline]
#[must_use]
pub fn queen_attacks(occupied: Bitboard, sq: Square) -> Bitboard {
    bishop_attacks(occupied, sq) | rook_attacks(occupied, sq)
}

/// Force initialisation of every table. Called once at startup so the
/// first search does not pay the derivation cost.
pub fn init() {
    Lazy::force(&KNIGHT_ATTACKS);
    Lazy::force(&KING_ATTACKS);
    Lazy::force(&BETWEEN);
    Lazy::force(&DIAG_MASKS);
    Lazy::force(&ANTI_MASKS);
    Lazy::force(&FILE_MASKS);
    Lazy::force(&RANK_ATTACKS);
}
