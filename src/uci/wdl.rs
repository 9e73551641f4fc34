//! Win/draw/loss model.
//!
//! Maps a raw centipawn score through a material-dependent logistic
//! model, both to normalise reported scores (100 cp = 50% win chance)
//! and to emit `info ... wdl` triples. Model shape and fitting follow
//! the Stockfish WDL model.

use crate::board::{Board, Color, Piece};
use crate::eval::{is_mate_score, Eval};

const AS: [f32; 4] = [33.530_657, -226.012_58, 202.591_86, 219.847_12];
const BS: [f32; 4] = [17.032_076, -149.444_49, 245.998_9, -9.684_035];

/// Expected win/draw/loss in permille.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wdl {
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
}

/// Weighted material count of both sides (pawn 1, minor 3, rook 5,
/// queen 9), the model input.
#[must_use]
pub fn material_count(board: &Board) -> u32 {
    let mut material = 0;
    for color in [Color::White, Color::Black] {
        material += board.typed(Piece::Pawn, color).popcount();
        material += 3 * board.typed(Piece::Knight, color).popcount();
        material += 3 * board.typed(Piece::Bishop, color).popcount();
        material += 5 * board.typed(Piece::Rook, color).popcount();
        material += 9 * board.typed(Piece::Queen, color).popcount();
    }
    material
}

fn parameters(material: u32) -> (f32, f32) {
    let m = material.clamp(17, 78) as f32 / 58.0;
    let a = ((AS[0] * m + AS[1]) * m + AS[2]) * m + AS[3];
    let b = ((BS[0] * m + BS[1]) * m + BS[2]) * m + BS[3];
    (a, b)
}

/// Rescale a raw score so that 100 cp corresponds to a 50% win chance.
/// Mate scores pass through unchanged.
#[must_use]
pub fn normalized_score(material: u32, eval: Eval) -> Eval {
    if is_mate_score(eval) {
        return eval;
    }
    let (a, _) = parameters(material);
    (100.0 * eval as f32 / a) as Eval
}

/// Expected outcome distribution for a raw score.
#[must_use]
pub fn expected_wdl(material: u32, eval: Eval) -> Wdl {
    let (a, b) = parameters(material);
    let eval = eval as f32;
    let win = (1000.0 / (1.0 + ((a - eval) / b).exp())).round() as u32;
    let loss = (1000.0 / (1.0 + ((a + eval) / b).exp())).round() as u32;
    Wdl {
        win,
        draw: 1000 - win - loss,
        loss,
    }
}
