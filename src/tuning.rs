//! Interfaces to the data-generation and training collaborators.
//!
//! Self-play generation and network training live outside the core; the
//! core exposes the position-iterator capability they consume and a
//! plain-text implementation of it. The on-disk network format is
//! likewise hidden behind the tensor-reader capability in `crate::nnue`.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::board::{fen, Board, Move};
use crate::eval::Eval;

/// Outcome of a finished game, from White's point of view.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameResult {
    WhiteWin,
    Draw,
    BlackWin,
}

impl GameResult {
    #[must_use]
    pub fn from_str(s: &str) -> Option<GameResult> {
        match s {
            "1-0" => Some(GameResult::WhiteWin),
            "1/2-1/2" | "0.5" => Some(GameResult::Draw),
            "0-1" => Some(GameResult::BlackWin),
            _ => None,
        }
    }
}

/// One training record: a position, the move chosen, the search score
/// and the eventual game result.
pub struct TrainingPosition {
    pub board: Board,
    pub best_move: Move,
    pub score: Eval,
    pub result: GameResult,
}

/// Position-iterator capability: opened by construction, drained with
/// `next_position` until `None`, closed on drop. Parse failures are
/// logged and skipped so one bad record does not end the stream.
pub trait PositionSource {
    fn next_position(&mut self) -> Option<TrainingPosition>;
}

/// Plain-text source: one record per line,
/// `<fen> | <uci move> | <score> | <result>`.
pub struct TextPositionSource {
    lines: Lines<BufReader<File>>,
}

impl TextPositionSource {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(TextPositionSource {
            lines: BufReader::new(file).lines(),
        })
    }

    fn parse_line(line: &str) -> Option<TrainingPosition> {
        let mut fields = line.split('|').map(str::trim);
        let fen_str = fields.next()?;
        let move_str = fields.next()?;
        let score_str = fields.next()?;
        let result_str = fields.next()?;

        let mut board = fen::parse(fen_str).ok()?;
        let best_move = board.parse_move(move_str).ok()?;
        let score: Eval = score_str.parse().ok()?;
        let result = GameResult::from_str(result_str)?;

        Some(TrainingPosition {
            board,
            best_move,
            score,
            result,
        })
    }
}

impl PositionSource for TextPositionSource {
    fn next_position(&mut self) -> Option<TrainingPosition> {
        loop {
            let line = self.lines.next()?.ok()?;
            if line.trim().is_empty() {
                continue;
            }
            match Self::parse_line(&line) {
                Some(position) => return Some(position),
                None => log::warn!("skipping malformed training record: {line}"),
            }
        }
    }
}
