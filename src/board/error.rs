//! Error types for board construction and move parsing.

use std::fmt;

/// Errors from parsing a FEN string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// The FEN has fewer fields than the minimum (placement and turn).
    MissingFields,
    /// Piece placement is malformed.
    InvalidPlacement(String),
    /// The side-to-move field is not `w` or `b`.
    InvalidTurn(String),
    /// The castling field contains an unknown character.
    InvalidCastling(String),
    /// The en-passant field is not `-` or a valid square.
    InvalidEnPassant(String),
    /// A clock field is not a number.
    InvalidClock(String),
    /// The resulting position is illegal (wrong king count etc.).
    IllegalPosition(String),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingFields => write!(f, "FEN is missing required fields"),
            FenError::InvalidPlacement(s) => write!(f, "invalid piece placement: {s}"),
            FenError::InvalidTurn(s) => write!(f, "invalid side to move: {s}"),
            FenError::InvalidCastling(s) => write!(f, "invalid castling field: {s}"),
            FenError::InvalidEnPassant(s) => write!(f, "invalid en passant field: {s}"),
            FenError::InvalidClock(s) => write!(f, "invalid clock field: {s}"),
            FenError::IllegalPosition(s) => write!(f, "illegal position: {s}"),
        }
    }
}

impl std::error::Error for FenError {}

/// Errors from parsing a move in UCI notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    /// The string is not of the form `<from><to>[promotion]`.
    InvalidNotation { notation: String },
    /// The move is syntactically valid but not legal in the position.
    IllegalMove { notation: String },
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::InvalidNotation { notation } => {
                write!(f, "invalid move notation: {notation}")
            }
            MoveParseError::IllegalMove { notation } => {
                write!(f, "illegal move: {notation}")
            }
        }
    }
}

impl std::error::Error for MoveParseError {}

/// Errors from parsing a square name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    InvalidNotation { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::InvalidNotation { notation } => {
                write!(f, "invalid square: {notation}")
            }
        }
    }
}

impl std::error::Error for SquareError {}
