//! Cobalt: a UCI chess engine with NNUE evaluation.
//!
//! The crate splits into the board layer (bitboards, legal move
//! generation, Zobrist hashing, SEE), the evaluation layer (quantized
//! NNUE with an incremental accumulator stack, plus a material fallback),
//! the search (iterative-deepening alpha-beta with a transposition table
//! and a full pruning suite), and the UCI front end with its engine
//! thread.

pub mod board;
pub mod engine;
pub mod eval;
pub mod nnue;
pub mod perft;
pub mod search;
pub mod tb;
pub mod timeman;
pub mod tt;
pub mod tuning;
pub mod uci;
