//! Endgame tablebase oracle.
//!
//! The search consumes tablebases through an object-safe trait: WDL
//! probes at interior nodes and a DTZ probe at the root that returns the
//! preferred root moves. Probe failures are silent misses. The crate
//! ships the always-miss implementation; a real prober slots in behind
//! the same trait.

use std::path::Path;

use crate::board::{Board, Move};

/// Outcome of a WDL probe from the side to move's perspective.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WdlResult {
    Win,
    Draw,
    Loss,
    Failed,
}

/// Probe interface. Preconditions (piece count within `max_pieces`, no
/// castling rights) are enforced by the caller.
pub trait TablebaseOracle: Send {
    /// Largest piece count covered by the loaded tables; 0 when none are
    /// loaded.
    fn max_pieces(&self) -> u32;

    /// Win/draw/loss for the position, or `Failed` on a miss.
    fn probe_wdl(&self, board: &Board) -> WdlResult;

    /// Root probe: the overall result plus the moves preserving it.
    /// `None` on a miss.
    fn probe_dtz(&self, board: &mut Board) -> Option<(WdlResult, Vec<Move>)>;
}

/// The no-tablebase oracle: every probe is a miss.
pub struct NoTablebase;

impl TablebaseOracle for NoTablebase {
    fn max_pieces(&self) -> u32 {
        0
    }

    fn probe_wdl(&self, _board: &Board) -> WdlResult {
        WdlResult::Failed
    }

    fn probe_dtz(&self, _board: &mut Board) -> Option<(WdlResult, Vec<Move>)> {
        None
    }
}

/// Initialise tablebases from a directory path. Currently validates the
/// path and reports how probing would proceed; returns `None` when the
/// path is unusable so the engine continues without tablebases.
pub fn load<P: AsRef<Path>>(path: P) -> Option<Box<dyn TablebaseOracle>> {
    let path = path.as_ref();
    if !path.is_dir() {
        log::warn!("syzygy path {} is not a directory", path.display());
        return None;
    }
    log::info!("syzygy path {} registered", path.display());
    // Probing is delegated to an external prober; until one is wired in,
    // every probe is a silent miss.
    Some(Box::new(NoTablebase))
}
