//! Engine controller: the long-lived search thread and its command
//! channel.
//!
//! The UCI front end parses text and sends commands; the engine thread
//! owns the searcher (transposition table, heuristics, evaluator,
//! tablebase oracle) and prints `info`/`bestmove` lines. The two sides
//! share only the atomic stop flag, which the search polls.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::board::Board;
use crate::nnue::Network;
use crate::search::{SearchParameters, Searcher, DEFAULT_TT_MB};
use crate::uci::report::{self, ReportOptions};
use crate::uci::wdl;

pub enum EngineCommand {
    Search {
        board: Board,
        game_history: HashMap<u64, u8>,
        params: SearchParameters,
        report: ReportOptions,
    },
    NewGame,
    ResizeTt(usize),
    ClearTt,
    LoadNetwork(PathBuf),
    LoadTablebase(PathBuf),
    Quit,
}

/// Handle held by the UCI thread.
pub struct Engine {
    tx: Sender<EngineCommand>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Start the engine thread with the default table size.
    #[must_use]
    pub fn spawn() -> Engine {
        let (tx, rx) = channel::<EngineCommand>();
        let searcher = Searcher::new(DEFAULT_TT_MB);
        let stop = searcher.stop_handle();

        // Each search frame carries a cloned board and the selector's
        // scored lists, so the deepest lines need room.
        let builder = std::thread::Builder::new()
            .name("cobalt-search".to_string())
            .stack_size(32 * 1024 * 1024);
        let handle = builder.spawn(move || {
            let mut searcher = searcher;
            while let Ok(command) = rx.recv() {
                match command {
                    EngineCommand::Search {
                        board,
                        game_history,
                        params,
                        report,
                    } => {
                        let root_material = wdl::material_count(&board);
                        searcher.set_info_callback(Arc::new(move |info| {
                            println!("{}", report::format_info(info, root_material, report));
                        }));
                        searcher.set_game_history(game_history);
                        let (best_move, _score) = searcher.search(board, params);
                        if best_move.is_null() {
                            // No legal move exists; 0000 is the
                            // conventional placeholder.
                            println!("bestmove 0000");
                        } else {
                            println!("{}", report::format_bestmove(best_move));
                        }
                    }
                    EngineCommand::NewGame => searcher.new_game(),
                    EngineCommand::ResizeTt(mb) => searcher.resize_tt(mb),
                    EngineCommand::ClearTt => searcher.clear_tt(),
                    EngineCommand::LoadNetwork(path) => match Network::load(&path) {
                        Ok(network) => {
                            log::info!(
                                "loaded network {} ({})",
                                path.display(),
                                network.description()
                            );
                            searcher.set_network(network);
                        }
                        Err(e) => {
                            // The evaluator keeps its previous weights.
                            log::warn!("failed to load network {}: {e}", path.display());
                        }
                    },
                    EngineCommand::LoadTablebase(path) => {
                        if let Some(oracle) = crate::tb::load(&path) {
                            searcher.set_tablebase(oracle);
                        }
                    }
                    EngineCommand::Quit => break,
                }
            }
        });
        let handle = handle.expect("failed to spawn the search thread");

        Engine {
            tx,
            stop,
            handle: Some(handle),
        }
    }

    /// Queue a command for the engine thread.
    pub fn send(&self, command: EngineCommand) {
        if self.tx.send(command).is_err() {
            log::warn!("engine thread is gone; command dropped");
        }
    }

    /// Request the running search to stop; observed within 256 nodes.
    pub fn stop_search(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Stop, shut down and join the engine thread.
    pub fn quit(mut self) {
        self.stop_search();
        let _ = self.tx.send(EngineCommand::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
