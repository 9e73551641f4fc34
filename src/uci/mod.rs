//! UCI protocol front end.
//!
//! Reads commands from standard input, keeps the current position and
//! game history, and drives the engine thread. Malformed input is logged
//! and ignored; the board state is left untouched by bad commands.

pub mod options;
pub mod report;
pub mod wdl;

use std::collections::HashMap;
use std::io::BufRead;
use std::path::PathBuf;

use crate::board::{fen, Board, Move};
use crate::engine::{Engine, EngineCommand};
use crate::perft::perft_divide;
use crate::search::SearchParameters;
use crate::timeman::{allocate_time, TimeControls};

use options::EngineOptions;
use report::ReportOptions;

const ENGINE_NAME: &str = concat!("Cobalt ", env!("CARGO_PKG_VERSION"));

/// The current front-end state: position, per-game position counts and
/// option values.
struct UciState {
    board: Board,
    /// Occurrence count of every position reached in the game so far.
    game_history: HashMap<u64, u8>,
    options: EngineOptions,
}

impl UciState {
    fn new() -> Self {
        let board = Board::new();
        let mut game_history = HashMap::new();
        game_history.insert(board.hash(), 1);
        UciState {
            board,
            game_history,
            options: EngineOptions::default(),
        }
    }
}

/// Run the blocking UCI loop until `quit`.
pub fn run() {
    crate::board::attack_tables::init();

    let engine = Engine::spawn();
    let mut state = UciState::new();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };

        match command {
            "uci" => {
                println!("id name {ENGINE_NAME}");
                println!("id author the Cobalt developers");
                for option in options::describe_options() {
                    println!("{option}");
                }
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => {
                engine.send(EngineCommand::NewGame);
                state.board = Board::new();
                state.game_history.clear();
                state.game_history.insert(state.board.hash(), 1);
            }
            "position" => {
                if let Err(message) = handle_position(&mut state, &tokens) {
                    log::warn!("ignoring position command: {message}");
                }
            }
            "go" => handle_go(&engine, &mut state, &tokens),
            "stop" => engine.stop_search(),
            "setoption" => handle_setoption(&engine, &mut state, &tokens),
            "quit" => {
                engine.quit();
                return;
            }
            other => log::warn!("unknown command: {other}"),
        }
    }

    engine.quit();
}

/// `position [fen <FEN> | startpos] [moves <m1> ... <mk>]`. The board is
/// replaced only when the whole command parses.
fn handle_position(state: &mut UciState, tokens: &[&str]) -> Result<(), String> {
    let mut index = 1;
    let mut board = match tokens.get(index) {
        Some(&"startpos") => {
            index += 1;
            Board::new()
        }
        Some(&"fen") => {
            index += 1;
            let fen_end = tokens[index..]
                .iter()
                .position(|&t| t == "moves")
                .map_or(tokens.len(), |offset| index + offset);
            let fen_str = tokens[index..fen_end].join(" ");
            index = fen_end;
            fen::parse(&fen_str).map_err(|e| e.to_string())?
        }
        _ => return Err("expected startpos or fen".to_string()),
    };

    let mut history = HashMap::new();
    history.insert(board.hash(), 1u8);

    if tokens.get(index) == Some(&"moves") {
        for notation in &tokens[index + 1..] {
            let mv = board.parse_move(notation).map_err(|e| e.to_string())?;
            board.perform_move(mv);
            *history.entry(board.hash()).or_insert(0) += 1;
        }
    }

    state.board = board;
    state.game_history = history;
    Ok(())
}

fn handle_go(engine: &Engine, state: &mut UciState, tokens: &[&str]) {
    let mut wtime: Option<i64> = None;
    let mut btime: Option<i64> = None;
    let mut winc: i64 = 0;
    let mut binc: i64 = 0;
    let mut moves_to_go: i64 = 0;
    let mut move_time: i64 = 0;
    let mut depth: Option<i32> = None;
    let mut nodes: Option<u64> = None;
    let mut infinite = false;
    let mut search_moves: Vec<Move> = Vec::new();

    let mut index = 1;
    while index < tokens.len() {
        let parameter = tokens[index];
        let value = tokens.get(index + 1).copied();
        let mut consume_value = true;
        match parameter {
            "wtime" => wtime = value.and_then(|v| v.parse().ok()),
            "btime" => btime = value.and_then(|v| v.parse().ok()),
            "winc" => winc = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            "binc" => binc = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            "movestogo" => moves_to_go = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            "movetime" => move_time = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            "depth" => depth = value.and_then(|v| v.parse().ok()),
            "nodes" => nodes = value.and_then(|v| v.parse().ok()),
            "infinite" => {
                infinite = true;
                consume_value = false;
            }
            "perft" => {
                let perft_depth: u32 = value.and_then(|v| v.parse().ok()).unwrap_or(1);
                run_perft(&mut state.board, perft_depth);
                return;
            }
            "searchmoves" => {
                // Consume every remaining token that parses as a move.
                let mut move_index = index + 1;
                while move_index < tokens.len() {
                    match state.board.parse_move(tokens[move_index]) {
                        Ok(mv) => search_moves.push(mv),
                        Err(_) => break,
                    }
                    move_index += 1;
                }
                index = move_index;
                continue;
            }
            other => {
                log::warn!("unknown go parameter: {other}");
                consume_value = false;
            }
        }
        index += if consume_value { 2 } else { 1 };
    }

    let remaining = if state.board.turn() == crate::board::Color::White {
        (wtime, winc)
    } else {
        (btime, binc)
    };

    let time_ms = if infinite {
        None
    } else if let (Some(time), increment) = remaining {
        Some(allocate_time(&TimeControls {
            time,
            increment,
            moves_to_go,
            move_time: (move_time - state.options.move_overhead).max(0),
            move_overhead: state.options.move_overhead,
        }) as u64)
    } else if move_time > 0 {
        Some((move_time - state.options.move_overhead).max(1) as u64)
    } else {
        None
    };

    let params = SearchParameters {
        depth,
        nodes,
        time_ms,
        search_moves,
        datagen: false,
    };
    let report = ReportOptions {
        normalize_score: state.options.normalize_score,
        show_wdl: state.options.show_wdl,
    };

    engine.send(EngineCommand::Search {
        board: state.board.clone(),
        game_history: state.game_history.clone(),
        params,
        report,
    });
}

fn run_perft(board: &mut Board, depth: u32) {
    let timer = crate::timeman::Timer::start();
    let (counts, total) = perft_divide(board, depth);
    for (mv, nodes) in counts {
        println!("{mv}: {nodes}");
    }
    let elapsed = timer.elapsed_ms().max(1);
    println!("\nNodes searched: {total} in {elapsed} ms ({} nps)", total * 1000 / elapsed);
}

fn handle_setoption(engine: &Engine, state: &mut UciState, tokens: &[&str]) {
    // setoption name <name...> [value <value...>]
    let Some(name_start) = tokens.iter().position(|&t| t == "name") else {
        log::warn!("setoption without a name");
        return;
    };
    let value_start = tokens.iter().position(|&t| t == "value");
    let name_end = value_start.unwrap_or(tokens.len());
    let name = tokens[name_start + 1..name_end].join(" ");
    let value = value_start.map_or(String::new(), |v| tokens[v + 1..].join(" "));

    match name.to_ascii_lowercase().as_str() {
        "hash" => {
            let mb = options::parse_spin(
                &name,
                &value,
                options::HASH_MIN as i64,
                options::HASH_MAX as i64,
                state.options.hash_mb as i64,
            ) as usize;
            state.options.hash_mb = mb;
            engine.send(EngineCommand::ResizeTt(mb));
        }
        "clearhash" => engine.send(EngineCommand::ClearTt),
        "syzygypath" => {
            if !value.is_empty() && value != "<empty>" {
                engine.send(EngineCommand::LoadTablebase(PathBuf::from(value)));
            }
        }
        "nnuepath" => {
            if !value.is_empty() && value != "<empty>" {
                engine.send(EngineCommand::LoadNetwork(PathBuf::from(value)));
            }
        }
        "moveoverhead" => {
            state.options.move_overhead = options::parse_spin(
                &name,
                &value,
                options::MOVE_OVERHEAD_MIN,
                options::MOVE_OVERHEAD_MAX,
                state.options.move_overhead,
            );
        }
        "normalizescore" => {
            state.options.normalize_score =
                options::parse_check(&name, &value, state.options.normalize_score);
        }
        "uci_showwdl" => {
            state.options.show_wdl = options::parse_check(&name, &value, state.options.show_wdl);
        }
        other => log::warn!("unknown option: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_startpos_with_moves() {
        let mut state = UciState::new();
        let tokens: Vec<&str> = "position startpos moves e2e4 e7e5 g1f3"
            .split_whitespace()
            .collect();
        handle_position(&mut state, &tokens).unwrap();
        assert_eq!(
            fen::format(&state.board),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
        // Start position plus three move positions counted once each.
        assert_eq!(state.game_history.len(), 4);
        assert!(state.game_history.values().all(|&count| count == 1));
    }

    #[test]
    fn position_fen_roundtrip() {
        let mut state = UciState::new();
        let fen_str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let command = format!("position fen {fen_str}");
        let tokens: Vec<&str> = command.split_whitespace().collect();
        handle_position(&mut state, &tokens).unwrap();
        assert_eq!(fen::format(&state.board), fen_str);
    }

    #[test]
    fn bad_position_leaves_state_unchanged() {
        let mut state = UciState::new();
        let before = state.board.hash();

        let tokens: Vec<&str> = "position fen not a real fen".split_whitespace().collect();
        assert!(handle_position(&mut state, &tokens).is_err());
        assert_eq!(state.board.hash(), before);

        let tokens: Vec<&str> = "position startpos moves e2e5".split_whitespace().collect();
        assert!(handle_position(&mut state, &tokens).is_err());
        assert_eq!(state.board.hash(), before);
    }

    #[test]
    fn repeated_positions_are_counted() {
        let mut state = UciState::new();
        let tokens: Vec<&str> = "position startpos moves g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1 f6g8"
            .split_whitespace()
            .collect();
        handle_position(&mut state, &tokens).unwrap();
        // The start position occurs three times (initially and after
        // each full knight retreat cycle).
        assert_eq!(state.game_history.get(&state.board.hash()), Some(&3));
    }
}
