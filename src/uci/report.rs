//! Formatting of `info` and `bestmove` lines.

use crate::board::Move;
use crate::search::SearchInfo;

use super::wdl;

/// Reporting knobs snapshotted at `go` time.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReportOptions {
    pub normalize_score: bool,
    pub show_wdl: bool,
}

/// One `info` line for a completed depth iteration.
#[must_use]
pub fn format_info(info: &SearchInfo, root_material: u32, options: ReportOptions) -> String {
    let mut line = format!(
        "info depth {} seldepth {} time {} nodes {} nps {}",
        info.depth, info.seldepth, info.time_ms, info.nodes, info.nps
    );

    match info.mate_in {
        Some(mate) => line.push_str(&format!(" score mate {mate}")),
        None => {
            let cp = if options.normalize_score {
                wdl::normalized_score(root_material, info.score)
            } else {
                info.score
            };
            line.push_str(&format!(" score cp {cp}"));
        }
    }

    if options.show_wdl {
        let wdl = wdl::expected_wdl(root_material, info.score);
        line.push_str(&format!(" wdl {} {} {}", wdl.win, wdl.draw, wdl.loss));
    }

    line.push_str(&format!(" hashfull {}", info.hashfull));
    if info.tb_hits > 0 {
        line.push_str(&format!(" tbhits {}", info.tb_hits));
    }

    if !info.pv.is_empty() {
        line.push_str(" pv");
        for mv in &info.pv {
            line.push_str(&format!(" {mv}"));
        }
    }

    line
}

#[must_use]
pub fn format_bestmove(mv: Move) -> String {
    format!("bestmove {mv}")
}
