//! Engine options exposed through `setoption`.

/// Current option values. Out-of-range numeric values are clamped with a
/// warning; unknown options are ignored by the caller.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub move_overhead: i64,
    pub normalize_score: bool,
    pub show_wdl: bool,
}

pub const HASH_MIN: usize = 1;
pub const HASH_MAX: usize = 65536;
pub const HASH_DEFAULT: usize = 32;
pub const MOVE_OVERHEAD_MIN: i64 = 0;
pub const MOVE_OVERHEAD_MAX: i64 = 5000;
pub const MOVE_OVERHEAD_DEFAULT: i64 = 10;

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            hash_mb: HASH_DEFAULT,
            move_overhead: MOVE_OVERHEAD_DEFAULT,
            normalize_score: true,
            show_wdl: false,
        }
    }
}

/// The option table printed in response to `uci`.
#[must_use]
pub fn describe_options() -> Vec<String> {
    vec![
        format!("option name Hash type spin default {HASH_DEFAULT} min {HASH_MIN} max {HASH_MAX}"),
        "option name ClearHash type button".to_string(),
        "option name SyzygyPath type string default <empty>".to_string(),
        "option name NNUEPath type string default <empty>".to_string(),
        format!(
            "option name MoveOverhead type spin default {MOVE_OVERHEAD_DEFAULT} min {MOVE_OVERHEAD_MIN} max {MOVE_OVERHEAD_MAX}"
        ),
        "option name NormalizeScore type check default true".to_string(),
        "option name UCI_ShowWDL type check default false".to_string(),
    ]
}

/// Parse a spin value, clamping into range with a warning.
#[must_use]
pub fn parse_spin(name: &str, value: &str, min: i64, max: i64, current: i64) -> i64 {
    match value.parse::<i64>() {
        Ok(parsed) => {
            let clamped = parsed.clamp(min, max);
            if clamped != parsed {
                log::warn!("option {name} value {parsed} out of range, clamped to {clamped}");
            }
            clamped
        }
        Err(_) => {
            log::warn!("option {name} expects a number, got {value:?}");
            current
        }
    }
}

/// Parse a check value; anything but `true`/`false` keeps the current
/// setting.
#[must_use]
pub fn parse_check(name: &str, value: &str, current: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        other => {
            log::warn!("option {name} expects true or false, got {other:?}");
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_values_clamp() {
        assert_eq!(parse_spin("Hash", "64", 1, 1024, 32), 64);
        assert_eq!(parse_spin("Hash", "99999", 1, 1024, 32), 1024);
        assert_eq!(parse_spin("Hash", "0", 1, 1024, 32), 1);
        assert_eq!(parse_spin("Hash", "junk", 1, 1024, 32), 32);
    }

    #[test]
    fn check_values_parse() {
        assert!(parse_check("UCI_ShowWDL", "true", false));
        assert!(!parse_check("UCI_ShowWDL", "False", true));
        assert!(parse_check("UCI_ShowWDL", "junk", true));
    }

    #[test]
    fn option_table_names_the_spec_options() {
        let options = describe_options().join("\n");
        for name in [
            "Hash",
            "ClearHash",
            "SyzygyPath",
            "NNUEPath",
            "MoveOverhead",
            "NormalizeScore",
            "UCI_ShowWDL",
        ] {
            assert!(options.contains(name), "missing option {name}");
        }
    }
}
