//! Runtime configuration consumed by the core components.
//!
//! The CLI layer assembles a [`Config`] once; the driver, parser, and
//! reporter only ever see this struct, never the raw flags.

use clap::ValueEnum;
use termcolor::ColorChoice;

use crate::range::RangeSet;

/// Color policy from `--color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Color iff stdout is a terminal.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolve to a termcolor choice. termcolor does not probe the terminal
    /// itself, so `Auto` is decided here with a tty check.
    pub fn to_choice(self) -> ColorChoice {
        match self {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto => {
                if atty::is(atty::Stream::Stdout) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
        }
    }
}

/// What the driver does with each selected test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMode {
    /// Run and match every selected test.
    #[default]
    Execute,
    /// Print the commands without executing anything.
    List,
    /// Run the tests but report one OK/FAIL line each instead of diffs.
    ListRun,
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Literal required before prompt and output lines; decoded, not raw.
    pub prefix: String,
    pub prompt: String,
    pub inline_prefix: String,
    /// Whitespace-separated options handed to the diff invocation.
    pub diff_options: String,
    pub run_range: RangeSet,
    pub skip_range: RangeSet,
    pub list_mode: ListMode,
    pub stop_on_first_fail: bool,
    pub pre_flight: Option<String>,
    pub post_flight: Option<String>,
    pub quiet: bool,
    pub verbose: bool,
    pub color: ColorMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            prompt: "$ ".to_string(),
            inline_prefix: "#→ ".to_string(),
            diff_options: "-u".to_string(),
            run_range: RangeSet::default(),
            skip_range: RangeSet::default(),
            list_mode: ListMode::default(),
            stop_on_first_fail: false,
            pre_flight: None,
            post_flight: None,
            quiet: false,
            verbose: false,
            color: ColorMode::default(),
        }
    }
}

/// Decode the `--prefix` flag: `tab` is a tab character, `0` is empty, a
/// number from 1 to 99 is that many spaces, and anything else has backslash
/// escapes expanded.
pub fn decode_prefix(raw: &str) -> String {
    match raw {
        "tab" => "\t".to_string(),
        "0" => String::new(),
        _ => {
            if let Ok(n) = raw.parse::<usize>()
                && (1..=99).contains(&n)
            {
                return " ".repeat(n);
            }
            expand_escapes(raw)
        }
    }
}

fn expand_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            // Unknown sequences are kept as written.
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_tab_keyword() {
        assert_eq!(decode_prefix("tab"), "\t");
    }

    #[test]
    fn prefix_zero_is_empty() {
        assert_eq!(decode_prefix("0"), "");
    }

    #[test]
    fn prefix_space_counts() {
        assert_eq!(decode_prefix("1"), " ");
        assert_eq!(decode_prefix("4"), "    ");
        assert_eq!(decode_prefix("99"), " ".repeat(99));
    }

    #[test]
    fn prefix_count_out_of_range_is_literal() {
        assert_eq!(decode_prefix("100"), "100");
    }

    #[test]
    fn prefix_escapes() {
        assert_eq!(decode_prefix("\\t"), "\t");
        assert_eq!(decode_prefix("ab\\tcd"), "ab\tcd");
        assert_eq!(decode_prefix("\\\\"), "\\");
        assert_eq!(decode_prefix("\\q"), "\\q");
        assert_eq!(decode_prefix("end\\"), "end\\");
    }

    #[test]
    fn forced_color_modes_resolve_directly() {
        assert_eq!(ColorMode::Always.to_choice(), ColorChoice::Always);
        assert_eq!(ColorMode::Never.to_choice(), ColorChoice::Never);
    }
}
