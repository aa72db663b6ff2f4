//! Terminal reporting: failure blocks, banners, and tallies.

use std::env;
use std::io::Write;

use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

use crate::config::Config;
use crate::runner::Tally;
use crate::transcript::Test;

/// Formats everything the user sees on stdout. Honors `--quiet`/`--verbose`
/// and the resolved color choice; write errors are deliberately ignored so a
/// closed pipe cannot take the run down.
pub struct Reporter<W: WriteColor> {
    out: W,
    width: usize,
    quiet: bool,
    verbose: bool,
    /// True right after a separator line, so back-to-back failures share one
    /// rule instead of printing a doubled one.
    after_separator: bool,
}

impl Reporter<StandardStream> {
    pub fn stdout(config: &Config) -> Self {
        Self::new(StandardStream::stdout(config.color.to_choice()), config)
    }
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W, config: &Config) -> Self {
        Self {
            out,
            width: separator_width(),
            quiet: config.quiet,
            verbose: config.verbose,
            after_separator: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// `Testing file <path>` banner, multi-file mode only.
    pub fn file_banner(&mut self, name: &str) {
        if self.quiet {
            return;
        }
        let _ = writeln!(self.out, "Testing file {name}");
        self.after_separator = false;
    }

    /// One `--list` entry; nothing was executed.
    pub fn list_entry(&mut self, test: &Test) {
        if self.quiet {
            return;
        }
        let _ = writeln!(self.out, "#{}\t{}", test.index, test.command);
        self.after_separator = false;
    }

    /// One `--list-run` entry with its verdict.
    pub fn list_run_entry(&mut self, test: &Test, ok: bool) {
        if self.quiet {
            return;
        }
        let _ = write!(self.out, "#{}\t", test.index);
        if ok {
            self.colored("OK", Color::Green, false);
        } else {
            self.colored("FAIL", Color::Red, false);
        }
        let _ = writeln!(self.out, "\t{}", test.command);
        self.after_separator = false;
    }

    /// Announce a test about to execute (`--verbose` only).
    pub fn progress(&mut self, test: &Test) {
        if self.quiet || !self.verbose {
            return;
        }
        let _ = writeln!(self.out, "#{}\t{}", test.index, test.command);
        self.after_separator = false;
    }

    /// A full failure block: separator, header, diff fragment, separator.
    pub fn failure(&mut self, test: &Test, fragment: &str) {
        if self.quiet {
            return;
        }
        if !self.after_separator {
            self.separator();
        }
        self.colored(
            &format!(
                "[FAILED #{}, line {}] {}",
                test.index, test.source_line, test.command
            ),
            Color::Red,
            true,
        );
        let _ = writeln!(self.out);
        for line in fragment.lines() {
            match line.as_bytes().first() {
                Some(b'-') => self.colored(line, Color::Red, false),
                Some(b'+') => self.colored(line, Color::Green, false),
                Some(b'@') => self.colored(line, Color::Cyan, false),
                _ => {
                    let _ = write!(self.out, "{line}");
                }
            }
            let _ = writeln!(self.out);
        }
        self.separator();
        self.after_separator = true;
    }

    /// Per-file OK/FAIL/SKIP table, multi-file mode only.
    pub fn files_table(&mut self, rows: &[(String, Tally)]) {
        if self.quiet || rows.is_empty() {
            return;
        }
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "{:>5} {:>5} {:>5}  file", "ok", "fail", "skip");
        for (name, tally) in rows {
            let _ = writeln!(
                self.out,
                "{:>5} {:>5} {:>5}  {}",
                tally.passed(),
                tally.failed,
                tally.skipped,
                name
            );
        }
        self.after_separator = false;
    }

    /// Final `OK:`/`FAIL:` summary line.
    pub fn summary(&mut self, tally: &Tally) {
        if self.quiet {
            return;
        }
        let skipped = match tally.skipped {
            0 => String::new(),
            s => format!(" ({s} skipped)"),
        };
        if tally.failed == 0 {
            self.colored("OK", Color::Green, true);
            let _ = writeln!(
                self.out,
                ": {} of {} tests passed{}",
                tally.passed(),
                tally.seen,
                skipped
            );
        } else {
            self.colored("FAIL", Color::Red, true);
            let _ = writeln!(
                self.out,
                ": {} of {} tests failed{}",
                tally.failed, tally.seen, skipped
            );
        }
        self.after_separator = false;
    }

    fn separator(&mut self) {
        self.colored(&"-".repeat(self.width), Color::Red, false);
        let _ = writeln!(self.out);
    }

    fn colored(&mut self, text: &str, color: Color, bold: bool) {
        let _ = self
            .out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
        let _ = write!(self.out, "{text}");
        let _ = self.out.reset();
    }
}

/// Separator width: `COLUMNS` when set to a positive number, else 50.
fn separator_width() -> usize {
    width_from(env::var("COLUMNS").ok().as_deref())
}

fn width_from(columns: Option<&str>) -> usize {
    columns
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(50)
}
