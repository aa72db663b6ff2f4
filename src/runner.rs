//! The per-file driver: parse, filter, execute, match, tally.

use std::env;
use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use termcolor::{StandardStream, WriteColor};

use crate::config::{Config, ListMode};
use crate::matcher::{MatchError, Matcher, Verdict};
use crate::report::Reporter;
use crate::session::{self, SessionError, ShellSession};
use crate::transcript::{self, ParseError, ParseOptions, Test};

/// Process exit codes.
pub mod exit_codes {
    /// Every selected test passed, or a non-executing mode completed.
    pub const SUCCESS: i32 = 0;
    /// At least one test failed.
    pub const TEST_FAILED: i32 = 1;
    /// A fatal, user-actionable error.
    pub const FATAL: i32 = 2;
}

/// Counters for one file or the whole run; `passed` is derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub seen: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failed_indices: Vec<usize>,
}

impl Tally {
    pub fn passed(&self) -> usize {
        self.seen - self.failed - self.skipped
    }

    fn absorb(&mut self, other: &Tally) {
        self.seen += other.seen;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.failed_indices.extend_from_slice(&other.failed_indices);
    }
}

/// Fatal conditions. `main` prints these and exits 2.
#[derive(Debug)]
pub enum RunError {
    /// An input file could not be read.
    Input { path: PathBuf, source: io::Error },
    /// The original working directory could not be restored.
    Workdir { source: io::Error },
    /// A malformed inline directive in a transcript.
    Parse { path: PathBuf, source: ParseError },
    /// A matcher hit a user-actionable problem.
    Match { path: PathBuf, source: MatchError },
    /// The persistent shell could not be driven.
    Session {
        path: PathBuf,
        source: SessionError,
    },
    /// A file yielded no tests while no range filter was active.
    NoTestFound { path: PathBuf },
    /// Active ranges filtered out every test.
    EmptySelection { test_given: bool, skip_given: bool },
    /// The pre-flight command reported failure.
    PreFlight { command: String, code: Option<i32> },
    /// A pre/post-flight command could not be started.
    Hook { command: String, source: io::Error },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Input { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            RunError::Workdir { source } => {
                write!(f, "cannot restore the working directory: {source}")
            }
            RunError::Parse { path, source } => write!(f, "{}: {source}", path.display()),
            RunError::Match { path, source } => write!(f, "{}: {source}", path.display()),
            RunError::Session { path, source } => write!(f, "{}: {source}", path.display()),
            RunError::NoTestFound { path } => write!(f, "no test found in {}", path.display()),
            RunError::EmptySelection {
                test_given,
                skip_given,
            } => match (test_given, skip_given) {
                (true, false) => write!(f, "the --test range matched no test"),
                (false, true) => write!(f, "the --skip range skipped every test"),
                _ => write!(f, "no test remained after applying --test and --skip"),
            },
            RunError::PreFlight { command, code } => match code {
                Some(code) => write!(f, "pre-flight command exited with {code}: {command}"),
                None => write!(f, "pre-flight command was killed: {command}"),
            },
            RunError::Hook { command, source } => {
                write!(f, "cannot run hook {command:?}: {source}")
            }
        }
    }
}

impl std::error::Error for RunError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Completed,
    /// Stop-on-first-fail fired.
    Aborted,
}

/// Runs every input file in command-line order against one configuration.
pub struct Driver<W: WriteColor> {
    config: Config,
    reporter: Reporter<W>,
    scratch: PathBuf,
    original_dir: PathBuf,
    next_index: usize,
    total: Tally,
    per_file: Vec<(String, Tally)>,
}

impl Driver<StandardStream> {
    pub fn new(config: Config, scratch: &Path) -> io::Result<Self> {
        let reporter = Reporter::stdout(&config);
        Self::with_reporter(config, scratch, reporter)
    }
}

impl<W: WriteColor> Driver<W> {
    pub fn with_reporter(
        config: Config,
        scratch: &Path,
        reporter: Reporter<W>,
    ) -> io::Result<Self> {
        Ok(Self {
            config,
            reporter,
            scratch: scratch.to_path_buf(),
            original_dir: env::current_dir()?,
            next_index: 1,
            total: Tally::default(),
            per_file: Vec::new(),
        })
    }

    /// Run-wide counters.
    pub fn total(&self) -> &Tally {
        &self.total
    }

    /// Per-file counters in processing order.
    pub fn per_file(&self) -> &[(String, Tally)] {
        &self.per_file
    }

    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    /// Process all files and return the process exit code (0 or 1).
    pub fn run(&mut self, files: &[PathBuf]) -> Result<i32, RunError> {
        if let Some(command) = self.config.pre_flight.clone() {
            let status = session::run_hook(&command).map_err(|source| RunError::Hook {
                command: command.clone(),
                source,
            })?;
            if !status.success() {
                return Err(RunError::PreFlight {
                    command,
                    code: status.code(),
                });
            }
        }

        let multi = files.len() > 1;
        let mut aborted = false;
        for path in files {
            if self.run_file(path, multi)? == FileOutcome::Aborted {
                aborted = true;
                break;
            }
        }

        if !aborted {
            self.check_selection()?;
            if multi {
                let rows = std::mem::take(&mut self.per_file);
                self.reporter.files_table(&rows);
                self.per_file = rows;
            }
            self.reporter.summary(&self.total);
            if let Some(command) = &self.config.post_flight {
                // Post-flight status is deliberately ignored.
                let _ = session::run_hook(command);
            }
        }

        Ok(if self.total.failed > 0 {
            exit_codes::TEST_FAILED
        } else {
            exit_codes::SUCCESS
        })
    }

    fn run_file(&mut self, path: &Path, multi: bool) -> Result<FileOutcome, RunError> {
        // Tests may `cd`; keep relative input paths meaningful per file.
        env::set_current_dir(&self.original_dir).map_err(|source| RunError::Workdir { source })?;

        let raw = read_input(path)?;
        let text = transcript::normalize_line_endings(&raw);
        let opts = ParseOptions {
            prefix: self.config.prefix.clone(),
            prompt: self.config.prompt.clone(),
            inline_prefix: self.config.inline_prefix.clone(),
        };
        let tests = transcript::parse(&text, &opts, self.next_index).map_err(|source| {
            RunError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.next_index += tests.len();

        let filters_active =
            !self.config.run_range.is_empty() || !self.config.skip_range.is_empty();
        if tests.is_empty() && !filters_active {
            return Err(RunError::NoTestFound {
                path: path.to_path_buf(),
            });
        }

        if multi {
            self.reporter.file_banner(&path.display().to_string());
        }

        let mut shell = match self.config.list_mode {
            ListMode::List => None,
            _ if tests.is_empty() => None,
            _ => Some(
                ShellSession::spawn(&self.original_dir, &self.scratch).map_err(|source| {
                    RunError::Session {
                        path: path.to_path_buf(),
                        source,
                    }
                })?,
            ),
        };

        let mut tally = Tally::default();
        let mut outcome = FileOutcome::Completed;
        for test in &tests {
            tally.seen += 1;

            // Skip wins over include when both ranges name the same index.
            let included =
                self.config.run_range.is_empty() || self.config.run_range.contains(test.index);
            if !included || self.config.skip_range.contains(test.index) {
                tally.skipped += 1;
                continue;
            }

            if self.config.list_mode == ListMode::List {
                self.reporter.list_entry(test);
                continue;
            }

            if let Some(shell) = shell.as_mut()
                && self.run_one(test, shell, path, &mut tally)?
            {
                outcome = FileOutcome::Aborted;
                break;
            }
        }

        self.total.absorb(&tally);
        self.per_file.push((path.display().to_string(), tally));
        Ok(outcome)
    }

    /// Execute and match one test. Returns true when the run must abort.
    fn run_one(
        &mut self,
        test: &Test,
        shell: &mut ShellSession,
        path: &Path,
        tally: &mut Tally,
    ) -> Result<bool, RunError> {
        self.reporter.progress(test);

        let captured = shell.run(&test.command).map_err(|source| RunError::Session {
            path: path.to_path_buf(),
            source,
        })?;
        let verdict = Matcher::new(&self.scratch, &self.config.diff_options)
            .check(test, &captured)
            .map_err(|source| RunError::Match {
                path: path.to_path_buf(),
                source,
            })?;

        match verdict {
            Verdict::Pass => {
                if self.config.list_mode == ListMode::ListRun {
                    self.reporter.list_run_entry(test, true);
                }
            }
            Verdict::Fail(fragment) => {
                tally.failed += 1;
                tally.failed_indices.push(test.index);
                if self.config.list_mode == ListMode::ListRun {
                    self.reporter.list_run_entry(test, false);
                } else {
                    self.reporter.failure(test, &fragment);
                }
                if self.config.stop_on_first_fail {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Fatal when active ranges filtered out every seen test, to catch
    /// inverted or typo'd ranges. Not applied to `--list`, which never
    /// executes anything.
    fn check_selection(&self) -> Result<(), RunError> {
        if self.config.list_mode == ListMode::List {
            return Ok(());
        }
        let test_given = !self.config.run_range.is_empty();
        let skip_given = !self.config.skip_range.is_empty();
        if !(test_given || skip_given) {
            return Ok(());
        }
        if self.total.seen > 0 && self.total.skipped == self.total.seen {
            return Err(RunError::EmptySelection {
                test_given,
                skip_given,
            });
        }
        Ok(())
    }
}

/// Read a transcript, `-` meaning standard input. Bytes are decoded lossily;
/// transcripts are not required to be valid UTF-8.
fn read_input(path: &Path) -> Result<String, RunError> {
    let bytes = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf).map(|_| buf)
    } else {
        fs::read(path)
    }
    .map_err(|source| RunError::Input {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
