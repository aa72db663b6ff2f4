//! Output comparison: the five match modes and diff rendering.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::session;
use crate::transcript::{Expected, Test};

/// Outcome of matching one test's captured output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    /// Carries the human-readable fragment shown under the failure header.
    Fail(String),
}

/// User-actionable problems that abort the run.
#[derive(Debug)]
pub enum MatchError {
    /// The `--file` target could not be read.
    ExpectedFile {
        path: PathBuf,
        line: usize,
        source: io::Error,
    },
    /// A `--regex`/`--perl` pattern did not compile.
    BadPattern {
        pattern: String,
        line: usize,
        source: regex::Error,
    },
    /// The eval-mode expression could not be run.
    Eval { command: String, source: io::Error },
    /// The diff tool failed or could not be invoked.
    Diff(io::Error),
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::ExpectedFile { path, line, source } => write!(
                f,
                "line {line}: cannot read expected-output file {}: {source}",
                path.display()
            ),
            MatchError::BadPattern {
                pattern,
                line,
                source,
            } => {
                write!(f, "line {line}: invalid regex {pattern:?}: {source}")
            }
            MatchError::Eval { command, source } => {
                write!(f, "cannot evaluate expected output of {command:?}: {source}")
            }
            MatchError::Diff(e) => write!(f, "diff failed: {e}"),
        }
    }
}

impl std::error::Error for MatchError {}

/// Compares captured output against expectations. Needs a scratch directory
/// to stage the files handed to diff.
pub struct Matcher<'a> {
    scratch: &'a Path,
    diff_options: &'a str,
}

impl<'a> Matcher<'a> {
    pub fn new(scratch: &'a Path, diff_options: &'a str) -> Self {
        Self {
            scratch,
            diff_options,
        }
    }

    /// Pure dispatch over the expected payload.
    pub fn check(&self, test: &Test, captured: &str) -> Result<Verdict, MatchError> {
        match &test.expected {
            Expected::Output(expected) => self.diff_verdict(expected, captured),
            Expected::Text(expected) => self.diff_verdict(&format!("{expected}\n"), captured),
            Expected::Eval(command) => {
                let expected = session::capture(command).map_err(|source| MatchError::Eval {
                    command: command.clone(),
                    source,
                })?;
                self.diff_verdict(&expected, captured)
            }
            Expected::Lines(want) => {
                let got = captured.bytes().filter(|&b| b == b'\n').count() as u64;
                if got == *want {
                    Ok(Verdict::Pass)
                } else {
                    Ok(Verdict::Fail(format!("Expected {want} lines, got {got}.")))
                }
            }
            Expected::File(path) => {
                let expected =
                    fs::read(path).map_err(|source| MatchError::ExpectedFile {
                        path: path.clone(),
                        line: test.source_line,
                        source,
                    })?;
                self.diff_verdict(&String::from_utf8_lossy(&expected), captured)
            }
            Expected::Regex(pattern) => {
                let re = compile(pattern, test.source_line)?;
                if captured.lines().any(|l| re.is_match(l)) {
                    Ok(Verdict::Pass)
                } else {
                    Ok(Verdict::Fail(format!(
                        "expected a line matching regex {pattern:?}\ngot: {captured:?}"
                    )))
                }
            }
            Expected::Perl(pattern) => {
                let re = compile(pattern, test.source_line)?;
                if re.is_match(captured) {
                    Ok(Verdict::Pass)
                } else {
                    Ok(Verdict::Fail(format!(
                        "expected output matching regex {pattern:?}\ngot: {captured:?}"
                    )))
                }
            }
        }
    }

    fn diff_verdict(&self, expected: &str, actual: &str) -> Result<Verdict, MatchError> {
        if expected == actual {
            return Ok(Verdict::Pass);
        }
        let fragment = self.run_diff(expected, actual)?;
        if fragment.is_empty() {
            Ok(Verdict::Pass)
        } else {
            Ok(Verdict::Fail(fragment))
        }
    }

    /// Invoke the system diff on scratch copies. Headers are suppressed so
    /// only the hunks reach the report.
    fn run_diff(&self, expected: &str, actual: &str) -> Result<String, MatchError> {
        let expected_path = self.scratch.join("expected");
        let actual_path = self.scratch.join("actual");
        fs::write(&expected_path, expected).map_err(MatchError::Diff)?;
        fs::write(&actual_path, actual).map_err(MatchError::Diff)?;

        let output = Command::new("diff")
            .args(self.diff_options.split_whitespace())
            .arg(&expected_path)
            .arg(&actual_path)
            .output()
            .map_err(MatchError::Diff)?;

        // diff exits 0 on identical input, 1 on differences, 2 on trouble
        // (bad options, unreadable file).
        match output.status.code() {
            Some(0) | Some(1) => {}
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(MatchError::Diff(io::Error::other(format!(
                    "diff exited with {}: {}",
                    output.status,
                    stderr.trim()
                ))));
            }
        }

        Ok(strip_headers(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn compile(pattern: &str, line: usize) -> Result<regex::Regex, MatchError> {
    regex::Regex::new(pattern).map_err(|source| MatchError::BadPattern {
        pattern: pattern.to_string(),
        line,
        source,
    })
}

/// Drop the `---`/`+++` file-header pair unified diffs start with.
fn strip_headers(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    for (i, line) in diff.lines().enumerate() {
        if i < 2 && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_with(expected: Expected) -> Test {
        Test {
            index: 1,
            source_line: 7,
            command: String::new(),
            expected,
        }
    }

    fn check(expected: Expected, captured: &str) -> Result<Verdict, MatchError> {
        let dir = tempdir().unwrap();
        Matcher::new(dir.path(), "-u").check(&test_with(expected), captured)
    }

    #[test]
    fn output_exact_match_passes() {
        let verdict = check(Expected::Output("hello\n".to_string()), "hello\n").unwrap();
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn empty_output_matches_empty_capture() {
        let verdict = check(Expected::Output(String::new()), "").unwrap();
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn output_mismatch_yields_a_diff_without_headers() {
        let verdict = check(Expected::Output("bye\n".to_string()), "hi\n").unwrap();
        let Verdict::Fail(fragment) = verdict else {
            panic!("expected a failure");
        };
        assert!(fragment.contains("-bye"), "fragment: {fragment}");
        assert!(fragment.contains("+hi"), "fragment: {fragment}");
        assert!(!fragment.contains("--- "), "fragment: {fragment}");
        assert!(!fragment.contains("+++ "), "fragment: {fragment}");
    }

    #[test]
    fn text_mode_appends_a_newline() {
        let verdict = check(Expected::Text("hello".to_string()), "hello\n").unwrap();
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn eval_mode_compares_against_subshell_stdout() {
        let verdict = check(Expected::Eval("echo hello".to_string()), "hello\n").unwrap();
        assert_eq!(verdict, Verdict::Pass);
        let verdict = check(Expected::Eval("echo bye".to_string()), "hello\n").unwrap();
        assert!(matches!(verdict, Verdict::Fail(_)));
    }

    #[test]
    fn lines_mode_counts_newline_terminated_lines() {
        assert_eq!(check(Expected::Lines(3), "a\nb\nc\n").unwrap(), Verdict::Pass);
        assert_eq!(check(Expected::Lines(0), "").unwrap(), Verdict::Pass);
        // A final unterminated line does not count.
        assert_eq!(check(Expected::Lines(1), "a\nb").unwrap(), Verdict::Pass);
    }

    #[test]
    fn lines_mode_failure_message() {
        let verdict = check(Expected::Lines(3), "a\n").unwrap();
        assert_eq!(verdict, Verdict::Fail("Expected 3 lines, got 1.".to_string()));
    }

    #[test]
    fn file_mode_diffs_file_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("expected.txt");
        fs::write(&path, "hello\n").unwrap();
        let verdict = check(Expected::File(path), "hello\n").unwrap();
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn missing_expected_file_is_fatal() {
        let err = check(
            Expected::File(PathBuf::from("/nonexistent/expected.txt")),
            "hello\n",
        )
        .unwrap_err();
        match err {
            MatchError::ExpectedFile { line, .. } => assert_eq!(line, 7),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn regex_mode_searches_line_by_line() {
        assert_eq!(
            check(Expected::Regex("^b.d$".to_string()), "good\nbad\n").unwrap(),
            Verdict::Pass
        );
        assert!(matches!(
            check(Expected::Regex("^nope$".to_string()), "good\nbad\n").unwrap(),
            Verdict::Fail(_)
        ));
    }

    #[test]
    fn perl_mode_matches_the_whole_capture() {
        // `.` does not cross lines unless the pattern asks for it.
        assert!(matches!(
            check(Expected::Perl("a.b".to_string()), "a\nb\n").unwrap(),
            Verdict::Fail(_)
        ));
        assert_eq!(
            check(Expected::Perl("(?s)a.b".to_string()), "a\nb\n").unwrap(),
            Verdict::Pass
        );
    }

    #[test]
    fn malformed_pattern_is_fatal() {
        let err = check(Expected::Regex("(".to_string()), "x\n").unwrap_err();
        assert!(matches!(err, MatchError::BadPattern { line: 7, .. }));
        let err = check(Expected::Perl("(".to_string()), "x\n").unwrap_err();
        assert!(matches!(err, MatchError::BadPattern { .. }));
    }

    #[test]
    fn bad_diff_options_are_fatal() {
        let dir = tempdir().unwrap();
        let matcher = Matcher::new(dir.path(), "--definitely-not-a-diff-flag");
        let err = matcher
            .check(&test_with(Expected::Output("a\n".to_string())), "b\n")
            .unwrap_err();
        assert!(matches!(err, MatchError::Diff(_)));
    }

    #[test]
    fn strip_headers_removes_only_the_leading_pair() {
        let diff = "--- a\n+++ b\n@@ -1 +1 @@\n-x\n+y\n";
        assert_eq!(strip_headers(diff), "@@ -1 +1 @@\n-x\n+y\n");
        // Lines that merely look like headers deeper in a hunk survive.
        let body = "@@ -1 +1 @@\n---- rule\n+++ plus\n";
        assert_eq!(strip_headers(body), body);
    }
}
