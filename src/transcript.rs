//! Transcript ingestion: line-ending normalization, the line-oriented
//! parser, and the test records it emits.
//!
//! A transcript is scanned once, line by line, with a single piece of state:
//! the test currently accumulating expected output. Prompt lines start or
//! close tests; everything else is either expected output or ignored.

use std::fmt;
use std::path::PathBuf;

/// Expected-output payload, one variant per match mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// Multi-line output accumulated from the lines after the command.
    /// May be empty: the command must then print nothing.
    Output(String),
    /// A single line given inline; a newline is appended at compare time.
    Text(String),
    /// A shell expression whose captured stdout is the expected text.
    Eval(String),
    /// A count of newline-terminated output lines.
    Lines(u64),
    /// A file whose contents are the expected output.
    File(PathBuf),
    /// A pattern that must match at least one output line.
    Regex(String),
    /// A pattern evaluated against the whole capture as one string.
    Perl(String),
}

/// One extracted test: a command and what its combined output should be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    /// 1-based ordinal in parser emission order, monotonic across the run.
    pub index: usize,
    /// Line in the transcript where the command appears.
    pub source_line: usize,
    /// Verbatim command text handed to the shell.
    pub command: String,
    pub expected: Expected,
}

/// Parser settings. All three are compared as literal substrings.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub prefix: String,
    pub prompt: String,
    pub inline_prefix: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            prompt: "$ ".to_string(),
            inline_prefix: "#→ ".to_string(),
        }
    }
}

/// A malformed inline directive. Fatal for the whole run.
#[derive(Debug)]
pub enum ParseError {
    /// The `--lines` payload was not a bare non-negative integer.
    BadLineCount { line: usize, payload: String },
    /// A directive other than `--text` with nothing after it.
    EmptyPayload { line: usize, directive: &'static str },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadLineCount { line, payload } => write!(
                f,
                "line {line}: --lines expects a non-negative integer, got {payload:?}"
            ),
            ParseError::EmptyPayload { line, directive } => {
                write!(f, "line {line}: empty expected output for {directive}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Convert CRLF line endings to LF on ingest.
pub fn normalize_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n")
}

/// Scan a normalized transcript and emit tests, numbering from `first_index`.
///
/// A trailing newline on the last line is optional. Backslashes, spaces, and
/// tabs pass through untouched.
pub fn parse(
    input: &str,
    opts: &ParseOptions,
    first_index: usize,
) -> Result<Vec<Test>, ParseError> {
    let full_prompt = format!("{}{}", opts.prefix, opts.prompt);
    let prompt_trimmed = full_prompt.trim_end();
    let prompt_spaced = format!("{full_prompt} ");

    let mut tests = Vec::new();
    let mut next_index = first_index;
    let mut pending: Option<Test> = None;

    for (n, line) in input.lines().enumerate() {
        let lineno = n + 1;

        // A lone prompt (exact, trailing space trimmed, or one extra trailing
        // space) closes the open test and starts nothing.
        if line == full_prompt || line == prompt_trimmed || line == prompt_spaced {
            flush(&mut pending, &mut tests);
            continue;
        }

        if let Some(rest) = line.strip_prefix(full_prompt.as_str())
            && !rest.is_empty()
        {
            flush(&mut pending, &mut tests);
            let index = next_index;
            next_index += 1;

            // Split on the rightmost marker so the payload may itself contain
            // the marker sequence earlier in the line.
            if let Some(pos) = rest.rfind(opts.inline_prefix.as_str()) {
                let command = rest[..pos].to_string();
                let payload = &rest[pos + opts.inline_prefix.len()..];
                tests.push(Test {
                    index,
                    source_line: lineno,
                    command,
                    expected: decode_inline(payload, lineno)?,
                });
            } else {
                pending = Some(Test {
                    index,
                    source_line: lineno,
                    command: rest.to_string(),
                    expected: Expected::Output(String::new()),
                });
            }
            continue;
        }

        if let Some(test) = pending.as_mut() {
            if !opts.prefix.is_empty() && !line.starts_with(opts.prefix.as_str()) {
                // An unprefixed line silently ends the output block.
                flush(&mut pending, &mut tests);
                continue;
            }
            let data = line.strip_prefix(opts.prefix.as_str()).unwrap_or(line);
            if let Expected::Output(buf) = &mut test.expected {
                buf.push_str(data);
                buf.push('\n');
            }
        }
        // Lines outside any test are ignored.
    }

    flush(&mut pending, &mut tests);
    Ok(tests)
}

fn flush(pending: &mut Option<Test>, tests: &mut Vec<Test>) {
    if let Some(test) = pending.take() {
        tests.push(test);
    }
}

/// Decode an inline payload into its match mode. No directive means plain
/// text; `--text` exists to force text mode on payloads that would otherwise
/// look like a directive.
fn decode_inline(payload: &str, line: usize) -> Result<Expected, ParseError> {
    if let Some(rest) = payload.strip_prefix("--text ") {
        return Ok(Expected::Text(rest.to_string()));
    }
    if let Some(rest) = payload.strip_prefix("--lines ") {
        return match rest.parse::<u64>() {
            Ok(n) => Ok(Expected::Lines(n)),
            Err(_) => Err(ParseError::BadLineCount {
                line,
                payload: rest.to_string(),
            }),
        };
    }
    if let Some(rest) = payload.strip_prefix("--eval ") {
        return Ok(Expected::Eval(nonempty(rest, "--eval", line)?));
    }
    if let Some(rest) = payload.strip_prefix("--file ") {
        return Ok(Expected::File(PathBuf::from(nonempty(
            rest, "--file", line,
        )?)));
    }
    if let Some(rest) = payload.strip_prefix("--regex ") {
        return Ok(Expected::Regex(nonempty(rest, "--regex", line)?));
    }
    if let Some(rest) = payload.strip_prefix("--perl ") {
        return Ok(Expected::Perl(nonempty(rest, "--perl", line)?));
    }
    Ok(Expected::Text(payload.to_string()))
}

fn nonempty(rest: &str, directive: &'static str, line: usize) -> Result<String, ParseError> {
    if rest.is_empty() {
        Err(ParseError::EmptyPayload { line, directive })
    } else {
        Ok(rest.to_string())
    }
}
