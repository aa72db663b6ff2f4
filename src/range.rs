//! Numeric range selection over test indices.
//!
//! Parses strings like `1,3,5-7` into a membership predicate used by the
//! `--test` and `--skip` options.

use std::fmt;

/// A set of test indices built from comma-separated numbers and `A-B` spans.
///
/// The empty set means "no filter active", not "match nothing ever asked":
/// callers check [`RangeSet::is_empty`] before consulting membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSet {
    spans: Vec<(usize, usize)>,
}

/// The range string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeError {
    input: String,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid range: {:?}", self.input)
    }
}

impl std::error::Error for RangeError {}

impl RangeSet {
    /// Parse `N[,N|N-N]*`.
    ///
    /// The empty string and the literal `0` produce the empty set. Reversed
    /// spans are normalized, duplicates are harmless, and any character
    /// outside `[0-9,-]` (including a missing span endpoint) is an error.
    pub fn parse(input: &str) -> Result<Self, RangeError> {
        if input.is_empty() || input == "0" {
            return Ok(Self::default());
        }

        let err = || RangeError {
            input: input.to_string(),
        };
        let mut spans = Vec::new();
        for item in input.split(',') {
            let span = match item.split_once('-') {
                None => {
                    let n: usize = item.parse().map_err(|_| err())?;
                    (n, n)
                }
                Some((a, b)) => {
                    let a: usize = a.parse().map_err(|_| err())?;
                    let b: usize = b.parse().map_err(|_| err())?;
                    (a.min(b), a.max(b))
                }
            };
            spans.push(span);
        }
        Ok(Self { spans })
    }

    /// True when no range was given, i.e. the filter is inactive.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.spans.iter().any(|&(lo, hi)| lo <= index && index <= hi)
    }
}
