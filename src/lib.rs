//! Test runner for interactive command-line sessions recorded as plain-text
//! transcripts.
//!
//! A transcript looks like a copy-pasted shell session: a prompt line holds a
//! command, and the lines after it (or an inline marker on the same line)
//! hold the expected output. Commands run in a persistent shell, so variables,
//! functions, and the working directory carry over from one test to the next.

pub mod config;
pub mod matcher;
pub mod range;
pub mod report;
pub mod runner;
pub mod session;
pub mod transcript;

pub use config::{Config, ListMode};
pub use runner::{Driver, RunError, Tally, exit_codes};
pub use transcript::{Expected, ParseOptions, Test};
