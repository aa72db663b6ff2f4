//! Command-line entry point.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use shtest::config::{ColorMode, Config, ListMode, decode_prefix};
use shtest::range::RangeSet;
use shtest::runner::{Driver, exit_codes};

/// Run tests extracted from shell-session transcripts.
#[derive(Debug, Parser)]
#[command(name = "shtest", version)]
#[command(about = "Validate interactive command-line sessions recorded in text transcripts")]
struct Cli {
    /// Transcript files to test (`-` reads from standard input)
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Stop on the first failed test
    #[arg(short = '1', long)]
    first: bool,

    /// List the tests without executing them
    #[arg(short = 'l', long, conflicts_with = "list_run")]
    list: bool,

    /// List the tests with their OK/FAIL status
    #[arg(short = 'L', long = "list-run")]
    list_run: bool,

    /// Only run the tests whose index is in RANGE (e.g. "1,3,5-7")
    #[arg(short = 't', long = "test", value_name = "RANGE", default_value = "")]
    test: String,

    /// Skip the tests whose index is in RANGE
    #[arg(short = 's', long = "skip", value_name = "RANGE", default_value = "")]
    skip: String,

    /// Run COMMAND once before the first test
    #[arg(long = "pre-flight", value_name = "COMMAND")]
    pre_flight: Option<String>,

    /// Run COMMAND once after the last test
    #[arg(long = "post-flight", value_name = "COMMAND")]
    post_flight: Option<String>,

    /// No output; the exit code tells the result
    #[arg(short, long)]
    quiet: bool,

    /// Print each command before executing it
    #[arg(short, long)]
    verbose: bool,

    /// When to color the output
    #[arg(long, value_enum, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// Options passed to the diff invocation
    #[arg(long = "diff-options", value_name = "OPTIONS", default_value = "-u")]
    diff_options: String,

    /// Marker separating a command from its inline expected output
    #[arg(long = "inline-prefix", value_name = "STRING", default_value = "#→ ")]
    inline_prefix: String,

    /// Prefix required before prompt and output lines: "tab", "0", a space
    /// count from 1 to 99, or a literal with backslash escapes. Note that an
    /// output line missing the prefix silently ends that test's expected
    /// output.
    #[arg(long, value_name = "STRING", default_value = "")]
    prefix: String,

    /// The prompt literal that starts a command line
    #[arg(long, value_name = "STRING", default_value = "$ ")]
    prompt: String,
}

fn main() {
    process::exit(run());
}

/// Real entry point. Everything lives on this stack frame so the scratch
/// directory is dropped (and removed) on every exit path before the process
/// exits.
fn run() -> i32 {
    let cli = Cli::parse();

    let run_range = match RangeSet::parse(&cli.test) {
        Ok(range) => range,
        Err(e) => return fatal(&e.to_string()),
    };
    let skip_range = match RangeSet::parse(&cli.skip) {
        Ok(range) => range,
        Err(e) => return fatal(&e.to_string()),
    };

    let config = Config {
        prefix: decode_prefix(&cli.prefix),
        prompt: cli.prompt,
        inline_prefix: cli.inline_prefix,
        diff_options: cli.diff_options,
        run_range,
        skip_range,
        list_mode: if cli.list {
            ListMode::List
        } else if cli.list_run {
            ListMode::ListRun
        } else {
            ListMode::Execute
        },
        stop_on_first_fail: cli.first,
        pre_flight: cli.pre_flight,
        post_flight: cli.post_flight,
        quiet: cli.quiet,
        verbose: cli.verbose,
        color: cli.color,
    };

    // Owner-only scratch directory under TMPDIR, removed on drop.
    let scratch = match tempfile::Builder::new().prefix("shtest-").tempdir() {
        Ok(dir) => dir,
        Err(e) => return fatal(&format!("cannot create temporary directory: {e}")),
    };

    let mut driver = match Driver::new(config, scratch.path()) {
        Ok(driver) => driver,
        Err(e) => return fatal(&format!("cannot determine the working directory: {e}")),
    };

    match driver.run(&cli.files) {
        Ok(code) => code,
        Err(e) => fatal(&e.to_string()),
    }
}

fn fatal(message: &str) -> i32 {
    eprintln!("shtest: Error: {message}");
    exit_codes::FATAL
}
