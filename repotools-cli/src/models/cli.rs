// repotools-cli/src/models/cli.rs
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Repotools: build, test, deploy and inspect the monorepo through named tools.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project root. Defaults to the nearest directory above the current one
    /// that holds a Repotools.toml, or the current directory.
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every registered tool.
    List,
    /// Show a tool's description, timeout and parameter schema.
    Describe {
        /// Tool name, e.g. `run_tests`.
        tool: String,
    },
    /// Run a tool and print its response.
    Call {
        /// Tool name, e.g. `run_tests`.
        tool: String,
        /// A parameter as key=value. Values are read as JSON when they parse,
        /// otherwise as plain strings (`-p coverage=true -p test_type=unit`).
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// All parameters as one JSON object. `-p` values override its keys.
        #[arg(long, value_name = "OBJECT")]
        json: Option<String>,
    },
}
