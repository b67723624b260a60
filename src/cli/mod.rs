//! cli
//!
//! Command-line interface: argument parsing and command dispatch.
//!
//! Commands are synchronous entry points; those that talk to providers
//! build a tokio runtime and block on the async engine.

pub mod args;
pub mod commands;

use anyhow::Result;
use clap::Parser;

use crate::engine::Context;
use args::{Cli, Command};

/// Parse arguments, dispatch, and return the process exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    let ctx = Context::from_flags(cli.quiet, cli.debug);
    match cli.command {
        Command::Plan { manifest } => commands::plan::run(&manifest, &ctx),
        Command::Apply { manifest, timeout } => commands::apply::run(&manifest, timeout, &ctx),
        Command::Status => commands::status::run(&ctx),
        Command::Completion { shell } => commands::completion::run(shell),
    }
}
