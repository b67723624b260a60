//! ui::output
//!
//! Terminal output.
//!
//! # Design
//!
//! All user-facing text flows through [`Verbosity`], which is resolved
//! once from the CLI flags and threaded through the run. Errors are
//! always shown; debug lines only appear with `--debug`.

use std::fmt::Display;

/// Output verbosity level, resolved from the CLI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Minimal output.
    Quiet,
    /// Standard output.
    #[default]
    Normal,
    /// Verbose diagnostics.
    Debug,
}

impl Verbosity {
    /// Resolve the level from flags. Quiet wins over debug.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Print a message unless quiet.
    pub fn print(self, message: impl Display) {
        if self != Verbosity::Quiet {
            println!("{}", message);
        }
    }

    /// Print a diagnostic line, debug mode only.
    pub fn debug(self, message: impl Display) {
        if self == Verbosity::Debug {
            eprintln!("[debug] {}", message);
        }
    }

    /// Print a warning unless quiet.
    pub fn warn(self, message: impl Display) {
        if self != Verbosity::Quiet {
            eprintln!("warning: {}", message);
        }
    }
}

/// Print an error message. Errors ignore the verbosity level.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}
