//! cli::args
//!
//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Declarative deployment orchestrator.
#[derive(Debug, Parser)]
#[command(
    name = "berth",
    version,
    about = "Reconcile a declarative deployment manifest against hosting providers",
    long_about = "berth reads a TOML manifest describing the desired end state of a \
                  project's services, DNS records, domain bindings, and certificates, \
                  observes what the providers currently have, and applies the minimal \
                  set of operations to converge.\n\n\
                  Provider credentials come exclusively from the environment \
                  (BERTH_<PROVIDER>_API_URL / BERTH_<PROVIDER>_TOKEN); they never \
                  appear in the manifest.",
    after_help = "EXAMPLES:\n    \
                  berth plan                      Preview what apply would do\n    \
                  berth plan -m infra/prod.toml   Preview with an explicit manifest\n    \
                  berth apply                     Converge providers on the manifest\n    \
                  berth apply --timeout 600       Cancel the run after ten minutes\n    \
                  berth status                    Show the most recent run"
)]
pub struct Cli {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Preview the operations apply would run, without mutating anything
    #[command(
        long_about = "Observes provider state, diffs it against the manifest, and \
                      prints the dependency-ordered operation plan. Never mutates \
                      anything. An empty plan means the providers already match the \
                      manifest."
    )]
    Plan {
        /// Path to the manifest
        #[arg(short, long, default_value = "berth.toml")]
        manifest: PathBuf,
    },

    /// Apply the manifest: converge providers on the declared state
    #[command(
        long_about = "Computes the same plan as `berth plan` and executes it. \
                      Independent operations run concurrently; transient provider \
                      failures retry with bounded backoff; a permanent failure \
                      halts everything downstream of it while unrelated branches \
                      continue.\n\n\
                      Exit code 0 means every operation succeeded, 2 means the run \
                      partially failed or was cancelled, 1 means a fatal error \
                      prevented execution.\n\n\
                      Ctrl-C cancels: in-flight operations finish, nothing new \
                      starts, never-started operations are reported as cancelled."
    )]
    Apply {
        /// Path to the manifest
        #[arg(short, long, default_value = "berth.toml")]
        manifest: PathBuf,

        /// Run-wide timeout in seconds (overrides the manifest setting)
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Show the result of the most recent run
    #[command(
        long_about = "Prints the persisted result of the last apply: run id, overall \
                      status, and the terminal outcome of every operation. Exits 0 \
                      only if that run succeeded; 1 otherwise, including when no run \
                      has been recorded."
    )]
    Status,

    /// Generate shell completion scripts
    #[command(
        long_about = "Generate completion scripts for your shell.\n\n\
                      Bash:  berth completion bash > /etc/bash_completion.d/berth\n\
                      Zsh:   berth completion zsh > \"${fpath[1]}/_berth\"\n\
                      Fish:  berth completion fish > ~/.config/fish/completions/berth.fish"
    )]
    Completion {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
