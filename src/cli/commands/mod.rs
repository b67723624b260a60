//! cli::commands
//!
//! One module per subcommand.

pub mod apply;
pub mod completion;
pub mod plan;
pub mod status;
