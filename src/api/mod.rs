//! Public entry points for the command-line interface.

pub mod cli;

pub use cli::{run, Cli, Command, CommonArgs, Outcome};
