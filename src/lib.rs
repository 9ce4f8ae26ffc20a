//! Job control core of a small interactive shell.
//!
//! Built-in commands run in-process; everything else is handed to a POSIX
//! shell in its own process group, either in the foreground or as a
//! background job. Ctrl-Z and Ctrl-C are routed by [`SignalBridge`] to the
//! foreground job, which is parked in the [`jobs::JobTable`] when stopped.
//!
//! The main entry point is [`Interpreter`], which owns a [`Session`] and runs
//! one command line at a time. The public modules [`command`], [`history`]
//! and [`jobs`] expose the pieces it is built from.

mod builtin;
pub mod command;
mod config;
mod external;
pub mod history;
mod interpreter;
pub mod jobs;
mod parser;
pub mod session;
mod signals;

pub use config::Config;
pub use interpreter::Interpreter;
pub use session::Session;
pub use signals::SignalBridge;

/// Prefix of every message the shell itself prints.
pub const PROGRAM_TAG: &str = "smash";

/// Shell that external commands are delegated to unless configured otherwise.
pub const DEFAULT_INTERPRETER: &str = "/bin/sh";
