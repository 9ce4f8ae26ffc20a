use std::path::PathBuf;

use argh::FromArgs;

use crate::DEFAULT_INTERPRETER;

#[derive(FromArgs, Debug, PartialEq)]
/// Interactive shell with job control.
pub struct Config {
    #[argh(option, default = "String::from(\"smash> \")")]
    /// text printed before each command line.
    pub prompt: String,

    #[argh(option, default = "PathBuf::from(DEFAULT_INTERPRETER)")]
    /// shell used to run external commands as `<interpreter> -c <line>`.
    pub interpreter: PathBuf,

    #[argh(option, short = 'c')]
    /// run a single command line and exit with its status.
    pub command: Option<String>,
}
