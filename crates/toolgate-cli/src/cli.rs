use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use toolgate_core::config::AuthorizerMode;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "toolgate")]
#[command(version, about = "Toolgate - sandbox authorization for agent tools")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.config/toolgate/config.toml)
    #[arg(long, global = true, env = "TOOLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sandbox directory (defaults to the configured one, then the current directory)
    #[arg(long, global = true, env = "TOOLGATE_SANDBOX")]
    pub sandbox: Option<PathBuf>,

    /// Override the configured policy
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Strict,
    Permissive,
    AutoApprove,
}

impl From<ModeArg> for AuthorizerMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Strict => AuthorizerMode::Strict,
            ModeArg::Permissive => AuthorizerMode::Permissive,
            ModeArg::AutoApprove => AuthorizerMode::AutoApprove,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a shell command without authorizing it
    Classify {
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// Authorize reading files
    Read(FileArgs),

    /// Authorize writing files
    Write(FileArgs),

    /// Authorize running a shell command
    Shell(ShellArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct RequestArgs {
    /// Ask the user even where policy would allow
    #[arg(long)]
    pub explicit: bool,

    /// Reason shown in the prompt
    #[arg(long, default_value = "")]
    pub reason: String,

    /// User message to derive read grants from (repeatable)
    #[arg(long = "grant")]
    pub grants: Vec<String>,
}

#[derive(Args)]
pub struct FileArgs {
    /// Tool name reported to the authorizer
    #[arg(long)]
    pub tool: Option<String>,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Paths to authorize; relative paths resolve against the current directory
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Args)]
pub struct ShellArgs {
    /// Working directory; relative paths resolve against the sandbox
    #[arg(long, default_value = "")]
    pub cwd: PathBuf,

    #[command(flatten)]
    pub request: RequestArgs,

    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub argv: Vec<String>,
}
