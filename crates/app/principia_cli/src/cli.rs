use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "principia", version, about = "Log in, inspect and end a persisted session")]
pub struct Cli {
    /// Session store file (overrides PRINCIPIA_STORE_PATH).
    #[arg(long, global = true, value_name = "PATH")]
    pub store_path: Option<PathBuf>,

    /// Keep the session in memory only; nothing survives the process.
    #[arg(long, global = true, conflicts_with = "store_path")]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate and start a session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session.
    Logout,
    /// Rotate the current session's token.
    Refresh,
    /// Print the current authentication state.
    Status,
    /// Print the version.
    Version,
}
