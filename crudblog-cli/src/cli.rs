use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "crudblog")]
#[command(about = "Read and write posts on a hosted GraphQL blog", version)]
pub struct Cli {
    /// Settings file (TOML); defaults to ./crudblog.toml when present
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Amplify-generated amplifyconfiguration.json
    #[arg(long, value_name = "FILE", global = true)]
    pub amplify_config: Option<PathBuf>,

    /// Use an in-memory backend with sample posts instead of the hosted API
    #[arg(long, global = true)]
    pub offline: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// List every post
    List,
    /// Show one post in full
    View { id: String },
    /// Create a post (requires login)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Change a post you own
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a post you own
    Delete { id: String },
    /// Sign in to the user pool
    Login {
        username: String,
        /// Read from CRUDBLOG_PASSWORD, or prompted for when absent
        #[arg(long, env = "CRUDBLOG_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Print the signed-in user
    Whoami,
    /// Interactive session
    Shell,
}
