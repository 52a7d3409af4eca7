//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};

/// Real-time product-sourcing task service and client
///
/// Runs the sourcing service (submission endpoint + notification channel)
/// or submits analysis tasks to it and streams their progress.
#[derive(Parser, Debug)]
#[command(name = "sellflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Direct query (alternative to the 'submit' subcommand)
    #[arg(num_args = 1..)]
    pub query: Vec<String>,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sourcing service
    Serve {
        /// Override the submission endpoint listen address
        #[arg(long)]
        http_addr: Option<String>,

        /// Override the notification channel listen address
        #[arg(long)]
        notify_addr: Option<String>,
    },

    /// Submit a sourcing task and stream its progress
    Submit {
        /// The search term to analyze
        query: String,

        /// Return right after submission instead of streaming updates
        #[arg(long)]
        no_follow: bool,
    },

    /// List completed tasks from the local store
    Results,
}
