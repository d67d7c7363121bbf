//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "delve",
    version,
    author = "neur0map",
    about = "Deep research over a private document collection",
    long_about = "Delve ingests a local document collection, retrieves passages with hybrid keyword and \
                  vector search, and answers research questions by decomposing them into subtasks and \
                  synthesizing each with source attribution."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/delve/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive research session
    Chat,

    /// Answer a single research question
    Ask {
        /// Research question
        query: String,

        /// Force multi-step deep research
        #[arg(long, conflicts_with = "refine")]
        deep: bool,

        /// Suggest follow-up research directions instead of answering
        #[arg(long)]
        refine: bool,

        /// Export the answer as markdown
        #[arg(short, long)]
        export: bool,
    },

    /// Index a directory of text documents
    Ingest {
        /// Directory to walk recursively
        dir: PathBuf,
    },

    /// Export the running server's session
    Export,

    /// Start the research server
    Serve {
        /// Run in the background
        #[arg(short, long)]
        detach: bool,
    },

    /// Stop the research server
    Stop,

    /// Show research server status
    Status,

    /// Send a research query to the running server
    Send {
        /// Research question
        query: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ask_flags() {
        let cli = Cli::try_parse_from(["delve", "ask", "--deep", "--export", "what is entropy"]).unwrap();
        match cli.command {
            Commands::Ask {
                query,
                deep,
                refine,
                export,
            } => {
                assert_eq!(query, "what is entropy");
                assert!(deep && export && !refine);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["delve", "ask", "--deep", "--refine", "q"]).is_err());
    }

    #[test]
    fn test_global_profile() {
        let cli = Cli::try_parse_from(["delve", "status", "--profile", "offline"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("offline"));
    }
}
