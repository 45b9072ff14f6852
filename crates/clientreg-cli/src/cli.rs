//! CLI argument definitions for clientreg.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// clientreg -- register and look up client identifiers.
#[derive(Debug, Parser)]
#[command(
    name = "clientreg",
    version,
    about = "clientreg -- client identity registry",
    long_about = "Generates random client identifiers, records them in a SQLite \
                  database, and answers whether an identifier has been registered."
)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Database file; overrides `store.path` from the config.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print a freshly generated client identifier without storing it.
    Generate,

    /// Register a client identifier (a new one if none is given).
    Register {
        /// Identifier to register.
        id: Option<String>,
    },

    /// Check whether a client identifier is registered.
    Exists {
        /// Identifier to look up.
        id: String,
    },

    /// List every registered client identifier.
    List {
        /// Print a JSON array instead of one id per line.
        #[arg(long)]
        json: bool,
    },

    /// Create the users table and its unique index.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_without_id() {
        let cli = Cli::try_parse_from(["clientreg", "register"]).unwrap();
        assert!(matches!(cli.command, Commands::Register { id: None }));
        assert_eq!(cli.config, PathBuf::from("config/default.toml"));
        assert!(cli.db.is_none());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli =
            Cli::try_parse_from(["clientreg", "exists", "abc", "--db", "/tmp/x.db", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Exists { ref id } if id == "abc"));
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(cli.verbose);
    }

    #[test]
    fn exists_requires_an_id() {
        assert!(Cli::try_parse_from(["clientreg", "exists"]).is_err());
    }

    #[test]
    fn list_json_flag() {
        let cli = Cli::try_parse_from(["clientreg", "list", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::List { json: true }));
    }
}
