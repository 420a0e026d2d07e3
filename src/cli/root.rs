use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::{hash, server};

/// Guardian command
#[derive(Parser, Debug)]
#[command(version, propagate_version = true, subcommand_required = true)]
pub struct GuardianCommand {
    /// Log destination, a file path or "stdout"
    #[arg(long, env = "GUARDIAN_LOGPATH", default_value = "stdout", global = true)]
    pub logpath: String,
    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

impl GuardianCommand {
    /// File to append logs to, `None` when logging to stdout.
    pub fn log_file(&self) -> Option<PathBuf> {
        match self.logpath.as_str() {
            "" | "stdout" | "-" => None,
            path => Some(PathBuf::from(path)),
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gatekeeper in front of the backend
    Server(server::ServerCommand),
    /// Print the credential file hash of a password
    Hash(hash::HashCommand),
}

/// Parse command line args
pub fn parse() -> GuardianCommand {
    GuardianCommand::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let command = GuardianCommand::try_parse_from(["guardian", "server"]).unwrap();

        assert!(command.log_file().is_none());
        assert!(matches!(command.command, Command::Server(_)));
    }

    #[test]
    fn logpath_is_global() {
        let command = GuardianCommand::try_parse_from([
            "guardian",
            "server",
            "--logpath",
            "/var/log/guardian.log",
        ])
        .unwrap();

        assert_eq!(
            command.log_file(),
            Some(PathBuf::from("/var/log/guardian.log"))
        );
    }

    #[test]
    fn subcommand_required() {
        assert!(GuardianCommand::try_parse_from(["guardian"]).is_err());
    }
}
