use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// radiobox - play music folders from RFID tags and an IR remote 📻
#[derive(Parser, Debug)]
#[command(name = "radiobox", version, about)]
pub struct Args {
    /// Config file (.json or .toml); defaults to ~/.config/radiobox/config.toml
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Also log to stderr
    #[arg(long, short = 'f', global = true)]
    pub foreground: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daemon (default)
    Run,
    /// Print the input devices that readers and remotes can be bound to
    ListDevices,
    /// Print the shortcut table
    Shortcuts {
        /// Only shortcuts that point nowhere
        #[arg(long)]
        broken: bool,
        /// Only folders reachable from more than one id
        #[arg(long)]
        duplicates: bool,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let args = Args::parse_from(["radiobox"]);
        assert_eq!(args.command(), Command::Run);
        assert!(!args.foreground);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_shortcuts_flags() {
        let args = Args::parse_from(["radiobox", "shortcuts", "--broken", "-c", "/etc/radio.json"]);
        assert_eq!(
            args.command(),
            Command::Shortcuts {
                broken: true,
                duplicates: false
            }
        );
        assert_eq!(args.config, Some(PathBuf::from("/etc/radio.json")));
    }
}
