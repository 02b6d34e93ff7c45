use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spacemon")]
#[command(about = "Tracks directory sizes and free disk space between runs")]
#[command(version)]
pub struct Cli {
    /// Alternate config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Show detailed output including debug logging
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List saved generations
    History,
}

#[derive(Args)]
pub struct RunArgs {
    /// Repeat the last report from saved snapshots without scanning
    #[arg(long, alias = "replast", default_value_t = false)]
    pub replay: bool,

    /// Compare against an older generation (0 = most recent)
    #[arg(long, default_value_t = 0)]
    pub steps_back: usize,

    /// Report only, do not save snapshots or prune old ones
    #[arg(long, default_value_t = false)]
    pub no_save: bool,

    /// Keep running, repeating the scan every `daemon_interval`
    #[arg(long, default_value_t = false, conflicts_with = "replay")]
    pub daemon: bool,

    /// Output as JSON instead of table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_a_normal_scan() {
        let cli = Cli::try_parse_from(["spacemon"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.run.replay && !cli.run.no_save && !cli.run.daemon);
        assert_eq!(cli.run.steps_back, 0);
    }

    #[test]
    fn replast_alias_is_accepted() {
        let cli = Cli::try_parse_from(["spacemon", "--replast", "--steps-back", "2"]).unwrap();
        assert!(cli.run.replay);
        assert_eq!(cli.run.steps_back, 2);
    }

    #[test]
    fn daemon_conflicts_with_replay() {
        assert!(Cli::try_parse_from(["spacemon", "--daemon", "--replay"]).is_err());
    }

    #[test]
    fn history_accepts_global_config() {
        let cli = Cli::try_parse_from(["spacemon", "history", "--config", "/tmp/c.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Command::History)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
