//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use burrow::Verb;

/// Burrow - a dependency-graph build orchestrator for native projects
#[derive(Parser)]
#[command(name = "burrow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build everything that changed
    Build(RunArgs),

    /// Pull source changes of git dependencies, then build
    Update(RunArgs),

    /// Clean the target's build directory
    Clean(RunArgs),

    /// Clean and build the target
    Rebuild(RunArgs),

    /// Build and deploy the target's package
    Deploy(RunArgs),

    /// Build, deploy and upload the target's package to the remote cache
    Upload(RunArgs),

    /// Load the graph and print every node with its build decision
    List(RunArgs),

    /// Wipe and re-clone the target, then build
    Wipe(RunArgs),
}

impl Commands {
    pub fn verb(&self) -> Verb {
        match self {
            Commands::Build(_) => Verb::Build,
            Commands::Update(_) => Verb::Update,
            Commands::Clean(_) => Verb::Clean,
            Commands::Rebuild(_) => Verb::Rebuild,
            Commands::Deploy(_) => Verb::Deploy,
            Commands::Upload(_) => Verb::Upload,
            Commands::List(_) => Verb::List,
            Commands::Wipe(_) => Verb::Wipe,
        }
    }

    pub fn args(&self) -> &RunArgs {
        match self {
            Commands::Build(a)
            | Commands::Update(a)
            | Commands::Clean(a)
            | Commands::Rebuild(a)
            | Commands::Deploy(a)
            | Commands::Upload(a)
            | Commands::List(a)
            | Commands::Wipe(a) => a,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Node to act on: `target=<name>`, `<name>`, or `all`
    #[arg(value_parser = parse_target)]
    pub target: Option<String>,

    /// Build release binaries
    #[arg(long, conflicts_with = "debug")]
    pub release: bool,

    /// Build debug binaries
    #[arg(long)]
    pub debug: bool,

    /// Number of threads used to load dependencies
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Load dependencies in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Remote package cache (http(s) url, file:// url or directory)
    #[arg(long, env = "BURROW_REMOTE")]
    pub remote: Option<String>,

    /// Never consult the remote cache
    #[arg(long, conflicts_with = "force_remote")]
    pub no_remote: bool,

    /// Fail if the target's package is not in the remote cache
    #[arg(long)]
    pub force_remote: bool,

    /// Skip the upload if the remote already has the package
    #[arg(long)]
    pub if_needed: bool,

    /// Directory under which dependency workspaces are created
    #[arg(long)]
    pub workspaces_root: Option<PathBuf>,
}

fn parse_target(s: &str) -> Result<String, String> {
    let name = s.strip_prefix("target=").unwrap_or(s);
    if name.is_empty() {
        return Err("target name must not be empty".to_string());
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_forms() {
        let cli = Cli::parse_from(["burrow", "build", "target=zlib"]);
        assert_eq!(cli.command.args().target.as_deref(), Some("zlib"));

        let cli = Cli::parse_from(["burrow", "update", "all", "--parallel"]);
        assert_eq!(cli.command.verb(), Verb::Update);
        assert_eq!(cli.command.args().target.as_deref(), Some("all"));
        assert!(cli.command.args().parallel);

        assert!(Cli::try_parse_from(["burrow", "build", "target="]).is_err());
        assert!(Cli::try_parse_from(["burrow", "build", "--release", "--debug"]).is_err());
    }
}
