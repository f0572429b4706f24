use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sipbag_crypto::DigestAlgorithm;

#[derive(Parser)]
#[command(
    name = "sipbag",
    about = "Move repository hierarchies between instances as SIP bags",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Scratch directory holding the manifest and packages
    #[arg(long, global = true)]
    pub scratch: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Flatten a repository scope into a manifest and build its packages
    Export(ExportArgs),
    /// Upload the packages in scratch to a target, parents first
    Import(ImportArgs),
    /// Show the manifest with the parent rebuilt for every entry
    Replay(ReplayArgs),
    /// Check package digests against their manifests
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct ExportArgs {
    /// JSON dump of the source repository
    #[arg(short, long)]
    pub source: PathBuf,
    /// `all`, or the identifier of a community or collection
    #[arg(short, long, default_value = "all")]
    pub identifier: String,
    /// Drop fields the target repository re-creates on ingest
    #[arg(long)]
    pub migrate: bool,
    #[arg(long)]
    pub algorithm: Option<DigestAlgorithm>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Base locator of the target repository
    #[arg(short, long)]
    pub target: String,
    /// Directory receiving the delivered packages
    #[arg(long)]
    pub drop_dir: PathBuf,
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Also print the locator each package would be sent to
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Package directories; every bag in scratch when empty
    pub bags: Vec<PathBuf>,
}
