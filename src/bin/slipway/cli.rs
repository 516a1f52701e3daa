//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Slipway - build, test and export C/C++ distributions
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub dirs: DirArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Source and build tree locations.
#[derive(Args)]
pub struct DirArgs {
    /// Source root containing Slipway.toml
    #[arg(long, global = true, default_value = ".", env = "SLIPWAY_SRC_DIR")]
    pub src_dir: PathBuf,

    /// Build root, relative to the current directory
    #[arg(long, global = true, default_value = "build", env = "SLIPWAY_BUILD_DIR")]
    pub build_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build every distributed target, or one target of the build tree
    Build(BuildArgs),

    /// Build and run tests
    Test(TestArgs),

    /// Export distributions as source archives
    Dist(DistArgs),

    /// Write compile_commands.json for every distribution
    CompileCommands,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Target path relative to the build root (e.g. `math/libadd.a`)
    pub target: Option<PathBuf>,
}

#[derive(Args)]
pub struct TestArgs {
    /// Only test these distributions
    pub dists: Vec<String>,
}

#[derive(Args)]
pub struct DistArgs {
    /// Only export these distributions
    pub dists: Vec<String>,
}
