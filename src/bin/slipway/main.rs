//! Slipway CLI - build, test and export C/C++ distributions

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let Cli {
        verbose,
        dirs,
        command,
    } = cli;

    match command {
        Commands::Build(args) => commands::build::execute(args, &dirs, verbose),
        Commands::Test(args) => commands::test::execute(args, &dirs, verbose),
        Commands::Dist(args) => commands::dist::execute(args, &dirs, verbose),
        Commands::CompileCommands => commands::compile_commands::execute(&dirs, verbose),
    }
}
