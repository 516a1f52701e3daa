//! Command implementations

pub mod build;
pub mod compile_commands;
pub mod dist;
pub mod test;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::DirArgs;
use slipway::manifest::{BuildFile, BUILD_FILE_NAME};
use slipway::util::config::CONFIG_FILE_NAME;
use slipway::{BuildGraph, BuildPath, Config, Distribution};

/// A declared build description.
pub struct Project {
    pub graph: Arc<BuildGraph>,
    pub dists: Vec<Distribution>,
}

impl Project {
    /// Read `Slipway.toml` and `slipway.config.json` from the source root and
    /// declare every distribution.
    pub fn load(dirs: &DirArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let src_root = absolute(&cwd, &dirs.src_dir);
        let build_root = absolute(&cwd, &dirs.build_dir);

        let build_file = src_root.join(BUILD_FILE_NAME);
        if !build_file.exists() {
            bail!(
                "could not find `{}` in `{}`",
                BUILD_FILE_NAME,
                src_root.display()
            );
        }

        let config = Config::load_or_default(&src_root.join(CONFIG_FILE_NAME))?;
        let file = BuildFile::load(&build_file)?;

        let graph = BuildGraph::new(src_root, build_root);
        let dists = file.declare(&graph, &config)?;
        tracing::debug!("declared {} distribution(s)", dists.len());

        Ok(Project { graph, dists })
    }

    /// Distributions with the given names, or all of them.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Distribution>> {
        if let Some(unknown) = names
            .iter()
            .find(|n| !self.dists.iter().any(|d| d.name() == n.as_str()))
        {
            bail!("no distribution named `{}`", unknown);
        }
        Ok(self
            .dists
            .iter()
            .filter(|d| names.is_empty() || names.iter().any(|n| n == d.name()))
            .collect())
    }

    /// Bring `goal` up to date, showing progress unless verbose.
    pub fn update(&self, goal: &BuildPath, verbose: bool) -> Result<()> {
        let start = Instant::now();

        let pb = if verbose {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_message(goal.to_string());
            pb
        };

        let report = self.graph.update_with_progress(goal, &pb);
        pb.finish_and_clear();
        let report = report?.into_result()?;

        if verbose {
            for rule in report.rules() {
                for line in rule.log.lines() {
                    eprintln!("  {}", line);
                }
            }
        }

        eprintln!(
            "    Finished `{}` ({} rule(s)) in {:.2}s",
            goal,
            report.rules().len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn absolute(cwd: &std::path::Path, path: &std::path::Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
