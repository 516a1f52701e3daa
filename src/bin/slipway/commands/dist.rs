//! `slipway dist` command

use anyhow::Result;

use super::Project;
use crate::cli::{DirArgs, DistArgs};

pub fn execute(args: DistArgs, dirs: &DirArgs, verbose: bool) -> Result<()> {
    let project = Project::load(dirs)?;

    for dist in project.select(&args.dists)? {
        project.update(dist.dist_alias(), verbose)?;
        eprintln!(
            "    Packaged {}",
            project.graph.abs(dist.dist()).display()
        );
    }
    Ok(())
}
