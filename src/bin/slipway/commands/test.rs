//! `slipway test` command

use anyhow::Result;

use super::Project;
use crate::cli::{DirArgs, TestArgs};

pub fn execute(args: TestArgs, dirs: &DirArgs, verbose: bool) -> Result<()> {
    let project = Project::load(dirs)?;

    for dist in project.select(&args.dists)? {
        tracing::info!("testing {} {}", dist.name(), dist.version());
        project.update(dist.test(), verbose)?;
    }
    Ok(())
}
