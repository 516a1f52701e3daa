//! `slipway build` command

use anyhow::Result;

use super::Project;
use crate::cli::{BuildArgs, DirArgs};
use slipway::BuildPath;

pub fn execute(args: BuildArgs, dirs: &DirArgs, verbose: bool) -> Result<()> {
    let project = Project::load(dirs)?;

    let goal = match args.target {
        Some(target) => BuildPath::build(target),
        None => {
            // Every distributed binary, without exporting.
            let goal = BuildPath::build(".slipway/all");
            let mut binaries = Vec::new();
            for dist in &project.dists {
                let prereqs = project.graph.prereqs_of(dist.dist()).unwrap_or_default();
                binaries.extend(prereqs.into_iter().filter(BuildPath::is_build));
            }
            project.graph.add_prereqs(goal.clone(), binaries)?;
            goal
        }
    };

    project.update(&goal, verbose)
}
