//! `slipway compile-commands` command

use anyhow::Result;

use super::Project;
use crate::cli::DirArgs;
use slipway::add_compile_commands;

pub fn execute(dirs: &DirArgs, verbose: bool) -> Result<()> {
    let project = Project::load(dirs)?;

    let dists: Vec<_> = project.dists.iter().collect();
    let db = add_compile_commands(&project.graph, &dists)?;
    project.update(&db, verbose)?;

    eprintln!("       Wrote {}", project.graph.abs(&db).display());
    Ok(())
}
