//! Distribution export.
//!
//! The `dist` rule of a distribution stages a self-contained source tree
//! under `<buildRoot>/<name>-<version>/`:
//! - every distributed source file and the license
//! - the public headers of every distributed target, merged into `include/`
//! - a generated `CMakeLists.txt`
//! - POSIX and MSVC `.pc` files and a CMake package config per library
//!
//! and packs it into `<name>-<version>.tgz`. Any inconsistency in the
//! declarations fails the whole export before anything is archived.

pub mod archive;
pub mod cmake;
pub mod pc;

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use thiserror::Error;

use crate::core::dependency::accumulated_packages;
use crate::core::distribution::Declarations;
use crate::core::library::{Library, LinkedCompilation};
use crate::core::source::{CStandard, CxxStandard};
use crate::graph::{BuildGraph, BuildPath, GraphError, RecipeArgs};
use crate::util::fs::{copy_file, list_files_relative, remove_dir_all_if_exists, write_string};
use crate::util::lock;

use self::cmake::{merge_packages, render_package_config, CMakeLists, ManifestTarget};
use self::pc::PcFile;

/// Inconsistent declarations found while exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(
        "`{compilation}` depends on a package without an export descriptor (local key `{local_key}`)"
    )]
    MissingExportDescriptor {
        compilation: String,
        local_key: String,
    },

    #[error("include file '{}' is provided by both `{first}` and `{second}`", path.display())]
    IncludeCollision {
        path: PathBuf,
        first: String,
        second: String,
    },
}

/// Identity of the distribution being exported.
#[derive(Debug, Clone)]
pub(crate) struct ExportContext {
    pub name: String,
    pub version: String,
    pub c_std: Option<CStandard>,
    pub cxx_std: Option<CxxStandard>,
    pub archive: BuildPath,
}

impl ExportContext {
    fn dir_name(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// Register the archive rule. Prerequisites are added as targets are
/// declared; the recipe reads whatever was declared when it runs.
pub(crate) fn register(
    graph: &BuildGraph,
    ctx: ExportContext,
    decls: Arc<Mutex<Declarations>>,
) -> Result<(), GraphError> {
    let target = ctx.archive.clone();
    graph.add_rule([target], Vec::new(), move |args| {
        let snapshot = lock(&decls).clone();
        export(args, &ctx, &snapshot)
    })
}

fn export(args: &mut RecipeArgs<'_>, ctx: &ExportContext, decls: &Declarations) -> Result<()> {
    let stage = BuildPath::build(ctx.dir_name());
    let stage_abs = args.abs(&stage);
    remove_dir_all_if_exists(&stage_abs)?;

    for (src, rel) in &decls.files {
        args.log(format!("copy {} -> {}", src, rel.display()));
        copy_file(&args.abs(src), &stage_abs.join(rel))?;
    }

    let exes: Vec<&LinkedCompilation> =
        decls.executables.iter().filter(|c| !c.dev_only).collect();
    let libs: Vec<&Library> = decls
        .libraries
        .iter()
        .filter(|l| !l.compilation().dev_only)
        .collect();

    let mut targets: Vec<&LinkedCompilation> = exes.clone();
    targets.extend(libs.iter().map(|l| l.compilation()));
    let packages = merge_packages(&targets)?;

    let with_includes = copy_includes(args, &targets, &stage)?;

    for lib in &libs {
        let c = lib.compilation();
        let pc = PcFile {
            name: c.name.clone(),
            version: ctx.version.clone(),
            lib_type: lib.lib_type(),
            requires: pc_requires(c),
        };
        write_string(
            &stage_abs.join("pkgconfig").join(format!("{}.pc", c.name)),
            &pc.render_posix(),
        )?;
        write_string(
            &stage_abs.join("pkgconfig/msvc").join(format!("{}.pc", c.name)),
            &pc.render_msvc(),
        )?;
        write_string(
            &stage_abs.join("cmake").join(format!("{}-config.cmake.in", c.name)),
            &render_package_config(c),
        )?;
    }

    let lists = CMakeLists {
        name: &ctx.name,
        version: &ctx.version,
        c_std: ctx.c_std,
        cxx_std: ctx.cxx_std,
        packages: &packages,
        executables: exes
            .iter()
            .map(|c| manifest_target(c, decls, &with_includes))
            .collect(),
        libraries: libs
            .iter()
            .map(|l| manifest_target(l.compilation(), decls, &with_includes))
            .collect(),
    };
    write_string(&stage_abs.join("CMakeLists.txt"), &lists.render())?;
    args.log(format!("wrote {}", stage.join("CMakeLists.txt")));

    let archive = args.abs(&ctx.archive);
    archive::write_tgz(args.build_root(), &ctx.dir_name(), &archive)?;
    args.log(format!("packed {}", ctx.archive));

    tracing::info!("exported {} to {}", ctx.dir_name(), archive.display());
    Ok(())
}

fn manifest_target<'a>(
    c: &'a LinkedCompilation,
    decls: &Declarations,
    with_includes: &HashSet<String>,
) -> ManifestTarget<'a> {
    ManifestTarget {
        compilation: c,
        installed: decls.installed.contains(&c.name),
        has_includes: with_includes.contains(&c.name),
    }
}

/// Copy every target's own include directories into `include/`.
///
/// Returns the names of targets that had at least one existing include
/// directory. Two different files claiming one destination is an error.
fn copy_includes(
    args: &mut RecipeArgs<'_>,
    targets: &[&LinkedCompilation],
    stage: &BuildPath,
) -> Result<HashSet<String>> {
    let dest = args.abs(&stage.join("include"));
    let mut claimed: BTreeMap<PathBuf, (String, PathBuf)> = BTreeMap::new();
    let mut with_includes = HashSet::new();

    for c in targets {
        for dir in &c.include_dirs {
            let abs = args.abs(dir);
            if !abs.is_dir() {
                tracing::debug!("skipping missing include directory {}", dir);
                continue;
            }
            with_includes.insert(c.name.clone());
            args.log(format!("copy {} -> {}", dir, stage.join("include")));

            for (rel, file) in list_files_relative(&abs)? {
                if let Some((owner, existing)) = claimed.get(&rel) {
                    if *existing == file {
                        continue;
                    }
                    return Err(ExportError::IncludeCollision {
                        path: rel,
                        first: owner.clone(),
                        second: c.name.clone(),
                    }
                    .into());
                }
                copy_file(&file, &dest.join(&rel))?;
                claimed.insert(rel, (c.name.clone(), file));
            }
        }
    }

    Ok(with_includes)
}

/// pkg-config names an exported library depends on: the external
/// packages accumulated over its link closure, then every library it links
/// directly. Linked libraries ship their own `.pc` files, which carry their
/// dependencies in turn.
fn pc_requires(c: &LinkedCompilation) -> Vec<String> {
    let mut requires: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !requires.contains(&name) {
            requires.push(name);
        }
    };

    for r in accumulated_packages(c)
        .into_iter()
        .filter(|r| !r.cross_distribution)
    {
        if let Some(name) = r
            .local_key
            .or_else(|| r.export.map(|e| e.package_name))
        {
            push(name);
        }
    }
    for lib in &c.link_to {
        push(lib.name().to_string());
    }
    requires
}
