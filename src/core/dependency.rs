//! Closures over the library graph.
//!
//! Every function here only reads library handles. Library handles are
//! immutable once created, so the closures of a compilation never change
//! after it is declared.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::core::errors::DeclarationError;
use crate::core::library::{Library, LinkedCompilation};
use crate::core::package::PackageReference;
use crate::graph::BuildPath;

/// All libraries linked directly or transitively, dependencies before
/// dependents, each exactly once.
pub fn transitive_libraries(c: &LinkedCompilation) -> Vec<Library> {
    let mut out = Vec::new();
    let mut seen = Vec::new();
    for lib in &c.link_to {
        visit(lib, &mut seen, &mut out);
    }
    out
}

fn visit(lib: &Library, seen: &mut Vec<Library>, out: &mut Vec<Library>) {
    if seen.iter().any(|s| s.ptr_eq(lib)) {
        return;
    }
    seen.push(lib.clone());
    for dep in lib.linked_libraries() {
        visit(dep, seen, out);
    }
    out.push(lib.clone());
}

/// Binary paths of `transitive_libraries`, in the same order.
pub fn transitive_link_artifacts(c: &LinkedCompilation) -> Vec<BuildPath> {
    transitive_libraries(c)
        .iter()
        .map(|l| l.binary().clone())
        .collect()
}

/// The compilation's own include directories followed by the public
/// include directories of every library it links, directly or not.
///
/// Private include directories never propagate.
pub fn all_include_dirs(c: &LinkedCompilation) -> Vec<BuildPath> {
    let mut dirs: Vec<BuildPath> = Vec::new();
    let mut push = |d: &BuildPath| {
        if !dirs.contains(d) {
            dirs.push(d.clone());
        }
    };

    for d in &c.include_dirs {
        push(d);
    }
    for lib in transitive_libraries(c) {
        for d in lib.includes() {
            push(d);
        }
    }
    dirs
}

/// Package references of the compilation and of every library it links.
///
/// Static libraries leave their package obligations to the final link, so
/// the closure includes inherited references.
pub fn accumulated_packages(c: &LinkedCompilation) -> Vec<PackageReference> {
    let mut refs: Vec<PackageReference> = Vec::new();
    let own = c.packages.iter();
    let libs = transitive_libraries(c);
    let inherited = libs.iter().flat_map(|l| l.compilation().packages.iter());

    for r in own.chain(inherited) {
        if !refs.contains(r) {
            refs.push(r.clone());
        }
    }
    refs
}

/// Local lookup keys of `accumulated_packages`.
///
/// Cross-distribution references are linked through their library and
/// need no key. Any other reference without a key cannot be queried.
pub fn accumulated_package_keys(c: &LinkedCompilation) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Vec::new();
    for r in accumulated_packages(c) {
        if r.cross_distribution {
            continue;
        }
        let Some(key) = r.local_key else {
            bail!(
                "`{}` is linked to a package without a local lookup key (export name `{}`)",
                c.name,
                r.display_name()
            );
        };
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Reject a new library whose link closure already contains a library of
/// the same distribution and name.
pub fn check_acyclic(
    dist_name: &str,
    name: &str,
    link_to: &[Library],
) -> Result<(), DeclarationError> {
    let key = format!("{}/{}", dist_name, name);
    let mut path = vec![key.clone()];
    let mut visited = HashSet::new();

    for lib in link_to {
        if find_path(lib, &key, &mut path, &mut visited) {
            path.push(key);
            return Err(DeclarationError::Cycle { path });
        }
    }
    Ok(())
}

fn find_path(
    lib: &Library,
    key: &str,
    path: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> bool {
    let qualified = lib.qualified_name();
    if qualified == key {
        return true;
    }
    if !visited.insert(qualified.clone()) {
        return false;
    }

    path.push(qualified);
    for dep in lib.linked_libraries() {
        if find_path(dep, key, path, visited) {
            return true;
        }
    }
    path.pop();
    false
}
