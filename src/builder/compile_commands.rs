//! Compile command databases.
//!
//! Each compilation persists the exact command used for each of its sources
//! as a JSON compilation database (`[{file, directory, arguments}]`) before
//! anything is compiled. Object rules replay those commands, so the
//! database and the objects can never disagree about flags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::distribution::Distribution;
use crate::core::errors::DeclarationError;
use crate::graph::{BuildGraph, BuildPath};
use crate::util::fs::{read_to_string, write_string};
use crate::util::lock;

/// One entry of a compilation database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileCommand {
    /// Absolute path of the source
    pub file: PathBuf,
    /// Working directory of the command
    pub directory: PathBuf,
    /// Full argv; `arguments[0]` is the compiler
    pub arguments: Vec<String>,
}

/// Commands of one compilation, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileCommandDb {
    commands: Vec<CompileCommand>,
}

impl CompileCommandDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the command for a file.
    pub fn insert(&mut self, cmd: CompileCommand) {
        match self.commands.iter_mut().find(|c| c.file == cmd.file) {
            Some(existing) => *existing = cmd,
            None => self.commands.push(cmd),
        }
    }

    pub fn get(&self, file: &Path) -> Option<&CompileCommand> {
        self.commands.iter().find(|c| c.file == file)
    }

    pub fn commands(&self) -> &[CompileCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.commands)?)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let commands: Vec<CompileCommand> = serde_json::from_str(json)?;
        let mut db = CompileCommandDb::new();
        for cmd in commands {
            db.insert(cmd);
        }
        Ok(db)
    }

    /// Write the whole database, replacing any previous file.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_string(path, &self.to_json()?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = read_to_string(path)?;
        CompileCommandDb::from_json(&json)
            .with_context(|| format!("'{}' is not a valid compilation database", path.display()))
    }
}

/// Parsed databases shared between the rules of one process.
///
/// Regenerating a database replaces its cached copy; object rules fall back
/// to reading the file when nothing is cached yet.
#[derive(Debug, Default)]
pub struct CompileCommandCache {
    dbs: Mutex<HashMap<PathBuf, Arc<CompileCommandDb>>>,
}

impl CompileCommandCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, path: &Path, db: CompileCommandDb) {
        lock(&self.dbs).insert(path.to_path_buf(), Arc::new(db));
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<CompileCommandDb>> {
        if let Some(db) = lock(&self.dbs).get(path) {
            return Ok(db.clone());
        }

        let db = Arc::new(CompileCommandDb::read(path)?);
        lock(&self.dbs).insert(path.to_path_buf(), db.clone());
        Ok(db)
    }
}

/// Register `compile_commands.json` at the build root, merging the
/// databases of every compilation of the given distributions.
pub fn add_compile_commands(
    graph: &Arc<BuildGraph>,
    dists: &[&Distribution],
) -> Result<BuildPath, DeclarationError> {
    let target = BuildPath::build("compile_commands.json");
    let mut components = Vec::new();

    for dist in dists {
        if !Arc::ptr_eq(dist.graph(), graph) {
            return Err(DeclarationError::ForeignGraph {
                dist: format!("{}/{}", dist.name(), dist.version()),
            });
        }
        components.extend(dist.compile_commands_components());
    }

    let out = target.clone();
    let parts = components.clone();
    graph.add_rule([target.clone()], components, move |args| {
        let mut merged = Vec::new();
        for part in &parts {
            let db = CompileCommandDb::read(&args.abs(part))?;
            merged.extend(db.commands().iter().cloned());
        }
        if merged.is_empty() {
            bail!("no compile commands to merge");
        }

        let json = serde_json::to_string_pretty(&merged)?;
        write_string(&args.abs(&out), &json)?;
        args.log(format!("merged {} compile commands", merged.len()));
        Ok(())
    })?;

    Ok(target)
}
