//! Incremental build graph.
//!
//! Rules map build-tree targets to prerequisites and an optional recipe.
//! `BuildGraph::update` brings a goal up to date by running every stale rule
//! reachable from it, in dependency order, with independent rules in
//! parallel.

mod path;
mod postreq;
mod update;

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use indicatif::ProgressBar;
use thiserror::Error;

use crate::util::lock;
use crate::util::process::ProcessBuilder;

pub use path::BuildPath;
pub use update::{RuleOutcome, RuleReport, UpdateReport};

/// A rule body. Runs when any target of its rule is stale.
pub type Recipe = Arc<dyn Fn(&mut RecipeArgs<'_>) -> Result<()> + Send + Sync>;

/// Errors raised while registering or ordering rules.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("rule target '{0}' is not in the build tree")]
    SourceTarget(BuildPath),

    #[error("target '{0}' already has a recipe")]
    RecipeConflict(BuildPath),

    #[error("targets '{0}' and '{1}' belong to different rules")]
    SplitRule(BuildPath, BuildPath),

    #[error("no rule to make target '{0}'")]
    NoRule(BuildPath),

    #[error("cycle in build graph involving '{0}'")]
    Cycle(BuildPath),
}

#[derive(Clone)]
struct Rule {
    targets: Vec<BuildPath>,
    prereqs: Vec<BuildPath>,
    recipe: Option<Recipe>,
    /// Recipe inputs that are not files
    fingerprint: Option<String>,
}

#[derive(Default)]
struct RuleTable {
    rules: Vec<Rule>,
    by_target: HashMap<BuildPath, usize>,
}

/// The set of rules for one source tree and build tree.
pub struct BuildGraph {
    src_root: PathBuf,
    build_root: PathBuf,
    table: Mutex<RuleTable>,
}

impl BuildGraph {
    /// Create an empty graph.
    pub fn new(src_root: impl Into<PathBuf>, build_root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(BuildGraph {
            src_root: src_root.into(),
            build_root: build_root.into(),
            table: Mutex::new(RuleTable::default()),
        })
    }

    pub fn src_root(&self) -> &Path {
        &self.src_root
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Resolve a graph path to an absolute filesystem path.
    pub fn abs(&self, path: &BuildPath) -> PathBuf {
        abs_in(&self.src_root, &self.build_root, path)
    }

    /// Register a rule with a recipe.
    ///
    /// Registering again for an existing target merges prerequisites. A
    /// target may only ever be given one recipe.
    pub fn add_rule<T, P, F>(&self, targets: T, prereqs: P, recipe: F) -> Result<(), GraphError>
    where
        T: IntoIterator<Item = BuildPath>,
        P: IntoIterator<Item = BuildPath>,
        F: Fn(&mut RecipeArgs<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.register(
            targets.into_iter().collect(),
            prereqs.into_iter().collect(),
            Some(Arc::new(recipe)),
        )
    }

    /// Add prerequisites to a target, creating an aggregate rule if the
    /// target has none yet.
    pub fn add_prereqs<P>(&self, target: BuildPath, prereqs: P) -> Result<(), GraphError>
    where
        P: IntoIterator<Item = BuildPath>,
    {
        self.register(vec![target], prereqs.into_iter().collect(), None)
    }

    /// Attach a fingerprint of the non-file inputs of the rule producing
    /// `target`, such as the flags its recipe passes to a tool.
    ///
    /// The rule is stale whenever the fingerprint differs from the one
    /// recorded when its recipe last succeeded.
    pub fn set_fingerprint(
        &self,
        target: &BuildPath,
        fingerprint: impl Into<String>,
    ) -> Result<(), GraphError> {
        let mut table = lock(&self.table);
        let RuleTable { rules, by_target } = &mut *table;
        let Some(&idx) = by_target.get(target) else {
            return Err(GraphError::NoRule(target.clone()));
        };
        rules[idx].fingerprint = Some(fingerprint.into());
        Ok(())
    }

    /// Whether any rule produces `target`.
    pub fn has_rule(&self, target: &BuildPath) -> bool {
        lock(&self.table).by_target.contains_key(target)
    }

    /// Prerequisites of the rule producing `target`.
    pub fn prereqs_of(&self, target: &BuildPath) -> Option<Vec<BuildPath>> {
        let table = lock(&self.table);
        let idx = *table.by_target.get(target)?;
        Some(table.rules[idx].prereqs.clone())
    }

    /// Bring `goal` up to date.
    ///
    /// Step failures are recorded in the report rather than returned as
    /// errors; see `UpdateReport::into_result`.
    pub fn update(&self, goal: &BuildPath) -> Result<UpdateReport> {
        self.update_with_progress(goal, &ProgressBar::hidden())
    }

    /// Bring `goal` up to date, advancing `progress` once per rule.
    pub fn update_with_progress(
        &self,
        goal: &BuildPath,
        progress: &ProgressBar,
    ) -> Result<UpdateReport> {
        update::run(self, goal, progress)
    }

    fn register(
        &self,
        targets: Vec<BuildPath>,
        prereqs: Vec<BuildPath>,
        recipe: Option<Recipe>,
    ) -> Result<(), GraphError> {
        if let Some(t) = targets.iter().find(|t| !t.is_build()) {
            return Err(GraphError::SourceTarget(t.clone()));
        }
        let Some(first) = targets.first().cloned() else {
            return Ok(());
        };

        let mut table = lock(&self.table);
        let RuleTable { rules, by_target } = &mut *table;

        let mut existing: Option<usize> = None;
        for t in &targets {
            if let Some(&idx) = by_target.get(t) {
                match existing {
                    Some(other) if other != idx => {
                        return Err(GraphError::SplitRule(
                            rules[other].targets[0].clone(),
                            t.clone(),
                        ));
                    }
                    _ => existing = Some(idx),
                }
            }
        }

        let idx = match existing {
            Some(idx) => {
                if recipe.is_some() && rules[idx].recipe.is_some() {
                    return Err(GraphError::RecipeConflict(first));
                }
                idx
            }
            None => {
                rules.push(Rule {
                    targets: Vec::new(),
                    prereqs: Vec::new(),
                    recipe: None,
                    fingerprint: None,
                });
                rules.len() - 1
            }
        };

        let rule = &mut rules[idx];
        if recipe.is_some() {
            rule.recipe = recipe;
        }
        for p in prereqs {
            if !rule.prereqs.contains(&p) {
                rule.prereqs.push(p);
            }
        }
        for t in targets {
            if !rule.targets.contains(&t) {
                rule.targets.push(t.clone());
            }
            by_target.insert(t, idx);
        }

        tracing::trace!("registered rule for {}", first);
        Ok(())
    }

    fn snapshot(&self) -> (Vec<Rule>, HashMap<BuildPath, usize>) {
        let table = lock(&self.table);
        (table.rules.clone(), table.by_target.clone())
    }

    fn postreq_db_path(&self) -> PathBuf {
        self.build_root.join(".slipway").join("postreqs.json")
    }
}

fn abs_in(src_root: &Path, build_root: &Path, path: &BuildPath) -> PathBuf {
    match path {
        BuildPath::Src(p) => src_root.join(p),
        BuildPath::Build(p) => build_root.join(p),
    }
}

/// Helpers handed to a running recipe.
pub struct RecipeArgs<'a> {
    src_root: &'a Path,
    build_root: &'a Path,
    targets: &'a [BuildPath],
    postreqs: Vec<PathBuf>,
    log: String,
}

impl<'a> RecipeArgs<'a> {
    fn new(graph: &'a BuildGraph, targets: &'a [BuildPath]) -> Self {
        RecipeArgs {
            src_root: &graph.src_root,
            build_root: &graph.build_root,
            targets,
            postreqs: Vec::new(),
            log: String::new(),
        }
    }

    pub fn src_root(&self) -> &Path {
        self.src_root
    }

    pub fn build_root(&self) -> &Path {
        self.build_root
    }

    /// Targets of the running rule.
    pub fn targets(&self) -> &[BuildPath] {
        self.targets
    }

    /// Resolve a graph path to an absolute filesystem path.
    pub fn abs(&self, path: &BuildPath) -> PathBuf {
        abs_in(self.src_root, self.build_root, path)
    }

    pub fn abs_all<'p, I>(&self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'p BuildPath>,
    {
        paths.into_iter().map(|p| self.abs(p)).collect()
    }

    /// Record a prerequisite discovered while running.
    ///
    /// Relative paths are taken relative to the source root, which is the
    /// working directory of spawned commands.
    pub fn add_postreq(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let abs = if path.is_relative() {
            self.src_root.join(path)
        } else {
            path.to_path_buf()
        };
        if !self.postreqs.contains(&abs) {
            self.postreqs.push(abs);
        }
    }

    /// Append a line to the step log.
    pub fn log(&mut self, msg: impl AsRef<str>) {
        self.log.push_str(msg.as_ref());
        if !self.log.ends_with('\n') {
            self.log.push('\n');
        }
    }

    /// Run a program from the source root, capturing its output into the
    /// step log. A nonzero exit fails the step.
    pub fn spawn<I, S>(&mut self, program: impl AsRef<Path>, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.spawn_command(ProcessBuilder::new(program).args(args))
    }

    /// Run a prepared command, capturing its output into the step log.
    pub fn spawn_command(&mut self, cmd: ProcessBuilder) -> Result<Output> {
        let cmd = match cmd.get_cwd() {
            Some(_) => cmd,
            None => cmd.cwd(self.src_root),
        };

        self.log(cmd.display_command());
        let output = cmd.exec()?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            self.log(&stdout);
        }
        if !stderr.is_empty() {
            self.log(&stderr);
        }

        if !output.status.success() {
            bail!(
                "`{}` exited with code {:?}",
                cmd.program().display(),
                output.status.code()
            );
        }
        Ok(output)
    }

    fn finish(self) -> (Vec<PathBuf>, String) {
        (self.postreqs, self.log)
    }
}
