//! Staleness checks and rule execution.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::Direction;
use rayon::prelude::*;

use super::postreq::PostreqDb;
use super::{BuildGraph, BuildPath, GraphError, RecipeArgs, Rule};
use crate::util::fs::{ensure_dir, to_slash};

/// What happened to a rule during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Nothing to do
    UpToDate,
    /// The recipe ran successfully, or an aggregate saw a rebuilt prerequisite
    Rebuilt,
    /// The recipe failed or a source prerequisite is missing
    Failed,
    /// Not attempted because a prerequisite failed
    Skipped,
}

/// Outcome and step log of one rule.
#[derive(Debug, Clone)]
pub struct RuleReport {
    pub targets: Vec<BuildPath>,
    pub outcome: RuleOutcome,
    pub log: String,
}

/// Result of `BuildGraph::update`.
#[derive(Debug)]
pub struct UpdateReport {
    goal: BuildPath,
    rules: Vec<RuleReport>,
}

impl UpdateReport {
    pub fn goal(&self) -> &BuildPath {
        &self.goal
    }

    /// Every rule considered, in execution order.
    pub fn rules(&self) -> &[RuleReport] {
        &self.rules
    }

    /// True when no rule failed or was skipped.
    pub fn success(&self) -> bool {
        self.rules
            .iter()
            .all(|r| matches!(r.outcome, RuleOutcome::UpToDate | RuleOutcome::Rebuilt))
    }

    /// Rules whose own step failed.
    pub fn failures(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules
            .iter()
            .filter(|r| r.outcome == RuleOutcome::Failed)
    }

    /// Outcome of the rule producing `target`.
    pub fn outcome_of(&self, target: &BuildPath) -> Option<RuleOutcome> {
        self.rules
            .iter()
            .find(|r| r.targets.contains(target))
            .map(|r| r.outcome)
    }

    /// Whether the rule producing `target` ran in this update.
    pub fn was_rebuilt(&self, target: &BuildPath) -> bool {
        self.outcome_of(target) == Some(RuleOutcome::Rebuilt)
    }

    /// Turn step failures into an error carrying each failed step's log.
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        let mut msg = format!("failed to update '{}'", self.goal);
        for failure in self.failures() {
            let target = failure
                .targets
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            msg.push_str(&format!("\n\n{}:\n{}", target, failure.log.trim_end()));
        }
        Err(anyhow!(msg))
    }
}

struct StepResult {
    outcome: RuleOutcome,
    log: String,
    postreqs: Option<Vec<PathBuf>>,
}

impl StepResult {
    fn done(outcome: RuleOutcome) -> Self {
        StepResult {
            outcome,
            log: String::new(),
            postreqs: None,
        }
    }

    fn not_run(outcome: RuleOutcome, log: String) -> Self {
        StepResult {
            outcome,
            log,
            postreqs: None,
        }
    }
}

pub(super) fn run(graph: &BuildGraph, goal: &BuildPath, progress: &ProgressBar) -> Result<UpdateReport> {
    let (rules, by_target) = graph.snapshot();

    let Some(&root) = by_target.get(goal) else {
        if !goal.is_build() && graph.abs(goal).exists() {
            return Ok(UpdateReport {
                goal: goal.clone(),
                rules: Vec::new(),
            });
        }
        return Err(GraphError::NoRule(goal.clone()).into());
    };

    let waves = schedule(&rules, &by_target, root)?;
    let total: usize = waves.iter().map(Vec::len).sum();
    progress.set_length(total as u64);
    tracing::debug!("updating {} ({} rules)", goal, total);

    let db_path = graph.postreq_db_path();
    let mut db = PostreqDb::load(&db_path);
    let mut db_dirty = false;

    let mut outcomes: HashMap<usize, RuleOutcome> = HashMap::new();
    let mut reports = Vec::with_capacity(total);

    for wave in waves {
        let results: Vec<(usize, StepResult)> = wave
            .par_iter()
            .map(|&idx| {
                let rule = &rules[idx];
                (idx, run_rule(graph, rule, &by_target, &outcomes, &db))
            })
            .collect();

        for (idx, result) in results {
            let rule = &rules[idx];
            progress.inc(1);

            match result.outcome {
                RuleOutcome::Failed => tracing::debug!("failed: {}", rule.targets[0]),
                RuleOutcome::Rebuilt if rule.recipe.is_some() => {
                    tracing::debug!("built: {}", rule.targets[0])
                }
                _ => {}
            }

            if let Some(postreqs) = result.postreqs {
                db.set(rule_key(rule), postreqs);
                db.set_fingerprint(rule_key(rule), rule.fingerprint.clone());
                db_dirty = true;
            }

            outcomes.insert(idx, result.outcome);
            reports.push(RuleReport {
                targets: rule.targets.clone(),
                outcome: result.outcome,
                log: result.log,
            });
        }
    }

    if db_dirty {
        db.save(&db_path)?;
    }

    Ok(UpdateReport {
        goal: goal.clone(),
        rules: reports,
    })
}

/// Group the rules reachable from `root` into waves; every rule's
/// prerequisites are produced in earlier waves.
fn schedule(
    rules: &[Rule],
    by_target: &HashMap<BuildPath, usize>,
    root: usize,
) -> Result<Vec<Vec<usize>>, GraphError> {
    let mut reachable = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if !seen.insert(idx) {
            continue;
        }
        reachable.push(idx);
        for p in &rules[idx].prereqs {
            if let Some(&dep) = by_target.get(p) {
                stack.push(dep);
            }
        }
    }

    let mut dag = DiGraph::<usize, ()>::new();
    let mut nodes = HashMap::new();
    for &idx in &reachable {
        nodes.insert(idx, dag.add_node(idx));
    }
    for &idx in &reachable {
        for p in &rules[idx].prereqs {
            if let Some(dep) = by_target.get(p) {
                dag.add_edge(nodes[dep], nodes[&idx], ());
            }
        }
    }

    let order = toposort(&dag, None)
        .map_err(|cycle| GraphError::Cycle(rules[dag[cycle.node_id()]].targets[0].clone()))?;

    let mut depth: HashMap<usize, usize> = HashMap::new();
    let mut waves: Vec<Vec<usize>> = Vec::new();
    for node in order {
        let d = dag
            .neighbors_directed(node, Direction::Incoming)
            .map(|pred| depth[&dag[pred]] + 1)
            .max()
            .unwrap_or(0);
        let idx = dag[node];
        depth.insert(idx, d);
        if waves.len() <= d {
            waves.resize_with(d + 1, Vec::new);
        }
        waves[d].push(idx);
    }

    Ok(waves)
}

fn run_rule(
    graph: &BuildGraph,
    rule: &Rule,
    by_target: &HashMap<BuildPath, usize>,
    outcomes: &HashMap<usize, RuleOutcome>,
    db: &PostreqDb,
) -> StepResult {
    let oldest = oldest_target(graph, rule);
    let mut stale = oldest.is_none();
    let mut prereq_rebuilt = false;

    for p in &rule.prereqs {
        let producer = by_target.get(p);
        match producer.and_then(|idx| outcomes.get(idx)) {
            Some(RuleOutcome::Failed) | Some(RuleOutcome::Skipped) => {
                return StepResult::not_run(
                    RuleOutcome::Skipped,
                    format!("prerequisite '{}' failed\n", p),
                );
            }
            Some(RuleOutcome::Rebuilt) => {
                prereq_rebuilt = true;
                stale = true;
            }
            _ => match mtime(&graph.abs(p)) {
                Some(t) => {
                    if oldest.is_some_and(|o| t > o) {
                        stale = true;
                    }
                }
                None if producer.is_some() => {}
                None => {
                    return StepResult::not_run(
                        RuleOutcome::Failed,
                        format!("missing prerequisite '{}'\n", p),
                    );
                }
            },
        }
    }

    let Some(recipe) = rule.recipe.clone() else {
        return StepResult::done(if prereq_rebuilt {
            RuleOutcome::Rebuilt
        } else {
            RuleOutcome::UpToDate
        });
    };

    if !stale {
        stale = db.get(&rule_key(rule)).iter().any(|post| match mtime(post) {
            None => true,
            Some(t) => oldest.is_some_and(|o| t > o),
        });
    }
    if !stale {
        if let Some(fingerprint) = &rule.fingerprint {
            stale = db.fingerprint(&rule_key(rule)) != Some(fingerprint.as_str());
            if stale {
                tracing::debug!("inputs of {} changed", rule.targets[0]);
            }
        }
    }
    if !stale {
        return StepResult::done(RuleOutcome::UpToDate);
    }

    let mut args = RecipeArgs::new(graph, &rule.targets);
    let result = prepare_targets(graph, rule).and_then(|_| recipe(&mut args));
    let (postreqs, mut log) = args.finish();

    match result {
        Ok(()) => StepResult {
            outcome: RuleOutcome::Rebuilt,
            log,
            postreqs: Some(postreqs),
        },
        Err(e) => {
            log.push_str(&format!("{:#}\n", e));
            StepResult::not_run(RuleOutcome::Failed, log)
        }
    }
}

fn prepare_targets(graph: &BuildGraph, rule: &Rule) -> Result<()> {
    for t in &rule.targets {
        if let Some(parent) = graph.abs(t).parent() {
            ensure_dir(parent)?;
        }
    }
    Ok(())
}

/// Modification time of the oldest target, or `None` if any is missing.
fn oldest_target(graph: &BuildGraph, rule: &Rule) -> Option<SystemTime> {
    rule.targets
        .iter()
        .map(|t| mtime(&graph.abs(t)))
        .try_fold(None, |oldest: Option<SystemTime>, t| {
            let t = t?;
            Some(Some(oldest.map_or(t, |o| o.min(t))))
        })
        .flatten()
}

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn rule_key(rule: &Rule) -> String {
    rule.targets
        .first()
        .map(|t| to_slash(t.rel()))
        .unwrap_or_default()
}
