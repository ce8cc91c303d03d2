//! Per-project execution strategy.
//!
//! Drives the requested steps of one project through the cache:
//! `Init -> CacheLookup -> {Restoring | ExecutingFull} -> Done`.
//! Clean steps always run first. A restorable lookup restores the cached
//! artifacts and walks the covered segment, skipping steps whose cached
//! outcome is still trusted; steps after the segment always run. If the
//! restore fails the whole request runs for real. If trust is lost midway,
//! restored artifacts are dropped and the covered segment runs for real.

use hoard_common::{Step, StepKey};
use hoard_model::CacheResult;

use crate::controller::CacheController;
use crate::error::{CacheError, ExecutionError};
use crate::executor::{ExecutionLog, SkipCandidate, StepDecision, StepExecutor};
use crate::project::Project;
use crate::segment::{is_cacheable, Segments};
use crate::verifier::TrustFlag;

/// States of a project build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    /// Nothing has run yet.
    Init,
    /// Clean steps ran; looking up the cache.
    CacheLookup,
    /// Restoring a cached build.
    Restoring,
    /// Executing every requested step for real.
    ExecutingFull,
    /// Finished.
    Done,
}

/// What happened to one project build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Final cache result: the rebuilt result after a save, otherwise the
    /// lookup result.
    pub result: CacheResult,
    /// Steps that ran for real, in execution order. A step appears twice if
    /// it ran again after trust was lost.
    pub executed: Vec<StepKey>,
    /// Steps whose cached outcome was used.
    pub skipped: Vec<StepKey>,
    /// Whether cached artifacts were restored.
    pub restored: bool,
    /// States visited, in order.
    pub states: Vec<StrategyState>,
}

impl BuildOutcome {
    fn new() -> Self {
        Self {
            result: CacheResult::empty(),
            executed: Vec::new(),
            skipped: Vec::new(),
            restored: false,
            states: vec![StrategyState::Init],
        }
    }

    fn enter(&mut self, state: StrategyState) {
        self.states.push(state);
    }
}

/// Bookkeeping of one project build.
struct ProjectRun<'e> {
    executor: &'e mut dyn StepExecutor,
    log: ExecutionLog,
    outcome: BuildOutcome,
}

impl ProjectRun<'_> {
    fn run(&mut self, project: &mut Project, step: &Step) -> Result<(), ExecutionError> {
        tracing::debug!(project = %project.id, step = %step, "executing step");
        let parameters = self.executor.execute(project, step)?;
        self.log.record(step, parameters);
        self.outcome.executed.push(step.key());
        Ok(())
    }

    fn skip(&mut self, project: &Project, step: &Step) {
        tracing::info!(project = %project.id, step = %step, "skipping step, restored from cache");
        self.outcome.skipped.push(step.key());
    }
}

/// Runs project builds against a cache controller.
pub struct ExecutionStrategy<'c> {
    controller: &'c CacheController,
}

impl<'c> ExecutionStrategy<'c> {
    /// Creates a strategy for `controller`.
    pub fn new(controller: &'c CacheController) -> Self {
        Self { controller }
    }

    /// Builds `project` by running or restoring `steps`.
    ///
    /// Returns an error if a step fails, if the project is already being
    /// built, or, in fail-fast mode, if the project was not fully restored.
    pub fn execute(
        &self,
        project: &mut Project,
        steps: &[Step],
        executor: &mut dyn StepExecutor,
    ) -> Result<BuildOutcome, CacheError> {
        let _guard = self.controller.begin(&project.id)?;
        let mut run = ProjectRun {
            executor,
            log: ExecutionLog::default(),
            outcome: BuildOutcome::new(),
        };

        let caching = self.controller.enabled() && is_cacheable(steps);
        if !caching {
            run.outcome.enter(StrategyState::ExecutingFull);
            for step in steps {
                run.run(project, step)?;
            }
            run.outcome.enter(StrategyState::Done);
            return Ok(run.outcome);
        }

        for step in steps.iter().filter(|s| s.is_clean()) {
            run.run(project, step)?;
        }

        run.outcome.enter(StrategyState::CacheLookup);
        let result = self.controller.lookup(project, steps);

        let mut satisfied = false;
        if result.is_restorable() {
            run.outcome.enter(StrategyState::Restoring);
            satisfied = self.restore(project, steps, &result, &mut run)?;
        }
        if !run.outcome.restored {
            run.outcome.enter(StrategyState::ExecutingFull);
            for step in steps.iter().filter(|s| !s.is_clean()) {
                run.run(project, step)?;
            }
        }

        let clean_hit = result.is_success() && satisfied;
        run.outcome.result = if clean_hit {
            result
        } else {
            self.controller
                .save(project, &result, steps, &run.log)
                .unwrap_or(result)
        };
        run.outcome.enter(StrategyState::Done);

        if self.controller.config().fail_fast && !clean_hit {
            return Err(CacheError::FailFast {
                project: project.id.clone(),
            });
        }
        Ok(run.outcome)
    }

    /// Restores a cached build and runs what it does not cover.
    ///
    /// Returns true if the covered segment was fully trusted. Leaves
    /// `outcome.restored` false when the artifacts could not be restored,
    /// in which case nothing has run.
    fn restore(
        &self,
        project: &mut Project,
        steps: &[Step],
        result: &CacheResult,
        run: &mut ProjectRun<'_>,
    ) -> Result<bool, CacheError> {
        let Some(record) = result.record.as_deref() else {
            return Ok(false);
        };
        if !self.controller.restore_artifacts(project, result) {
            tracing::info!(project = %project.id, "cannot restore cached build, building project");
            return Ok(false);
        }
        run.outcome.restored = true;

        let segments = Segments::split(steps, Some(record));
        let verifier = self.controller.verifier();
        let trust = TrustFlag::new();
        for step in &segments.cached {
            if self.controller.is_forced_step(project, step) {
                tracing::info!(project = %project.id, step = %step, "step is forced to run");
                run.run(project, step)?;
                continue;
            }
            if !verifier.needs_check(step) {
                run.skip(project, step);
                continue;
            }
            let Some(completed) = record.find_execution(&step.key()) else {
                trust.invalidate();
                break;
            };
            let candidate = SkipCandidate::new(verifier, step, completed, &project.base_dir, &trust);
            match run.executor.reconcile(project, step, candidate)? {
                StepDecision::Skip => run.skip(project, step),
                StepDecision::MustRun => break,
            }
        }

        if !trust.is_consistent() {
            tracing::info!(
                project = %project.id,
                "cached build is inconsistent with the current run, executing cached segment"
            );
            project.reset_artifacts();
            run.log.clear();
            run.outcome.skipped.clear();
            for step in &segments.cached {
                run.run(project, step)?;
            }
        }

        for step in &segments.post {
            run.run(project, step)?;
        }
        Ok(trust.is_consistent())
    }
}
