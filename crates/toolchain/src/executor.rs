// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job execution: sandbox, compile phase, execute phase, statistics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mill_core::limits::{COMPILE_TIMEOUT_SECS, EXECUTE_TIMEOUT_SECS};
use mill_core::{Clock, Job, JobState, ServerStats};
use tracing::{debug, info};

use crate::command::build_plan;
use crate::registry::CompilerRegistry;
use crate::sandbox::Sandbox;
use crate::supervise::run_supervised;

/// Wall-clock bounds per phase. Tests shrink these; production uses the
/// service defaults.
#[derive(Debug, Clone, Copy)]
pub struct ExecLimits {
    pub compile: Duration,
    pub execute: Duration,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            compile: Duration::from_secs(COMPILE_TIMEOUT_SECS),
            execute: Duration::from_secs(EXECUTE_TIMEOUT_SECS),
        }
    }
}

/// Terminal result of one job run.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub state: JobState,
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub error: Option<String>,
}

impl JobOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            exit_code: -1,
            stdout: Vec::new(),
            stderr: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Runs jobs against the detected toolchains. One instance, owned by the
/// queue supervisor.
pub struct Executor<C: Clock> {
    registry: Arc<CompilerRegistry>,
    processing_root: PathBuf,
    limits: ExecLimits,
    stats: Arc<ServerStats>,
    clock: C,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        registry: Arc<CompilerRegistry>,
        processing_root: impl Into<PathBuf>,
        limits: ExecLimits,
        stats: Arc<ServerStats>,
        clock: C,
    ) -> Self {
        Self {
            registry,
            processing_root: processing_root.into(),
            limits,
            stats,
            clock,
        }
    }

    /// Run one job to a terminal outcome. `on_spawn` observes each child
    /// pid as it starts, so cancellation can signal it.
    pub async fn run_job(&self, job: &Job, on_spawn: impl Fn(u32)) -> JobOutcome {
        let Some(desc) = self.registry.resolve(job.language) else {
            return JobOutcome::failed(format!("no toolchain detected for {}", job.language));
        };

        let sandbox = match Sandbox::create(
            &self.processing_root,
            job.id,
            self.clock.epoch_ms() / 1_000,
            &job.source_path,
        ) {
            Ok(sandbox) => sandbox,
            Err(e) => return JobOutcome::failed(e.to_string()),
        };

        let plan = match build_plan(
            desc,
            job.mode,
            sandbox.source_name(),
            &job.compiler_args,
            &job.execution_args,
            self.limits.execute.as_secs(),
        ) {
            Ok(plan) => plan,
            Err(e) => {
                sandbox.remove();
                return JobOutcome::failed(e.to_string());
            }
        };

        let outcome = self.run_plan(job, &sandbox, plan, &on_spawn).await;
        sandbox.remove();
        outcome
    }

    async fn run_plan(
        &self,
        job: &Job,
        sandbox: &Sandbox,
        plan: crate::command::CommandPlan,
        on_spawn: &impl Fn(u32),
    ) -> JobOutcome {
        let mut last_output = (Vec::new(), Vec::new());

        if let Some(compile_cmd) = &plan.compile {
            debug!(job = %job.id, cmd = %compile_cmd, "compiling");
            let captured = match run_supervised(
                compile_cmd,
                sandbox.dir(),
                self.limits.compile,
                on_spawn,
            )
            .await
            {
                Ok(captured) => captured,
                Err(e) => return JobOutcome::failed(e.to_string()),
            };
            self.stats.compilation_finished(captured.success(), captured.wall_ms);

            if captured.timed_out {
                return JobOutcome {
                    state: JobState::Timeout,
                    exit_code: captured.exit_code,
                    stdout: captured.stdout,
                    stderr: captured.stderr,
                    error: Some("compile phase exceeded its wall-clock bound".to_string()),
                };
            }
            if captured.exit_code != 0 {
                return JobOutcome {
                    state: JobState::Failed,
                    exit_code: captured.exit_code,
                    stdout: captured.stdout,
                    stderr: captured.stderr,
                    error: Some(format!("compiler exited with {}", captured.exit_code)),
                };
            }
            last_output = (captured.stdout, captured.stderr);
        }

        let Some(execute_cmd) = &plan.execute else {
            return JobOutcome {
                state: JobState::Completed,
                exit_code: 0,
                stdout: last_output.0,
                stderr: last_output.1,
                error: None,
            };
        };

        debug!(job = %job.id, cmd = %execute_cmd, "executing");
        let captured = match run_supervised(
            execute_cmd,
            sandbox.dir(),
            self.limits.execute,
            on_spawn,
        )
        .await
        {
            Ok(captured) => captured,
            Err(e) => return JobOutcome::failed(e.to_string()),
        };
        self.stats.execution_finished(captured.success(), captured.wall_ms);

        if captured.timed_out {
            info!(job = %job.id, "execution timed out");
            return JobOutcome {
                state: JobState::Timeout,
                exit_code: captured.exit_code,
                stdout: captured.stdout,
                stderr: captured.stderr,
                error: Some("execution exceeded its wall-clock bound".to_string()),
            };
        }

        let state = if captured.exit_code == 0 { JobState::Completed } else { JobState::Failed };
        JobOutcome {
            state,
            exit_code: captured.exit_code,
            stdout: captured.stdout,
            stderr: captured.stderr,
            error: (captured.exit_code != 0)
                .then(|| format!("program exited with {}", captured.exit_code)),
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
