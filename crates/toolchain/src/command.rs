// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-language command shaping.
//!
//! Commands are shell strings executed via `/bin/sh -c` with the sandbox
//! directory as the working directory. User-supplied argument strings are
//! appended verbatim. The execute step is additionally wrapped in the
//! external `timeout` command.

use mill_core::{JobMode, Language};

use crate::error::ToolchainError;
use crate::registry::CompilerDescriptor;

/// The commands one job needs, in order. `None` means the phase is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub compile: Option<String>,
    pub execute: Option<String>,
}

/// Shape the compile/execute commands for one job.
///
/// `source` is the source file's basename inside the sandbox.
pub fn build_plan(
    desc: &CompilerDescriptor,
    mode: JobMode,
    source: &str,
    compiler_args: &str,
    execution_args: &str,
    exec_timeout_secs: u64,
) -> Result<CommandPlan, ToolchainError> {
    let stem = source
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolchainError::BadSourceName(source.to_string()))?;

    if !desc.language.is_interpreted() && mode == JobMode::InterpretOnly {
        return Err(ToolchainError::UnsupportedMode { language: desc.language, mode });
    }

    let compiler = desc.executable.display();
    let plan = match desc.language {
        Language::C | Language::Cpp | Language::Rust => {
            let compile = match mode {
                JobMode::SyntaxCheck if desc.language == Language::Rust => {
                    join_args(&[&compiler.to_string(), "--emit=metadata", compiler_args, source])
                }
                JobMode::SyntaxCheck => join_args(&[
                    &compiler.to_string(),
                    &desc.default_args,
                    "-fsyntax-only",
                    compiler_args,
                    source,
                ]),
                _ => join_args(&[
                    &compiler.to_string(),
                    &desc.default_args,
                    compiler_args,
                    "-o",
                    stem,
                    source,
                ]),
            };
            CommandPlan {
                compile: Some(compile),
                execute: run_step(mode)
                    .then(|| timed(exec_timeout_secs, &format!("./{stem}"), execution_args)),
            }
        }
        Language::Go => {
            let compile = match mode {
                JobMode::SyntaxCheck => {
                    join_args(&[&compiler.to_string(), "vet", source])
                }
                _ => join_args(&[
                    &compiler.to_string(),
                    "build",
                    compiler_args,
                    "-o",
                    stem,
                    source,
                ]),
            };
            CommandPlan {
                compile: Some(compile),
                execute: run_step(mode)
                    .then(|| timed(exec_timeout_secs, &format!("./{stem}"), execution_args)),
            }
        }
        Language::Java => {
            let compile = join_args(&[
                &compiler.to_string(),
                &desc.default_args,
                compiler_args,
                source,
            ]);
            let runtime = desc
                .runtime
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "java".to_string());
            CommandPlan {
                compile: Some(compile),
                execute: run_step(mode)
                    .then(|| timed(exec_timeout_secs, &format!("{runtime} {stem}"), execution_args)),
            }
        }
        Language::Python | Language::JavaScript => {
            match mode {
                // No compile step; a "compile" request degrades to a check.
                JobMode::CompileOnly | JobMode::SyntaxCheck => {
                    let check = if desc.language == Language::Python {
                        join_args(&[&compiler.to_string(), "-m", "py_compile", source])
                    } else {
                        join_args(&[&compiler.to_string(), "--check", source])
                    };
                    CommandPlan { compile: Some(check), execute: None }
                }
                JobMode::CompileAndRun | JobMode::InterpretOnly => CommandPlan {
                    compile: None,
                    execute: Some(timed(
                        exec_timeout_secs,
                        &format!("{compiler} {source}"),
                        execution_args,
                    )),
                },
            }
        }
    };
    Ok(plan)
}

/// Whether this mode has an execute phase (for compiled languages).
fn run_step(mode: JobMode) -> bool {
    matches!(mode, JobMode::CompileAndRun)
}

fn timed(timeout_secs: u64, base: &str, execution_args: &str) -> String {
    join_args(&[&format!("timeout {timeout_secs}"), base, execution_args])
}

/// Join non-empty parts with single spaces.
fn join_args(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
