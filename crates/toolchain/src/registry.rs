// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Toolchain detection.
//!
//! Probed once at startup from `PATH`; the resulting registry is immutable
//! for the life of the process.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mill_core::Language;
use tracing::{debug, info};

/// One detected toolchain.
#[derive(Debug, Clone)]
pub struct CompilerDescriptor {
    pub language: Language,
    pub executable: PathBuf,
    /// Companion runtime for compile-then-run languages (`java`).
    pub runtime: Option<PathBuf>,
    /// First line of the probe's version output.
    pub version: String,
    /// Default arguments prepended before user compile args.
    pub default_args: String,
    pub supports_debug: bool,
    pub supports_optimize: bool,
    /// Tie-break when several languages claim an extension.
    pub priority: u8,
}

impl CompilerDescriptor {
    pub fn extensions(&self) -> &'static [&'static str] {
        self.language.extensions()
    }
}

struct Candidate {
    language: Language,
    binary: &'static str,
    runtime: Option<&'static str>,
    version_arg: &'static str,
    default_args: &'static str,
    supports_debug: bool,
    supports_optimize: bool,
    priority: u8,
}

const CANDIDATES: [Candidate; 7] = [
    Candidate {
        language: Language::C,
        binary: "gcc",
        runtime: None,
        version_arg: "--version",
        default_args: "-Wall",
        supports_debug: true,
        supports_optimize: true,
        priority: 10,
    },
    Candidate {
        language: Language::Cpp,
        binary: "g++",
        runtime: None,
        version_arg: "--version",
        default_args: "-Wall",
        supports_debug: true,
        supports_optimize: true,
        priority: 9,
    },
    Candidate {
        language: Language::Java,
        binary: "javac",
        runtime: Some("java"),
        version_arg: "--version",
        default_args: "",
        supports_debug: true,
        supports_optimize: false,
        priority: 8,
    },
    Candidate {
        language: Language::Python,
        binary: "python3",
        runtime: None,
        version_arg: "--version",
        default_args: "",
        supports_debug: false,
        supports_optimize: false,
        priority: 7,
    },
    Candidate {
        language: Language::JavaScript,
        binary: "node",
        runtime: None,
        version_arg: "--version",
        default_args: "",
        supports_debug: false,
        supports_optimize: false,
        priority: 6,
    },
    Candidate {
        language: Language::Go,
        binary: "go",
        runtime: None,
        version_arg: "version",
        default_args: "",
        supports_debug: false,
        supports_optimize: true,
        priority: 5,
    },
    Candidate {
        language: Language::Rust,
        binary: "rustc",
        runtime: None,
        version_arg: "--version",
        default_args: "",
        supports_debug: true,
        supports_optimize: true,
        priority: 4,
    },
];

/// The immutable set of detected toolchains.
pub struct CompilerRegistry {
    descriptors: Vec<CompilerDescriptor>,
}

impl CompilerRegistry {
    /// Probe `PATH` for every known toolchain.
    pub async fn probe() -> Self {
        let mut descriptors = Vec::new();
        for candidate in &CANDIDATES {
            let Some(executable) = find_in_path(candidate.binary) else {
                debug!(binary = candidate.binary, "toolchain not found");
                continue;
            };
            let runtime = candidate.runtime.and_then(find_in_path);
            if candidate.runtime.is_some() && runtime.is_none() {
                debug!(binary = candidate.binary, "compiler found but runtime missing; skipping");
                continue;
            }
            let Some(version) = probe_version(&executable, candidate.version_arg).await else {
                debug!(binary = candidate.binary, "version probe failed; skipping");
                continue;
            };
            info!(language = %candidate.language, path = %executable.display(), %version, "detected toolchain");
            descriptors.push(CompilerDescriptor {
                language: candidate.language,
                executable,
                runtime,
                version,
                default_args: candidate.default_args.to_string(),
                supports_debug: candidate.supports_debug,
                supports_optimize: candidate.supports_optimize,
                priority: candidate.priority,
            });
        }
        Self { descriptors }
    }

    /// Build a registry from explicit descriptors. Used by tests and by
    /// deployments that pin toolchain paths.
    pub fn from_descriptors(descriptors: Vec<CompilerDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn resolve(&self, language: Language) -> Option<&CompilerDescriptor> {
        self.descriptors.iter().find(|d| d.language == language)
    }

    /// Resolve by source extension; higher-priority descriptors win ties.
    pub fn resolve_by_extension(&self, ext: &str) -> Option<&CompilerDescriptor> {
        let ext = ext.to_ascii_lowercase();
        self.descriptors
            .iter()
            .filter(|d| d.extensions().contains(&ext.as_str()))
            .max_by_key(|d| d.priority)
    }

    pub fn detected(&self) -> &[CompilerDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Walk `PATH` for an executable regular file.
fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Run `{exe} {version_arg}` and return the first non-empty output line.
async fn probe_version(executable: &Path, version_arg: &str) -> Option<String> {
    let output = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(executable)
            .arg(version_arg)
            .stdin(std::process::Stdio::null())
            .output(),
    )
    .await
    .ok()?
    .ok()?;
    if !output.status.success() {
        return None;
    }
    // Some toolchains print the banner on stderr.
    let text = if output.stdout.is_empty() { output.stderr } else { output.stdout };
    String::from_utf8_lossy(&text)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
