// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use mill_core::{ErrorKind, Fault, JobMode, Language};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("no toolchain detected for {0}")]
    UnsupportedLanguage(Language),

    #[error("{mode} is not supported for {language}")]
    UnsupportedMode { language: Language, mode: JobMode },

    #[error("source file has no usable stem: {0}")]
    BadSourceName(String),

    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("sandbox at {path}: {source}")]
    Sandbox {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ToolchainError {
    pub fn to_fault(&self) -> Fault {
        match self {
            ToolchainError::UnsupportedLanguage(_) | ToolchainError::UnsupportedMode { .. } => {
                Fault::new(ErrorKind::UnsupportedLanguage, self.to_string(), "toolchain")
            }
            ToolchainError::BadSourceName(_) => {
                Fault::new(ErrorKind::InvalidArgument, self.to_string(), "source")
            }
            ToolchainError::Spawn(_) => {
                Fault::new(ErrorKind::Execution, self.to_string(), "spawn")
            }
            ToolchainError::Sandbox { .. } => {
                Fault::new(ErrorKind::FileIo, self.to_string(), "sandbox")
            }
        }
    }
}
