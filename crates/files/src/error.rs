// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use mill_core::{ErrorKind, Fault};
use thiserror::Error;

/// Failures from the file manager.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("unsafe filename {0:?}: {1}")]
    UnsafeFilename(String, &'static str),

    #[error("file {filename:?} is {size} bytes, over the {limit} byte limit")]
    TooLarge { filename: String, size: u64, limit: u64 },

    #[error("path {0} escapes the managed roots")]
    OutsideRoots(PathBuf),

    #[error("no tracked file named {0:?}")]
    NotFound(String),

    #[error("file {0:?} already exists")]
    AlreadyExists(String),

    #[error("I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    pub fn to_fault(&self) -> Fault {
        match self {
            FileError::UnsafeFilename(..) => {
                Fault::new(ErrorKind::InvalidArgument, self.to_string(), "filename")
            }
            FileError::TooLarge { .. } => {
                Fault::new(ErrorKind::QuotaExceeded, self.to_string(), "file_size")
            }
            FileError::OutsideRoots(_) => {
                Fault::new(ErrorKind::Permission, self.to_string(), "path")
            }
            FileError::NotFound(_) => Fault::not_found(self.to_string(), "file"),
            FileError::AlreadyExists(_) => {
                Fault::new(ErrorKind::InvalidArgument, self.to_string(), "file")
            }
            FileError::Io { .. } => Fault::new(ErrorKind::FileIo, self.to_string(), "file_io"),
        }
    }
}
