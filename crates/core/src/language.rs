// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The closed set of languages the service compiles or interprets.

use serde::{Deserialize, Serialize};

/// Supported source languages. Closed set; wire code is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    C,
    Cpp,
    Java,
    Python,
    JavaScript,
    Go,
    Rust,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Python,
        Language::JavaScript,
        Language::Go,
        Language::Rust,
    ];

    /// Wire code carried in `CompileRequest`.
    pub fn code(self) -> u8 {
        match self {
            Language::C => 1,
            Language::Cpp => 2,
            Language::Java => 3,
            Language::Python => 4,
            Language::JavaScript => 5,
            Language::Go => 6,
            Language::Rust => 7,
        }
    }

    /// Inverse of [`Language::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Language::C,
            2 => Language::Cpp,
            3 => Language::Java,
            4 => Language::Python,
            5 => Language::JavaScript,
            6 => Language::Go,
            7 => Language::Rust,
            _ => return None,
        })
    }

    /// Source file extensions claimed by this language.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Language::C => &["c"],
            Language::Cpp => &["cpp", "cc", "cxx"],
            Language::Java => &["java"],
            Language::Python => &["py"],
            Language::JavaScript => &["js", "mjs"],
            Language::Go => &["go"],
            Language::Rust => &["rs"],
        }
    }

    /// Resolve a language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL.iter().copied().find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Interpreted languages have no compile step.
    pub fn is_interpreted(self) -> bool {
        matches!(self, Language::Python | Language::JavaScript)
    }
}

crate::simple_display! {
    Language {
        C => "c",
        Cpp => "c++",
        Java => "java",
        Python => "python",
        JavaScript => "javascript",
        Go => "go",
        Rust => "rust",
    }
}

#[cfg(test)]
#[path = "language_tests.rs"]
mod tests;
