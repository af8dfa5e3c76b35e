#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::rewrite::RewriteError;

#[derive(Debug, Error, Diagnostic)]
pub enum RemoldError {
    #[error("Migration config not found at {path}")]
    #[diagnostic(help("Run `remold init` to create a sample remold.toml"))]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to parse {path}")]
    #[diagnostic(help("Check the TOML syntax in your migration config"))]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid migration config: {reason}")]
    ConfigInvalid { reason: String },

    #[error("Invalid exclude pattern '{pattern}'")]
    #[diagnostic(help("Exclude patterns are regular expressions matched against relative paths"))]
    InvalidExcludePattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },

    #[error("Source directory not found: {path}")]
    SourceDirectoryMissing { path: PathBuf },

    #[error("Failed to parse template {path}: {message}")]
    #[diagnostic(help("Check for unbalanced or unknown template directives"))]
    Parse { path: String, message: String },

    #[error("Failed to rewrite template {path}")]
    Rewrite {
        path: String,
        #[source]
        source: RewriteError,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt cancelled by user")]
    PromptCancelled,
}

impl RemoldError {
    /// Whether this error aborts the whole run rather than a single template.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RemoldError::ConfigNotFound { .. }
                | RemoldError::ConfigParse { .. }
                | RemoldError::ConfigInvalid { .. }
                | RemoldError::InvalidExcludePattern { .. }
                | RemoldError::SourceDirectoryMissing { .. }
                | RemoldError::PromptCancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, RemoldError>;
