//! Error types for dataset conversion and splitting.
//!
//! Only configuration-level failures are represented here. Problems with a
//! single annotation file or image are reported as [`crate::types::SkipReason`]
//! and never abort a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a conversion, split or class scan.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML deserialization error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    /// Invalid glob pattern built from a directory path
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Class list file not found: {path:?}")]
    ClassListNotFound { path: PathBuf },

    #[error("Class list file is empty: {path:?}")]
    EmptyClassList { path: PathBuf },

    #[error("Duplicate class name '{name}' on line {line}")]
    DuplicateClass { name: String, line: usize },

    #[error("Directory not found: {path:?}")]
    DirectoryNotFound { path: PathBuf },

    #[error("No '{ext}' images found in {dir:?}")]
    NoImagesFound { dir: PathBuf, ext: String },

    #[error("No XML annotation files found in {dir:?}")]
    NoAnnotationsFound { dir: PathBuf },

    #[error("Invalid split ratios: {message}")]
    InvalidRatios { message: String },
}

impl DatasetError {
    /// Create an invalid ratios error with a message.
    pub fn invalid_ratios(message: impl Into<String>) -> Self {
        Self::InvalidRatios {
            message: message.into(),
        }
    }

    /// Fail with [`DatasetError::DirectoryNotFound`] unless `path` is a directory.
    pub fn require_dir(path: &std::path::Path) -> Result<(), Self> {
        if path.is_dir() {
            Ok(())
        } else {
            Err(Self::DirectoryNotFound {
                path: path.to_path_buf(),
            })
        }
    }
}
