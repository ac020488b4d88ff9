//! Error types shared by loading, layout and export.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading report data or exporting the rendered report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed report data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation '{operation}', model {index}: invalid significance code '{code}'")]
    InvalidCode {
        operation: String,
        index: usize,
        code: String,
    },

    #[error(
        "Operation '{operation}', model {index}: {count} coefficients exceed the {max} available slots"
    )]
    TooManyCoefficients {
        operation: String,
        index: usize,
        count: usize,
        max: usize,
    },

    #[error("Table layout failed: {0}")]
    Layout(#[from] crate::model::RowWidthMismatch),

    #[error("Chart image missing at {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("Failed to process chart image: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF rendering failed: {0}")]
    Render(#[from] genpdf::error::Error),

    #[cfg(feature = "bookmarks")]
    #[error("Failed to embed bookmarks: {0}")]
    Bookmarks(#[from] crate::bookmarks::BookmarkError),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = ReportError> = std::result::Result<T, E>;

/// Error returned by strict significance code parsing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("'{0}' does not match the significance code pattern [*]?[+-][+-]")]
pub struct CodeParseError(pub String);
