// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum GentooError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("invalid extract request: {0}")]
    ExtractArgument(&'static str),

    #[error("unsupported archive extension: {0}")]
    UnsupportedArchiveExtension(String),

    #[error("unsupported entry in archive: {path} ({entry_type})")]
    UnsupportedArchiveEntry { path: String, entry_type: String },

    #[error("archive entry path escapes destination: {0}")]
    ArchiveEntryPathEscape(String),

    #[error("malformed colon document line {line_number}: {line:?}")]
    ColonMalformedLine { line_number: usize, line: String },

    #[error("colon document line {line_number} is not valid UTF-8")]
    ColonInvalidUtf8 { line_number: usize },

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field {key} has non-integer value {value:?}: {source}")]
    FieldType {
        key: String,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("ambiguous gpkg layout; multiple top-level directories: {0:?}")]
    GpkgAmbiguousLayout(Vec<String>),

    #[error("required file missing from gpkg: {0}")]
    GpkgMissingFile(&'static str),

    #[error("required archive missing from gpkg: {0}.tar.{{gz,bz2,xz}}")]
    GpkgMissingArchive(&'static str),

    #[error("gpkg layout conflict; {0} exists at the package root and in its top-level directory")]
    GpkgLayoutCollision(String),

    #[error("PF value lacks a version component: {0}")]
    GpkgInvalidPf(String),
}

impl GentooError {
    /// Whether this error was caused by invalid input rather than an environment failure.
    ///
    /// Services embedding this crate can use this to distinguish client errors from
    /// server errors.
    pub fn is_validation_error(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::IoPath(_, _))
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, GentooError>;
