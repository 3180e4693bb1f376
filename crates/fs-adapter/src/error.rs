//! Error vocabulary for filesystem operations.

use std::fmt;

use simple_storage_client::Error as StorageError;

/// Metadata field a lookup was trying to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    LastModified,
    FileSize,
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LastModified => "last modified",
            Self::FileSize => "file size",
        })
    }
}

/// Errors produced by [`Filesystem`](crate::Filesystem) implementations.
///
/// Every variant names the path it was operating on. When the failure came
/// from the storage client, that error is kept as the source.
#[derive(Debug, thiserror::Error)]
pub enum FilesystemError {
    #[error("unable to check existence for: {path}")]
    UnableToCheckExistence {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to write file at location: {path}. {reason}")]
    UnableToWriteFile {
        path: String,
        reason: String,
        #[source]
        source: Option<StorageError>,
    },

    #[error("unable to read file from location: {path}. {reason}")]
    UnableToReadFile {
        path: String,
        reason: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to delete file located at: {path}. {reason}")]
    UnableToDeleteFile {
        path: String,
        reason: String,
        #[source]
        source: StorageError,
    },

    #[error("unable to delete directory located at: {path}")]
    UnableToDeleteDirectory {
        path: String,
        #[source]
        source: Box<FilesystemError>,
    },

    #[error("unable to list contents for '{path}' (deep: {deep})")]
    UnableToListContents {
        path: String,
        deep: bool,
        #[source]
        source: StorageError,
    },

    #[error("unable to move file from {from} to {to}")]
    UnableToMoveFile {
        from: String,
        to: String,
        #[source]
        source: Box<FilesystemError>,
    },

    #[error("unable to copy file from {from} to {to}")]
    UnableToCopyFile {
        from: String,
        to: String,
        #[source]
        source: Box<FilesystemError>,
    },

    #[error("unable to retrieve the {kind} for file at location: {path}. {reason}")]
    UnableToRetrieveMetadata {
        path: String,
        kind: MetadataKind,
        reason: String,
        #[source]
        source: Option<StorageError>,
    },

    #[error("{operation} is not supported (path: {path})")]
    Unsupported {
        operation: &'static str,
        path: String,
    },
}

impl FilesystemError {
    /// The storage client error at the bottom of the chain, if any.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::UnableToCheckExistence { source, .. }
            | Self::UnableToReadFile { source, .. }
            | Self::UnableToDeleteFile { source, .. }
            | Self::UnableToListContents { source, .. } => Some(source),
            Self::UnableToWriteFile { source, .. }
            | Self::UnableToRetrieveMetadata { source, .. } => source.as_ref(),
            Self::UnableToDeleteDirectory { source, .. }
            | Self::UnableToMoveFile { source, .. }
            | Self::UnableToCopyFile { source, .. } => source.storage_error(),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
