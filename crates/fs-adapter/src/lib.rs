//! Hierarchical filesystem view over the Simple Storage flat job namespace.
//!
//! [`Filesystem`] is the generic contract; [`SimpleStorageAdapter`]
//! implements it on top of any [`StorageBackend`], using the file path as
//! the job id. There are no real directories: listing and directory deletion
//! work by id prefix.
//!
//! Unlike the client's consume-once download, adapter reads keep the object
//! on the server by default (see [`AdapterOptions::consume_on_read`]).
//!
//! [`StorageBackend`]: simple_storage_client::StorageBackend

pub mod adapter;
pub mod error;
pub mod filesystem;
pub mod types;

pub use adapter::{AdapterOptions, SimpleStorageAdapter};
pub use error::{FilesystemError, MetadataKind};
pub use filesystem::{ByteStream, Filesystem, FsResult};
pub use types::{FileAttributes, Visibility, WriteOptions};
