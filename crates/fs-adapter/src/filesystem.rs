//! Generic hierarchical filesystem contract.

use simple_storage_client::BoxFuture;
use tokio::io::AsyncRead;

use crate::error::FilesystemError;
use crate::types::{FileAttributes, Visibility, WriteOptions};

/// Owned byte stream handed to or returned from streaming operations.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Result alias for filesystem operations.
pub type FsResult<T> = Result<T, FilesystemError>;

/// A path-addressed file store.
///
/// Paths are `/`-separated strings relative to the store root. Backends
/// without real directories may treat them as plain keys.
pub trait Filesystem: Send + Sync {
    fn file_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<bool>>;

    fn directory_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<bool>>;

    /// Creates or replaces the file at `path`.
    fn write<'a>(
        &'a self,
        path: &'a str,
        contents: &'a [u8],
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>>;

    /// Like [`write`](Self::write), draining `stream` first.
    fn write_stream<'a>(
        &'a self,
        path: &'a str,
        stream: ByteStream,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>>;

    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<Vec<u8>>>;

    fn read_stream<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<ByteStream>>;

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<()>>;

    /// Removes every file below `path`.
    fn delete_directory<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<()>>;

    fn create_directory<'a>(
        &'a self,
        path: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>>;

    fn set_visibility<'a>(
        &'a self,
        path: &'a str,
        visibility: Visibility,
    ) -> BoxFuture<'a, FsResult<()>>;

    fn visibility<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>>;

    fn mime_type<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>>;

    fn last_modified<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>>;

    fn file_size<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>>;

    /// Lists files below `path`. `deep` requests a recursive listing.
    fn list_contents<'a>(
        &'a self,
        path: &'a str,
        deep: bool,
    ) -> BoxFuture<'a, FsResult<Vec<FileAttributes>>>;

    fn move_file<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>>;

    fn copy<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>>;
}
