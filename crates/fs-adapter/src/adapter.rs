//! [`Filesystem`] implementation over a Simple Storage backend.
//!
//! The server only knows flat job ids. This adapter uses the full path as
//! the job id and emulates directories by prefix matching on `list()`.
//! Directories are never stored: `create_directory` is a no-op and
//! `directory_exists` always answers `false`.
//!
//! Reads differ from the client's default. [`Client::download`] consumes an
//! object unless asked to keep it, while this adapter downloads with
//! `keep = true` so that `copy` and `move_file` still find their source.
//! Set [`AdapterOptions::consume_on_read`] for consume-once reads.
//!
//! [`Client::download`]: simple_storage_client::Client::download

use std::io::Cursor;
use std::sync::Arc;

use simple_storage_client::{BoxFuture, FileInfo, StorageBackend};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{FilesystemError, MetadataKind};
use crate::filesystem::{ByteStream, Filesystem, FsResult};
use crate::types::{FileAttributes, Visibility, WriteOptions};

/// Behaviour switches for [`SimpleStorageAdapter`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Let the server delete an object once it has been read.
    ///
    /// Off by default, otherwise `copy` and `move_file` would destroy their
    /// source before the delete step runs.
    pub consume_on_read: bool,
}

/// Filesystem view of a Simple Storage server.
#[derive(Clone)]
pub struct SimpleStorageAdapter {
    backend: Arc<dyn StorageBackend>,
    options: AdapterOptions,
}

impl SimpleStorageAdapter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_options(backend, AdapterOptions::default())
    }

    pub fn with_options(backend: Arc<dyn StorageBackend>, options: AdapterOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub async fn file_exists(&self, path: &str) -> FsResult<bool> {
        self.backend
            .exists(path)
            .await
            .map_err(|source| FilesystemError::UnableToCheckExistence {
                path: path.to_string(),
                source,
            })
    }

    pub async fn directory_exists(&self, _path: &str) -> FsResult<bool> {
        Ok(false)
    }

    /// Uploads `contents` under `path`.
    ///
    /// A response that does not report `"uploaded"` counts as a failed write.
    pub async fn write(&self, path: &str, contents: &[u8], _options: &WriteOptions) -> FsResult<()> {
        let result = self
            .backend
            .upload_content(path, contents)
            .await
            .map_err(|source| FilesystemError::UnableToWriteFile {
                path: path.to_string(),
                reason: source.to_string(),
                source: Some(source),
            })?;

        if !result.is_successful() {
            return Err(FilesystemError::UnableToWriteFile {
                path: path.to_string(),
                reason: format!("server reported upload status {:?}", result.status),
                source: None,
            });
        }
        Ok(())
    }

    pub async fn write_stream(
        &self,
        path: &str,
        mut stream: ByteStream,
        options: &WriteOptions,
    ) -> FsResult<()> {
        let mut contents = Vec::new();
        stream
            .read_to_end(&mut contents)
            .await
            .map_err(|e| FilesystemError::UnableToWriteFile {
                path: path.to_string(),
                reason: format!("could not read stream: {e}"),
                source: None,
            })?;
        self.write(path, &contents, options).await
    }

    /// Downloads the object at `path`. The object is kept on the server
    /// unless [`AdapterOptions::consume_on_read`] is set.
    pub async fn read(&self, path: &str) -> FsResult<Vec<u8>> {
        let keep = !self.options.consume_on_read;
        self.backend
            .download(path, keep)
            .await
            .map_err(|source| FilesystemError::UnableToReadFile {
                path: path.to_string(),
                reason: source.to_string(),
                source,
            })
    }

    /// Reads the whole object, then serves it from memory.
    pub async fn read_stream(&self, path: &str) -> FsResult<ByteStream> {
        let contents = self.read(path).await?;
        Ok(Box::new(Cursor::new(contents)))
    }

    /// Deletes one object. Missing objects are an error.
    pub async fn delete(&self, path: &str) -> FsResult<()> {
        self.backend
            .delete(path)
            .await
            .map(|_| ())
            .map_err(|source| FilesystemError::UnableToDeleteFile {
                path: path.to_string(),
                reason: source.to_string(),
                source,
            })
    }

    pub async fn delete_directory(&self, path: &str) -> FsResult<()> {
        let wrap = |source: FilesystemError| FilesystemError::UnableToDeleteDirectory {
            path: path.to_string(),
            source: Box::new(source),
        };

        let entries = self.list_contents(path, true).await.map_err(wrap)?;
        debug!(path, count = entries.len(), "deleting directory contents");
        for entry in entries {
            self.delete(&entry.path).await.map_err(wrap)?;
        }
        Ok(())
    }

    pub async fn create_directory(&self, _path: &str, _options: &WriteOptions) -> FsResult<()> {
        Ok(())
    }

    pub async fn set_visibility(&self, path: &str, _visibility: Visibility) -> FsResult<()> {
        Err(unsupported("set_visibility", path))
    }

    pub async fn visibility(&self, path: &str) -> FsResult<FileAttributes> {
        Err(unsupported("visibility", path))
    }

    pub async fn mime_type(&self, path: &str) -> FsResult<FileAttributes> {
        Err(unsupported("mime_type", path))
    }

    pub async fn last_modified(&self, path: &str) -> FsResult<FileAttributes> {
        let file = self.find_listed(path, MetadataKind::LastModified).await?;
        Ok(FileAttributes::new(path)
            .with_file_size(file.file_size)
            .with_last_modified(file.uploaded_at.timestamp()))
    }

    pub async fn file_size(&self, path: &str) -> FsResult<FileAttributes> {
        let file = self.find_listed(path, MetadataKind::FileSize).await?;
        Ok(FileAttributes::new(path).with_file_size(file.file_size))
    }

    /// Returns every stored file whose id starts with `path`.
    ///
    /// The server has no delimiter support, so `deep` cannot narrow the
    /// result to direct children and is ignored.
    pub async fn list_contents(&self, path: &str, deep: bool) -> FsResult<Vec<FileAttributes>> {
        let files = self
            .backend
            .list()
            .await
            .map_err(|source| FilesystemError::UnableToListContents {
                path: path.to_string(),
                deep,
                source,
            })?;

        let prefix = path.trim_matches('/');
        Ok(files
            .into_iter()
            .filter(|f| prefix.is_empty() || f.job_id.starts_with(prefix))
            .map(|f| {
                FileAttributes::new(f.job_id)
                    .with_file_size(f.file_size)
                    .with_last_modified(f.uploaded_at.timestamp())
            })
            .collect())
    }

    /// Copies `from` to `to`, then deletes `from`.
    pub async fn move_file(&self, from: &str, to: &str, options: &WriteOptions) -> FsResult<()> {
        debug!(from, to, "moving file");
        let result = match self.copy(from, to, options).await {
            Ok(()) => self.delete(from).await,
            Err(e) => Err(e),
        };
        result.map_err(|source| FilesystemError::UnableToMoveFile {
            from: from.to_string(),
            to: to.to_string(),
            source: Box::new(source),
        })
    }

    pub async fn copy(&self, from: &str, to: &str, options: &WriteOptions) -> FsResult<()> {
        debug!(from, to, "copying file");
        let result = match self.read(from).await {
            Ok(contents) => self.write(to, &contents, options).await,
            Err(e) => Err(e),
        };
        result.map_err(|source| FilesystemError::UnableToCopyFile {
            from: from.to_string(),
            to: to.to_string(),
            source: Box::new(source),
        })
    }

    /// Scans the full listing for an exact id match.
    async fn find_listed(&self, path: &str, kind: MetadataKind) -> FsResult<FileInfo> {
        let files = self.backend.list().await.map_err(|source| {
            FilesystemError::UnableToRetrieveMetadata {
                path: path.to_string(),
                kind,
                reason: source.to_string(),
                source: Some(source),
            }
        })?;

        files
            .into_iter()
            .find(|f| f.job_id == path)
            .ok_or_else(|| FilesystemError::UnableToRetrieveMetadata {
                path: path.to_string(),
                kind,
                reason: "file not found".into(),
                source: None,
            })
    }
}

fn unsupported(operation: &'static str, path: &str) -> FilesystemError {
    FilesystemError::Unsupported {
        operation,
        path: path.to_string(),
    }
}

impl Filesystem for SimpleStorageAdapter {
    fn file_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<bool>> {
        Box::pin(SimpleStorageAdapter::file_exists(self, path))
    }

    fn directory_exists<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<bool>> {
        Box::pin(SimpleStorageAdapter::directory_exists(self, path))
    }

    fn write<'a>(
        &'a self,
        path: &'a str,
        contents: &'a [u8],
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::write(self, path, contents, options))
    }

    fn write_stream<'a>(
        &'a self,
        path: &'a str,
        stream: ByteStream,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::write_stream(self, path, stream, options))
    }

    fn read<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<Vec<u8>>> {
        Box::pin(SimpleStorageAdapter::read(self, path))
    }

    fn read_stream<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<ByteStream>> {
        Box::pin(SimpleStorageAdapter::read_stream(self, path))
    }

    fn delete<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::delete(self, path))
    }

    fn delete_directory<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::delete_directory(self, path))
    }

    fn create_directory<'a>(
        &'a self,
        path: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::create_directory(self, path, options))
    }

    fn set_visibility<'a>(
        &'a self,
        path: &'a str,
        visibility: Visibility,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::set_visibility(self, path, visibility))
    }

    fn visibility<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>> {
        Box::pin(SimpleStorageAdapter::visibility(self, path))
    }

    fn mime_type<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>> {
        Box::pin(SimpleStorageAdapter::mime_type(self, path))
    }

    fn last_modified<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>> {
        Box::pin(SimpleStorageAdapter::last_modified(self, path))
    }

    fn file_size<'a>(&'a self, path: &'a str) -> BoxFuture<'a, FsResult<FileAttributes>> {
        Box::pin(SimpleStorageAdapter::file_size(self, path))
    }

    fn list_contents<'a>(
        &'a self,
        path: &'a str,
        deep: bool,
    ) -> BoxFuture<'a, FsResult<Vec<FileAttributes>>> {
        Box::pin(SimpleStorageAdapter::list_contents(self, path, deep))
    }

    fn move_file<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::move_file(self, from, to, options))
    }

    fn copy<'a>(
        &'a self,
        from: &'a str,
        to: &'a str,
        options: &'a WriteOptions,
    ) -> BoxFuture<'a, FsResult<()>> {
        Box::pin(SimpleStorageAdapter::copy(self, from, to, options))
    }
}
