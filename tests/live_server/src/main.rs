//! Smoke check against a running Simple Storage server.
//!
//! Usage: `storage-smoke [config.toml]`. Connection settings come from the
//! optional TOML file, overlaid with the `SIMPLE_STORAGE_*` environment
//! variables.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, ensure};
use simple_storage_client::{Client, StorageConfig};
use simple_storage_fs::{Filesystem, SimpleStorageAdapter, WriteOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => StorageConfig::load(Path::new(&path))
            .with_context(|| format!("loading {path}"))?
            .merge_env(|key| std::env::var(key).ok()),
        None => StorageConfig::from_env(),
    };
    info!(base_url = %config.base_url, "starting storage smoke check");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let client = Client::new(config)?;
        client_lifecycle(&client).await?;
        adapter_lifecycle(Arc::new(client)).await
    })?;

    info!("smoke check passed");
    Ok(())
}

/// health → upload → exists → download(keep) → delete → exists(false) → cleanup.
async fn client_lifecycle(client: &Client) -> anyhow::Result<()> {
    let health = client.health().await.context("health")?;
    ensure!(health.is_healthy(), "server reports status {:?}", health.status);
    info!(service = %health.service, "server healthy");

    let job_id = format!("smoke-{}", uuid::Uuid::new_v4());
    let content = b"simple storage smoke test";

    let upload = client.upload_content(&job_id, content).await.context("upload")?;
    ensure!(upload.is_successful(), "upload status {:?}", upload.status);
    ensure!(upload.file_size == content.len() as u64, "size mismatch");
    info!(job_id = %upload.job_id, size = upload.file_size, "uploaded");

    ensure!(client.exists(&job_id).await?, "{job_id} missing after upload");

    let downloaded = client.download(&job_id, true).await.context("download")?;
    ensure!(downloaded == content, "downloaded bytes differ");

    ensure!(client.delete(&job_id).await?, "delete returned false");
    ensure!(!client.exists(&job_id).await?, "{job_id} still present after delete");

    let report = client.cleanup().await.context("cleanup")?;
    info!(%report, "cleanup finished");
    Ok(())
}

/// Same round trip through the filesystem adapter, using a nested path.
async fn adapter_lifecycle(client: Arc<Client>) -> anyhow::Result<()> {
    let fs: Box<dyn Filesystem> = Box::new(SimpleStorageAdapter::new(client));
    let dir = format!("smoke-{}", uuid::Uuid::new_v4());
    let path = format!("{dir}/nested/file.txt");
    let options = WriteOptions::default();

    fs.write(&path, b"adapter", &options).await?;
    ensure!(fs.file_exists(&path).await?, "{path} missing after write");

    let listed = fs.list_contents(&dir, true).await?;
    ensure!(listed.iter().any(|f| f.path == path), "{path} not listed");

    let size = fs.file_size(&path).await?;
    ensure!(size.file_size == Some(7), "unexpected size {:?}", size.file_size);

    fs.delete_directory(&dir).await?;
    ensure!(!fs.file_exists(&path).await?, "{path} survived delete_directory");
    info!(%dir, "adapter round trip done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_client() -> Client {
        Client::new(StorageConfig::from_env()).unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a running server (SIMPLE_STORAGE_URL / SIMPLE_STORAGE_API_KEY)"]
    async fn live_client_lifecycle() {
        client_lifecycle(&live_client()).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a running server (SIMPLE_STORAGE_URL / SIMPLE_STORAGE_API_KEY)"]
    async fn live_adapter_lifecycle() {
        adapter_lifecycle(Arc::new(live_client())).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a running server (SIMPLE_STORAGE_URL / SIMPLE_STORAGE_API_KEY)"]
    async fn live_unknown_id_is_absent() {
        let client = live_client();
        let id = format!("missing-{}", uuid::Uuid::new_v4());
        assert!(!client.exists(&id).await.unwrap());
        assert!(client.download(&id, true).await.unwrap_err().is_absent());
    }
}
