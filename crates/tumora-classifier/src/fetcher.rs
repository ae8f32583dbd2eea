//! Model artifact fetchers
//!
//! The provider never downloads on its own: it is handed a [`ModelFetcher`]
//! at construction. [`RemoteFetcher`] is the production implementation and
//! dispatches on the configured [`ModelSource`].

use crate::model_config::ModelSource;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use tumora_core::{Error, Result};
use url::Url;

/// Trait for anything that can place a model artifact on disk
#[async_trait]
pub trait ModelFetcher: Send + Sync {
    /// Fetch the artifact described by `source` and write it to `dest`
    async fn fetch(&self, source: &ModelSource, dest: &Path) -> Result<()>;

    /// Get the fetcher name
    fn name(&self) -> &str;
}

/// Sibling path used while a download is in flight
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Normalize a configured model URL into something that serves raw bytes.
///
/// Google Drive share links (`/file/d/<id>/view`, `open?id=<id>`) point at an
/// HTML viewer; they are rewritten to the direct download endpoint.
pub fn resolve_download_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("Invalid model URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::config(format!(
                "Unsupported URL scheme '{}' in '{}'",
                other, raw
            )))
        }
    }

    if url.host_str() == Some("drive.google.com") {
        if let Some(id) = google_drive_file_id(&url) {
            let mut direct = Url::parse("https://drive.google.com/uc")
                .map_err(|e| Error::internal(e.to_string()))?;
            direct
                .query_pairs_mut()
                .append_pair("export", "download")
                .append_pair("confirm", "t")
                .append_pair("id", &id);
            return Ok(direct);
        }
    }

    Ok(url)
}

fn google_drive_file_id(url: &Url) -> Option<String> {
    if let Some(mut segments) = url.path_segments() {
        if let (Some("file"), Some("d"), Some(id)) =
            (segments.next(), segments.next(), segments.next())
        {
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }

    url.query_pairs()
        .find(|(key, value)| key == "id" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Downloads over HTTP(S) with reqwest
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tumora/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `raw_url` to `dest`, returning the number of bytes written
    pub async fn download(&self, raw_url: &str, dest: &Path) -> Result<u64> {
        let url = resolve_download_url(raw_url)?;
        info!("Downloading model from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::download(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::download(format!("{} returned HTTP {}", url, status)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/html"))
            .unwrap_or(false);
        if is_html {
            return Err(Error::download(format!(
                "{} returned an HTML page instead of a model artifact",
                url
            )));
        }

        let part = partial_path(dest);
        let written = match write_body(response, &part).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, dest).await?;
        info!("Model downloaded to {} ({} bytes)", dest.display(), written);
        Ok(written)
    }
}

async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64> {
    create_parent_dir(path).await?;

    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::download(format!("Download interrupted: {}", e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    if written == 0 {
        return Err(Error::download("Remote returned an empty body"));
    }

    file.sync_all().await?;
    Ok(written)
}

async fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Downloads a single file through the HuggingFace Hub cache
#[derive(Debug, Clone, Default)]
pub struct HubFetcher;

impl HubFetcher {
    /// Fetch `filename` from `repo` at `revision` and copy it to `dest`
    pub async fn download(
        &self,
        repo: &str,
        revision: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<u64> {
        info!("Downloading model from HuggingFace: {} @ {} ({})", repo, revision, filename);

        let repo_id = repo.to_string();
        let revision = revision.to_string();
        let file = filename.to_string();

        // hf-hub's sync API blocks on network IO
        let cached = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let api = hf_hub::api::sync::Api::new().map_err(|e| {
                Error::download(format!("Failed to initialize HuggingFace API: {}", e))
            })?;
            let repo = api.repo(hf_hub::Repo::with_revision(
                repo_id,
                hf_hub::RepoType::Model,
                revision,
            ));
            repo.get(&file)
                .map_err(|e| Error::download(format!("Failed to download {}: {}", file, e)))
        })
        .await
        .map_err(|e| Error::internal(format!("Hub download task failed: {}", e)))??;

        debug!("Hub cache path: {}", cached.display());

        create_parent_dir(dest).await?;
        let part = partial_path(dest);
        let written = tokio::fs::copy(&cached, &part).await?;
        tokio::fs::rename(&part, dest).await?;

        info!("Model copied to {} ({} bytes)", dest.display(), written);
        Ok(written)
    }
}

/// Production fetcher: HTTP for URL sources, hf-hub for Hub sources
#[derive(Clone)]
pub struct RemoteFetcher {
    http: HttpFetcher,
    hub: HubFetcher,
}

impl RemoteFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new()?,
            hub: HubFetcher,
        })
    }
}

#[async_trait]
impl ModelFetcher for RemoteFetcher {
    async fn fetch(&self, source: &ModelSource, dest: &Path) -> Result<()> {
        match source {
            ModelSource::Url { url } => {
                self.http.download(url, dest).await?;
            }
            ModelSource::HuggingFace {
                repo,
                revision,
                filename,
            } => {
                self.hub.download(repo, revision, filename, dest).await?;
            }
            ModelSource::Local => {
                return Err(Error::download(format!(
                    "Model artifact not found at {} and no remote source is configured",
                    dest.display()
                )));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}
