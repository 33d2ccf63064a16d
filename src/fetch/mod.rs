use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// What the reader of a page sees when a dataset cannot be loaded.
pub const USER_NOTICE: &str = "Unable to load the data table. Perhaps contact the administrator using the link at the bottom of the page?";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP status {status} while fetching '{url}'")]
    Status { url: String, status: u16 },

    #[error("request for '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn location(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Request { url, .. } => url,
            Self::Io { path, .. } => path,
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Request { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Io { .. } => None,
        }
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<String, FetchError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedSource {
    Remote(reqwest::Url),
    Local(PathBuf),
}

impl ResolvedSource {
    pub fn display(&self) -> String {
        match self {
            Self::Remote(url) => url.to_string(),
            Self::Local(path) => path.display().to_string(),
        }
    }
}

/// Fetches dataset sources over HTTP(S), or from the local data directory when
/// a relative source has no base URL to resolve against.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Option<reqwest::Url>,
    data_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, base_url: Option<reqwest::Url>, data_dir: PathBuf) -> Self {
        Self {
            client,
            base_url,
            data_dir,
        }
    }

    pub fn resolve(&self, location: &str) -> ResolvedSource {
        let location = location.trim();
        if let Ok(url) = reqwest::Url::parse(location) {
            match url.scheme() {
                "http" | "https" => return ResolvedSource::Remote(url),
                "file" => {
                    if let Ok(path) = url.to_file_path() {
                        return ResolvedSource::Local(path);
                    }
                }
                _ => {}
            }
        }
        if let Some(base) = self.base_url.as_ref() {
            if let Ok(url) = base.join(location) {
                return ResolvedSource::Remote(url);
            }
        }
        let path = crate::config::expand_tilde(location);
        if path.is_absolute() {
            ResolvedSource::Local(path)
        } else {
            ResolvedSource::Local(self.data_dir.join(path))
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, location: &str) -> Result<String, FetchError> {
        match self.resolve(location) {
            ResolvedSource::Remote(url) => {
                let url_str = url.to_string();
                let resp = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| FetchError::Request {
                        url: url_str.clone(),
                        source: e,
                    })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url_str,
                        status: status.as_u16(),
                    });
                }
                let body = resp.text().await.map_err(|e| FetchError::Request {
                    url: url_str.clone(),
                    source: e,
                })?;
                tracing::info!("Fetched '{}'; HTTP status {}", url_str, status.as_u16());
                Ok(body)
            }
            ResolvedSource::Local(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| FetchError::Io {
                    path: path.display().to_string(),
                    source: e,
                })?;
                // Same decoding as the HTTP path: invalid UTF-8 becomes U+FFFD.
                let body = String::from_utf8_lossy(&bytes).into_owned();
                tracing::info!("Read '{}' ({} bytes)", path.display(), bytes.len());
                Ok(body)
            }
        }
    }
}
