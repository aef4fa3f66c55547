//! Where the raw extract lives and how it is fetched.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum SourceLocation {
    Url(String),
    Path(PathBuf),
}

impl SourceLocation {
    /// `http(s)://` is a URL, anything else a local path.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lowered = raw.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            SourceLocation::Url(raw.to_string())
        } else {
            SourceLocation::Path(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Url(url) => write!(f, "{}", url),
            SourceLocation::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One fetched copy of the extract, identified by its content hash.
#[derive(Debug, Clone)]
pub struct RawArtifact {
    pub source: SourceLocation,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_hash: String,
    pub size_bytes: usize,
    pub fetched_at: DateTime<Utc>,
}

impl RawArtifact {
    pub fn from_bytes(source: SourceLocation, bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            content_hash: content_hash(&bytes),
            size_bytes: bytes.len(),
            source,
            bytes,
            content_type,
            fetched_at: Utc::now(),
        }
    }

    /// Hex digest without the `sha256:` prefix, used as the on-disk name.
    pub fn hash_hex(&self) -> &str {
        self.content_hash.trim_start_matches("sha256:")
    }
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

pub async fn fetch_source(client: &reqwest::Client, location: &SourceLocation) -> Result<RawArtifact, FetchError> {
    match location {
        SourceLocation::Url(url) => {
            tracing::info!(url = %url, "fetching source");
            let resp = client.get(url).send().await?.error_for_status()?;

            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            if let Some(content_type) = &content_type {
                if is_html(content_type) {
                    return Err(FetchError::NotTabular {
                        content_type: content_type.clone(),
                    });
                }
            }

            let bytes = resp.bytes().await?;
            let artifact = RawArtifact::from_bytes(location.clone(), bytes.to_vec(), content_type);
            tracing::info!(
                bytes = artifact.size_bytes,
                hash = %artifact.content_hash,
                mime = artifact.content_type.as_deref().unwrap_or("unknown"),
                "downloaded source"
            );
            Ok(artifact)
        }
        SourceLocation::Path(path) => {
            tracing::info!(path = %path.display(), "reading source");
            let bytes = fs::read(path).await.map_err(|source| FetchError::Io {
                path: path.clone(),
                source,
            })?;
            Ok(RawArtifact::from_bytes(location.clone(), bytes, None))
        }
    }
}

fn is_html(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.eq_ignore_ascii_case("text/html") || mime.eq_ignore_ascii_case("application/xhtml+xml")
}

/// Store the raw bytes as `<dir>/<sha256-hex>.raw`. Same content, same file.
pub async fn save_to_fs(dir: &Path, artifact: &RawArtifact) -> Result<PathBuf, FetchError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| FetchError::Io { path, source }
    };

    fs::create_dir_all(dir).await.map_err(io_err(dir))?;

    let path = dir.join(format!("{}.raw", artifact.hash_hex()));
    fs::write(&path, &artifact.bytes).await.map_err(io_err(&path))?;
    tracing::debug!(path = %path.display(), "raw artifact stored");

    Ok(path)
}
