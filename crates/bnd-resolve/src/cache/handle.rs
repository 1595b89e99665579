//! Caching resource handles.
//!
//! A handle points at one artifact. Local `file:` URLs are served in place;
//! remote URLs are mirrored under a cache directory, with the server's ETag
//! kept next to the cached file as `<file>.etag`:
//!
//! ```text
//! <cache>/<url-encoded scheme://host:port/dir>/<file>
//! <cache>/<url-encoded scheme://host:port/dir>/<file>.etag
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use url::Url;

use super::{sha256_file, sha256_hex, write_atomic};
use crate::error::{BndError, Result};
use crate::http::{FetchResponse, UrlConnector};

const ETAG_SUFFIX: &str = ".etag";
const DEFAULT_FILE_NAME: &str = "index";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachingMode {
    /// Use a cached copy whenever one exists
    #[default]
    PreferCache,
    /// Revalidate with the server on every request, falling back to the cache
    PreferRemote,
}

/// Where a handle's content currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Local,
    RemoteCached,
    Remote,
}

#[derive(Debug)]
enum Target {
    Local(PathBuf),
    Remote { cached: PathBuf, etag: PathBuf },
}

pub struct CachingResourceHandle {
    url: Url,
    name: String,
    target: Target,
    mode: CachingMode,
    connector: Arc<dyn UrlConnector>,
    sha256: Option<String>,
    lock: Mutex<()>,
}

impl CachingResourceHandle {
    /// Classify `url` as local or remote. Remote URLs need a cache directory.
    pub fn new(
        url: Url,
        cache_dir: Option<&Path>,
        connector: Arc<dyn UrlConnector>,
        mode: CachingMode,
    ) -> Result<Self> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();

        let target = if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| BndError::Config(format!("not a local file URL: {}", url)))?;
            Target::Local(path)
        } else {
            let cache_dir = cache_dir.ok_or_else(|| BndError::NoCacheDirectory(url.to_string()))?;
            let cached = Self::cache_path(cache_dir, &url, &name);
            let mut etag = cached.clone().into_os_string();
            etag.push(ETAG_SUFFIX);
            Target::Remote {
                cached,
                etag: PathBuf::from(etag),
            }
        };

        Ok(Self {
            url,
            name,
            target,
            mode,
            connector,
            sha256: None,
            lock: Mutex::new(()),
        })
    }

    /// Expect the artifact to have this SHA-256 (hex). A cached file with a
    /// different digest is downloaded again.
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into().to_ascii_lowercase());
        self
    }

    fn cache_path(cache_dir: &Path, url: &Url, name: &str) -> PathBuf {
        let mut base = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
        if let Some(port) = url.port() {
            base.push_str(&format!(":{}", port));
        }
        let path = url.path();
        let dir = match path.rfind('/') {
            Some(idx) => &path[..idx],
            None => "",
        };
        base.push_str(dir);

        let file = match url.query() {
            Some(query) => format!("{}?{}", name, query),
            None => name.to_string(),
        };

        cache_dir
            .join(urlencoding::encode(&base).as_ref())
            .join(urlencoding::encode(&file).as_ref())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> CachingMode {
        self.mode
    }

    /// The cached (or local) file path, whether or not it exists yet
    pub fn cached_file(&self) -> &Path {
        match &self.target {
            Target::Local(path) => path,
            Target::Remote { cached, .. } => cached,
        }
    }

    /// The sidecar file holding the ETag; `None` for local resources
    pub fn etag_file(&self) -> Option<&Path> {
        match &self.target {
            Target::Local(_) => None,
            Target::Remote { etag, .. } => Some(etag),
        }
    }

    pub fn location(&self) -> Location {
        match &self.target {
            Target::Local(_) => Location::Local,
            Target::Remote { cached, .. } if cached.is_file() => Location::RemoteCached,
            Target::Remote { .. } => Location::Remote,
        }
    }

    /// Make the content available as a local file and return its path.
    ///
    /// Concurrent requests on one handle are serialized.
    pub fn request(&self) -> Result<PathBuf> {
        let (cached, etag_file) = match &self.target {
            Target::Local(path) => {
                return if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(BndError::LocalFileMissing(path.clone()))
                };
            }
            Target::Remote { cached, etag } => (cached, etag),
        };

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.mode {
            CachingMode::PreferCache => self.request_prefer_cache(cached, etag_file),
            CachingMode::PreferRemote => self.request_prefer_remote(cached, etag_file),
        }
    }

    fn request_prefer_cache(&self, cached: &Path, etag_file: &Path) -> Result<PathBuf> {
        if cached.is_file() {
            if self.cached_digest_matches(cached) {
                return Ok(cached.to_path_buf());
            }
            log::debug!("Cached copy of {} has an unexpected digest, downloading again", self.url);
        }

        match self.connector.fetch(&self.url, None) {
            Ok(FetchResponse::Content { body, etag }) => {
                self.store(cached, etag_file, &body, etag.as_deref())?;
                Ok(cached.to_path_buf())
            }
            Ok(FetchResponse::NotModified) => Err(self.download_failed(cached, "unexpected 304 response")),
            Err(e) => Err(self.download_failed(cached, &e.to_string())),
        }
    }

    fn request_prefer_remote(&self, cached: &Path, etag_file: &Path) -> Result<PathBuf> {
        let have_cache = cached.is_file();
        let stored_etag = if have_cache {
            fs::read_to_string(etag_file)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        } else {
            None
        };

        match self.connector.fetch(&self.url, stored_etag.as_deref()) {
            Ok(FetchResponse::NotModified) if have_cache => Ok(cached.to_path_buf()),
            Ok(FetchResponse::NotModified) => Err(self.download_failed(cached, "unexpected 304 response")),
            Ok(FetchResponse::Content { body, etag }) => {
                self.store(cached, etag_file, &body, etag.as_deref())?;
                Ok(cached.to_path_buf())
            }
            Err(e) if have_cache => {
                log::warn!(
                    "Failed to refresh {} ({}), using cached copy {}",
                    self.url,
                    e,
                    cached.display()
                );
                Ok(cached.to_path_buf())
            }
            Err(e) => Err(self.download_failed(cached, &e.to_string())),
        }
    }

    fn cached_digest_matches(&self, cached: &Path) -> bool {
        match &self.sha256 {
            None => true,
            Some(expected) => sha256_file(cached).map(|actual| actual == *expected).unwrap_or(false),
        }
    }

    /// Replace the cached file and its ETag sidecar.
    ///
    /// The old ETag is removed first so a failure part way never pairs new
    /// content with a stale ETag, or stale content with a new one.
    fn store(&self, cached: &Path, etag_file: &Path, body: &[u8], etag: Option<&str>) -> Result<()> {
        if let Some(expected) = &self.sha256 {
            let actual = sha256_hex(body);
            if actual != *expected {
                return Err(BndError::ChecksumMismatch {
                    url: self.url.to_string(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let io_failed = |e: io::Error| self.download_failed(cached, &e.to_string());

        match fs::remove_file(etag_file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_failed(e)),
        }
        write_atomic(cached, body).map_err(io_failed)?;
        if let Some(etag) = etag {
            write_atomic(etag_file, etag.as_bytes()).map_err(io_failed)?;
        }
        Ok(())
    }

    fn download_failed(&self, cached: &Path, reason: &str) -> BndError {
        BndError::DownloadFailed {
            url: self.url.to_string(),
            cache_file: cached.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl std::fmt::Debug for CachingResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingResourceHandle")
            .field("url", &self.url.as_str())
            .field("target", &self.target)
            .field("mode", &self.mode)
            .finish()
    }
}
