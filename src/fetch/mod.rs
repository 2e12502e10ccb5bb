use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::config::HttpSettings;
use crate::error::{ExplorerError, Result};

/// Performs a single GET and returns the full body.
///
/// Implementations must report non-success statuses as
/// [`ExplorerError::Transport`] and must not retry.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking reqwest client configured from [`HttpSettings`].
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let mut builder = Client::builder().user_agent(settings.user_agent.clone());
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ExplorerError::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ExplorerError::transport(url, e))?
            .error_for_status()
            .map_err(|e| ExplorerError::transport(url, e))?;
        let bytes = resp
            .bytes()
            .map_err(|e| ExplorerError::transport(url, format!("reading body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Download `url` to `local_path` unless the file already exists.
///
/// The body is written to a temporary file next to `local_path` and renamed
/// into place once complete, so a failed download never leaves a file behind.
/// Concurrent callers may both download; the last rename wins.
#[instrument(level = "info", skip(transport, local_path), fields(path = %local_path.display()))]
pub fn ensure_cached(transport: &dyn Transport, url: &str, local_path: &Path) -> Result<()> {
    if local_path.exists() {
        debug!("cache hit");
        return Ok(());
    }

    let dir = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let start = Instant::now();
    let body = transport.get(url)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(local_path).map_err(|e| e.error)?;

    info!(bytes = body.len(), elapsed = ?start.elapsed(), "downloaded");
    Ok(())
}

/// Path-addressed download cache: one flat file per source under a data
/// directory. Presence of the file is the only validity signal; delete it to
/// force a new download.
pub struct DownloadCache {
    data_dir: PathBuf,
    transport: Box<dyn Transport>,
}

impl DownloadCache {
    pub fn new(data_dir: impl Into<PathBuf>, transport: impl Transport + 'static) -> Self {
        Self {
            data_dir: data_dir.into(),
            transport: Box::new(transport),
        }
    }

    /// Cache under `data_dir` backed by a real HTTP client.
    pub fn http(data_dir: impl Into<PathBuf>, settings: &HttpSettings) -> Result<Self> {
        Ok(Self::new(data_dir, HttpTransport::new(settings)?))
    }

    pub fn path_for(&self, relative: &Path) -> PathBuf {
        self.data_dir.join(relative)
    }

    /// Make sure `url` is cached at `relative` and return the local path.
    pub fn fetch(&self, url: &str, relative: &Path) -> Result<PathBuf> {
        let path = self.path_for(relative);
        ensure_cached(self.transport.as_ref(), url, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// In-memory transport: known URLs return their body, unknown URLs
    /// return a 404-like transport error.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        bodies: HashMap<String, Vec<u8>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeTransport {
        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }

        pub fn calls(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.calls)
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| ExplorerError::transport(url, "HTTP status client error (404 Not Found)"))
        }
    }
}
