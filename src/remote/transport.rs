//! Remote cache transports.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Body, Client};
use reqwest::StatusCode;

use crate::util::fs::ensure_dir;
use crate::util::progress::transfer_bar;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Moves archives between the local machine and a remote cache.
pub trait RemoteTransport: Send + Sync {
    /// Download `<archive>.zip` to `dest`. Returns false if the remote does
    /// not have it.
    fn fetch(&self, archive: &str, dest: &Path) -> Result<bool>;

    fn exists(&self, archive: &str) -> Result<bool>;

    /// Store a local `.zip` file under its file name.
    fn upload(&self, file: &Path) -> Result<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

fn file_name(file: &Path) -> Result<String> {
    match file.file_name() {
        Some(name) => Ok(name.to_string_lossy().into_owned()),
        None => bail!("cannot upload {}: not a file", file.display()),
    }
}

/// Temporary sibling used while a download is in flight.
fn partial_path(dest: &Path) -> PathBuf {
    PathBuf::from(format!("{}.part", dest.display()))
}

/// A cache served over HTTP: `GET`/`HEAD`/`PUT` on `<base>/<archive>.zip`.
pub struct HttpTransport {
    base: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(HttpTransport {
            base: base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base, file_name)
    }
}

impl RemoteTransport for HttpTransport {
    fn fetch(&self, archive: &str, dest: &Path) -> Result<bool> {
        let url = self.url_for(&format!("{}.zip", archive));
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("failed to fetch {}", url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            bail!("failed to fetch {}: HTTP {}", url, response.status());
        }

        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }
        let part = partial_path(dest);
        let pb = transfer_bar(response.content_length(), format!("fetch {}", archive));
        let mut reader = pb.wrap_read(response);
        let mut out =
            File::create(&part).with_context(|| format!("failed to create {}", part.display()))?;
        io::copy(&mut reader, &mut out).with_context(|| format!("failed to download {}", url))?;
        pb.finish_and_clear();
        fs::rename(&part, dest)?;
        Ok(true)
    }

    fn exists(&self, archive: &str) -> Result<bool> {
        let url = self.url_for(&format!("{}.zip", archive));
        let response = self
            .client
            .head(&url)
            .send()
            .with_context(|| format!("failed to query {}", url))?;
        Ok(response.status().is_success())
    }

    fn upload(&self, file: &Path) -> Result<()> {
        let url = self.url_for(&file_name(file)?);
        let len = fs::metadata(file)?.len();
        let pb = transfer_bar(Some(len), format!("upload {}", file_name(file)?));
        let reader = pb.wrap_read(
            File::open(file).with_context(|| format!("failed to open {}", file.display()))?,
        );
        let response = self
            .client
            .put(&url)
            .body(Body::sized(reader, len))
            .send()
            .with_context(|| format!("failed to upload to {}", url))?;
        pb.finish_and_clear();
        if !response.status().is_success() {
            bail!("failed to upload to {}: HTTP {}", url, response.status());
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.base.clone()
    }
}

/// A cache kept in a local or mounted directory.
#[derive(Debug, Clone)]
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirTransport { root: root.into() }
    }
}

impl RemoteTransport for DirTransport {
    fn fetch(&self, archive: &str, dest: &Path) -> Result<bool> {
        let src = self.root.join(format!("{}.zip", archive));
        if !src.is_file() {
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(&src, dest)
            .with_context(|| format!("failed to copy {} to {}", src.display(), dest.display()))?;
        Ok(true)
    }

    fn exists(&self, archive: &str) -> Result<bool> {
        Ok(self.root.join(format!("{}.zip", archive)).is_file())
    }

    fn upload(&self, file: &Path) -> Result<()> {
        ensure_dir(&self.root)?;
        let dest = self.root.join(file_name(file)?);
        fs::copy(file, &dest)
            .with_context(|| format!("failed to copy {} to {}", file.display(), dest.display()))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
