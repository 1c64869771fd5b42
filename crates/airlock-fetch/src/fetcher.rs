use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use airlock_log::Logger;

use crate::error::{FetchError, Result};
use crate::retry::retry_delay;

const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Places the resource named by a URL into a local directory.
pub trait Fetcher {
    /// Returns the path of the local copy inside `dest_dir`.
    fn fetch(&self, url: &str, dest_dir: &Path, log: &dyn Logger) -> Result<PathBuf>;
}

#[derive(Debug, PartialEq, Eq)]
enum Source<'a> {
    Local(PathBuf),
    Remote(&'a str),
}

fn classify(url: &str) -> Result<Source<'_>> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(Source::Local(PathBuf::from(path)));
    }
    match trimmed.split_once("://") {
        None => Ok(Source::Local(PathBuf::from(trimmed))),
        Some((scheme, _))
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            Ok(Source::Remote(trimmed))
        }
        Some(_) => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

/// Last path segment of `url`, without query or fragment.
pub fn file_name_from_url(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_suffix
        .split_once("://")
        .map_or(without_suffix, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));
    path.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// HTTP(S) downloads with bounded retries; local paths and `file://` URLs
/// are copied instead.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(retries: u32) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                source: e,
            })?;
        Ok(Self {
            client,
            retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn copy_local(&self, src: &Path, dest_dir: &Path, log: &dyn Logger) -> Result<PathBuf> {
        let metadata = fs::metadata(src).map_err(|e| FetchError::LocalSource {
            path: src.to_path_buf(),
            source: e,
        })?;
        if !metadata.is_file() {
            return Err(FetchError::LocalSource {
                path: src.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }

        let name = file_name_from_url(&src.to_string_lossy());
        let dest = dest_dir.join(name);
        if dest.exists() && fs::canonicalize(&dest).ok() == fs::canonicalize(src).ok() {
            log.debug(&format!("{} already in place", src.display()));
            return Ok(dest);
        }

        fs::create_dir_all(dest_dir).map_err(|e| FetchError::Write {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;
        airlock_fs::copy_file_with_metadata(src, &dest)?;
        log.info(&format!("copied {} to {}", src.display(), dest.display()));
        Ok(dest)
    }

    fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let http_error = |e| FetchError::Http {
            url: url.to_string(),
            source: e,
        };
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_error)?;

        let partial = dest.with_file_name(format!(
            ".{}.part",
            dest.file_name().unwrap_or_default().to_string_lossy()
        ));
        let write_error = |e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        };

        let mut file = File::create(&partial).map_err(write_error)?;
        let copied = response.copy_to(&mut file);
        drop(file);

        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(http_error(e));
            }
        };
        fs::rename(&partial, dest).map_err(|e| {
            let _ = fs::remove_file(&partial);
            write_error(e)
        })?;
        Ok(bytes)
    }

    fn download(&self, url: &str, dest_dir: &Path, log: &dyn Logger) -> Result<PathBuf> {
        fs::create_dir_all(dest_dir).map_err(|e| FetchError::Write {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;
        let dest = dest_dir.join(file_name_from_url(url));

        let attempts = self.retries.saturating_add(1);
        let mut last = String::new();
        for attempt in 1..=attempts {
            log.info(&format!("downloading {url} (attempt {attempt}/{attempts})"));
            match self.download_once(url, &dest) {
                Ok(bytes) => {
                    log.info(&format!("downloaded {bytes} bytes to {}", dest.display()));
                    return Ok(dest);
                }
                Err(e) => {
                    log.warning(&format!("download of {url} failed: {e}"));
                    last = e.to_string();
                    if attempt < attempts {
                        thread::sleep(retry_delay(attempt, self.backoff));
                    }
                }
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            url: url.to_string(),
            attempts,
            last,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest_dir: &Path, log: &dyn Logger) -> Result<PathBuf> {
        match classify(url)? {
            Source::Local(path) => self.copy_local(&path, dest_dir, log),
            Source::Remote(url) => self.download(url, dest_dir, log),
        }
    }
}
