//! HTTP fetching and the download cache.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{DataError, Result};

/// Check whether a source string names a remote resource.
#[must_use]
pub fn is_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Fetch the body of a URL into memory.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    debug!("GET {}", url);
    let response = ureq::get(url)
        .call()
        .map_err(|e| DataError::Download(format!("Failed to download {}: {}", url, e)))?;

    if response.status() != 200 {
        return Err(DataError::Download(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let mut reader = response.into_reader();
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    debug!("Fetched {} bytes from {}", buffer.len(), url);
    Ok(buffer)
}

/// Download a file from URL to path.
pub fn download_file(url: &str, path: &Path) -> Result<()> {
    let buffer = fetch_bytes(url)?;
    write_file(path, &buffer)
}

/// Write `bytes` to `path` through a `.part` sibling, so `path` only ever
/// holds a complete file.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let written = File::create(&part).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&part, path)) {
        let _ = fs::remove_file(&part);
        return Err(e.into());
    }
    Ok(())
}

/// Last path segment of a URL, without query string or fragment.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    if name.is_empty() || name.contains(':') {
        return Err(DataError::InvalidInput(format!(
            "Cannot derive a file name from URL: {}",
            url
        )));
    }
    Ok(name.to_string())
}

/// Download a URL into `<cache_dir>/<subdir>/<file name>` unless already cached.
///
/// # Returns
///
/// The path of the cached file.
pub fn cached_download(url: &str, subdir: &str, cache_dir: Option<PathBuf>) -> Result<PathBuf> {
    let cache = cache_dir.unwrap_or_else(crate::cache_dir);
    let path = cache.join(subdir).join(file_name_from_url(url)?);

    if path.exists() {
        info!("Using cached {}", path.display());
        return Ok(path);
    }

    info!("Downloading {} -> {}", url, path.display());
    download_file(url, &path)?;
    Ok(path)
}
