use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    time::Duration,
};

use miette::{IntoDiagnostic, WrapErr};
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::result::{Error, Result};

const CHUNK_SIZE: usize = 8192;

/// Interface for fetching a direct media URL to a local file
pub trait MediaDownloader {
    /// Download the body behind `url` to `dest`.
    ///
    /// On failure no file is left at `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP downloader
#[derive(Debug)]
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .into_diagnostic()
            .wrap_err("Could not build download HTTP client")?;

        Ok(Self { client })
    }

    fn fetch_to(&self, url: &str, dest: &Path) -> std::result::Result<u64, String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|err| err.to_string())?;

        let file = File::create(dest)
            .map_err(|err| format!("could not create {}: {err}", dest.display()))?;
        let mut writer = BufWriter::new(file);

        let mut buf = [0u8; CHUNK_SIZE];
        let mut written = 0;
        loop {
            let n = response.read(&mut buf).map_err(|err| err.to_string())?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).map_err(|err| err.to_string())?;
            written += n as u64;
        }
        writer.flush().map_err(|err| err.to_string())?;

        Ok(written)
    }
}

impl MediaDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        match self.fetch_to(url, dest) {
            Ok(written) => {
                debug!("Wrote {written} bytes to {}", dest.display());
                Ok(())
            }
            Err(msg) => {
                // Do not leave a truncated file around
                if dest.exists() {
                    if let Err(err) = std::fs::remove_file(dest) {
                        warn!("Could not delete {}: {err}", dest.display());
                    }
                }
                Err(Error::Download(msg))
            }
        }
    }
}
