use std::process::{Command, Output};

use super::command::{assert_success_command, run_command, Capture, YT_DL, YT_DLP};
use crate::result::{bail, Error, Result};

/// Interface for turning a video page URL into a direct media URL
pub trait MediaResolver {
    /// Extract a direct, fetchable URL of the best combined audio/video stream.
    ///
    /// Playlists are never expanded: the page URL is considered a single video.
    /// Any extraction failure is an [`Error::Extraction`].
    fn resolve(&self, page_url: &str) -> Result<String>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self> {
        if assert_success_command(YT_DLP, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DLP })
        } else if assert_success_command(YT_DL, |cmd| cmd.arg("--version")).is_ok() {
            Ok(Self { program: YT_DL })
        } else {
            bail("Neither yt-dlp nor youtube-dl found")
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Run the command and turn any failure into an [`Error::Extraction`],
    /// mentioning when the stream is unavailable.
    fn run_extraction<F>(&self, f: F) -> Result<Output>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, Capture::STDOUT | Capture::STDERR)
            .map_err(|err| Error::Extraction(err.to_string()))?;

        if res.status.success() {
            return Ok(res);
        }

        let stderr = String::from_utf8_lossy(&res.stderr);
        let error_line = stderr.lines().find(|line| line.starts_with("ERROR:"));
        let msg = match error_line {
            Some(line) if line.to_lowercase().contains("unavailable") => {
                format!("stream unavailable ({line})")
            }
            Some(line) => line.to_owned(),
            None => format!("{} exited with {}", self.program, res.status),
        };
        Err(Error::Extraction(msg))
    }
}

impl MediaResolver for Ytdl {
    fn resolve(&self, page_url: &str) -> Result<String> {
        let res = self.run_extraction(|cmd| {
            cmd.arg("-q")
                .arg("--no-warnings")
                .args(["-f", "best"])
                .arg("--no-playlist")
                .arg("--get-url")
                .arg("--")
                .arg(page_url)
        })?;

        first_url(&String::from_utf8_lossy(&res.stdout))
            .ok_or_else(|| Error::Extraction(format!("no URL printed for {page_url}")))
    }
}

/// `--get-url` prints one URL per selected format, take the first one
fn first_url(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}
