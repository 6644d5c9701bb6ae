use std::fmt::Display;

use miette::miette;

/// Errors of a pipeline cycle.
///
/// Every variant but [`Error::Miette`] only concerns the entry being processed:
/// it is logged and the entry is retried on the next cycle.
/// [`Error::Miette`] is fatal and ends the process.
#[derive(Debug)]
pub enum Error {
    /// The direct media URL could not be extracted from the page URL
    Extraction(String),

    /// The direct media URL could not be fetched to disk
    Download(String),

    /// The media container creation response did not contain an `id`
    CreateMedia(String),

    /// The media publication response did not contain an `id`
    Publish(String),

    Miette(miette::Report),
}

impl Error {
    /// Whether the error should stop the process instead of skipping the entry
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Miette(_))
    }

    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Extraction(msg) => write!(f, "Could not extract direct video URL: {msg}"),
            Error::Download(msg) => write!(f, "Download failed: {msg}"),
            Error::CreateMedia(msg) => write!(f, "Upload failed: {msg}"),
            Error::Publish(msg) => write!(f, "Publish failed: {msg}"),
            Error::Miette(report) => write!(f, "{report}"),
        }
    }
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Miette(err) => err,
            err => miette!("{err}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Return a fatal error with the given message
pub fn bail<T, D>(msg: D) -> Result<T>
where
    D: Display + std::fmt::Debug + Send + Sync + 'static,
{
    Err(Error::Miette(miette::Report::msg(msg)))
}
