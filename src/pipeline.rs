use std::{fmt::Display, path::PathBuf};

use miette::WrapErr;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    download::MediaDownloader,
    outside::MediaResolver,
    publish::MediaPublisher,
    record::RecordStore,
    result::{Error, Result},
    server::public_url,
};

/// What a pipeline cycle ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every entry of the record is already uploaded
    NothingPending,

    /// Every pending entry failed before reaching the publication step
    AllSkipped,

    /// The publication of this entry was attempted but failed
    PublishFailed { url: String },

    /// This entry has been published and marked as uploaded
    Uploaded { url: String, media_id: String },
}

impl Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::NothingPending => write!(f, "nothing to upload"),
            CycleOutcome::AllSkipped => write!(f, "every pending video was skipped"),
            CycleOutcome::PublishFailed { url } => write!(f, "could not publish {url}"),
            CycleOutcome::Uploaded { url, media_id } => write!(f, "published {url} as {media_id}"),
        }
    }
}

/// One resolve, download, publish pass over the record.
///
/// Pending entries are tried in order. An entry failing to resolve or
/// download is skipped for the cycle. The cycle stops after the first
/// publication attempt, so at most one entry gets uploaded per cycle.
pub struct Pipeline<'a> {
    config: &'a Config,
    store: &'a RecordStore,
    resolver: &'a dyn MediaResolver,
    downloader: &'a dyn MediaDownloader,
    publisher: &'a dyn MediaPublisher,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a RecordStore,
        resolver: &'a dyn MediaResolver,
        downloader: &'a dyn MediaDownloader,
        publisher: &'a dyn MediaPublisher,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
            downloader,
            publisher,
        }
    }

    /// Run a cycle. Only fatal errors are returned (record file, unreachable
    /// Graph API or unexpected response shape), every other failure is
    /// logged and reflected in the outcome.
    pub fn run_cycle(&self) -> Result<CycleOutcome> {
        debug!("Loading {}", self.store.path().display());
        let mut record = self.store.load()?;

        let pending = record.pending();
        if pending == 0 {
            info!("No video left to upload");
            return Ok(CycleOutcome::NothingPending);
        }
        info!("{pending}/{} videos waiting for upload", record.videos.len());

        let mut outcome = CycleOutcome::AllSkipped;
        let mut published_file = None;

        for entry in record.videos.iter_mut().filter(|v| !v.uploaded) {
            info!("Processing: {}", entry.url);

            match self.process(&entry.url) {
                Ok((file, media_id)) => {
                    info!("✅ Upload successful! Media {media_id}");
                    entry.uploaded = true;
                    published_file = Some(file);
                    outcome = CycleOutcome::Uploaded {
                        url: entry.url.clone(),
                        media_id,
                    };
                    break;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err @ (Error::Extraction(_) | Error::Download(_))) => {
                    warn!("❌ {err}. Skipping {} for this cycle", entry.url);
                }
                Err(err) => {
                    error!("❌ {err}");
                    outcome = CycleOutcome::PublishFailed {
                        url: entry.url.clone(),
                    };
                    break;
                }
            }
        }

        if let Some(file) = published_file {
            self.store
                .save(&record)
                .wrap_err("Could not mark the video as uploaded")?;

            match std::fs::remove_file(&file) {
                Ok(()) => info!("Deleted file: {}", file.display()),
                Err(err) => warn!("Could not delete {}: {err}", file.display()),
            }
        }

        Ok(outcome)
    }

    /// Resolve, download and publish a single video.
    /// Return the local file and the published media ID.
    fn process(&self, page_url: &str) -> Result<(PathBuf, String)> {
        let direct_url = self.resolver.resolve(page_url)?;

        let filename = media_filename();
        let file = self.config.downloads.join(&filename);
        info!("Downloading to {}", file.display());
        self.downloader.download(&direct_url, &file)?;

        let video_url = public_url(&self.config.public_url, &filename);
        info!("Uploading: {video_url}");
        match self.publisher.publish(&video_url) {
            Ok(media_id) => Ok((file, media_id)),
            Err(err) => {
                warn!("Keeping {} on disk", file.display());
                Err(err)
            }
        }
    }
}

/// Timestamped name of a downloaded video
fn media_filename() -> String {
    format!("video_{}.mp4", OffsetDateTime::now_utc().unix_timestamp())
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, path::Path, time::Duration};

    use tempfile::TempDir;

    use super::*;
    use crate::record::{Record, VideoEntry};

    #[derive(Default)]
    struct FakeResolver {
        failing: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl MediaResolver for FakeResolver {
        fn resolve(&self, page_url: &str) -> Result<String> {
            self.calls.borrow_mut().push(page_url.to_owned());
            if self.failing.contains(&page_url) {
                Err(Error::Extraction("unsupported URL".into()))
            } else {
                Ok(format!("https://cdn.example/{page_url}"))
            }
        }
    }

    #[derive(Default)]
    struct FakeDownloader {
        fail: bool,
        calls: RefCell<Vec<String>>,
    }

    impl MediaDownloader for FakeDownloader {
        fn download(&self, url: &str, dest: &Path) -> Result<()> {
            self.calls.borrow_mut().push(url.to_owned());
            if self.fail {
                return Err(Error::Download("404 Not Found".into()));
            }
            std::fs::write(dest, b"fake video").unwrap();
            Ok(())
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Step {
        Success,
        CreateFails,
        PublishFails,
        BadResponse,
    }

    struct FakePublisher {
        step: Step,
        downloads: PathBuf,
        calls: RefCell<Vec<String>>,
    }

    impl MediaPublisher for FakePublisher {
        fn publish(&self, video_url: &str) -> Result<String> {
            self.calls.borrow_mut().push(video_url.to_owned());

            // The file must be there while the platform fetches it
            let filename = video_url.rsplit('/').next().unwrap();
            assert!(self.downloads.join(filename).exists());

            match self.step {
                Step::Success => Ok("media-1".to_owned()),
                Step::CreateFails => Err(Error::CreateMedia(r#"{"error": {}}"#.into())),
                Step::PublishFails => Err(Error::Publish(r#"{"error": {}}"#.into())),
                Step::BadResponse => crate::result::bail("Graph API response is not JSON"),
            }
        }
    }

    struct Harness {
        _dir: TempDir,
        config: Config,
        store: RecordStore,
        resolver: FakeResolver,
        downloader: FakeDownloader,
        publisher: FakePublisher,
    }

    impl Harness {
        fn new(videos: &[(&str, bool)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let downloads = dir.path().join("downloads");
            std::fs::create_dir(&downloads).unwrap();

            let config = Config {
                access_token: "token".into(),
                account_id: "1789".into(),
                record: dir.path().join("videos.json"),
                downloads: downloads.clone(),
                public_url: "https://host.example".into(),
                graph_url: "http://127.0.0.1:9".into(),
                caption: "caption".into(),
                bind: "127.0.0.1:0".parse().unwrap(),
                interval: Duration::from_secs(60),
                poll: Duration::from_secs(1),
                download_timeout: Duration::from_secs(1),
            };

            let store = RecordStore::new(&config.record);
            let record = Record::new(
                videos
                    .iter()
                    .map(|(url, uploaded)| VideoEntry::new(*url, *uploaded))
                    .collect(),
            );
            store.save(&record).unwrap();

            Self {
                _dir: dir,
                config,
                store,
                resolver: FakeResolver::default(),
                downloader: FakeDownloader::default(),
                publisher: FakePublisher {
                    step: Step::Success,
                    downloads,
                    calls: RefCell::default(),
                },
            }
        }

        fn run(&self) -> Result<CycleOutcome> {
            Pipeline::new(
                &self.config,
                &self.store,
                &self.resolver,
                &self.downloader,
                &self.publisher,
            )
            .run_cycle()
        }

        fn uploaded(&self) -> Vec<bool> {
            let record = self.store.load().unwrap();
            record.videos.iter().map(|v| v.uploaded).collect()
        }

        fn downloaded_files(&self) -> usize {
            std::fs::read_dir(&self.config.downloads).unwrap().count()
        }
    }

    #[test]
    fn successful_chain_marks_entry_uploaded() {
        let h = Harness::new(&[("A", false)]);

        let outcome = h.run().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Uploaded {
                url: "A".into(),
                media_id: "media-1".into()
            }
        );
        assert_eq!(h.uploaded(), vec![true]);
        assert_eq!(h.downloader.calls.borrow().as_slice(), ["https://cdn.example/A"]);

        let published = h.publisher.calls.borrow();
        assert!(published[0].starts_with("https://host.example/videos/video_"));
        assert!(published[0].ends_with(".mp4"));

        // Deleted once published
        assert_eq!(h.downloaded_files(), 0);
    }

    #[test]
    fn only_first_pending_entry_is_processed() {
        let h = Harness::new(&[("A", true), ("B", false), ("C", false)]);

        h.run().unwrap();
        assert_eq!(h.uploaded(), vec![true, true, false]);
        assert_eq!(h.resolver.calls.borrow().as_slice(), ["B"]);
    }

    #[test]
    fn nothing_pending_makes_no_call_and_no_write() {
        let h = Harness::new(&[]);
        let compact = r#"{"videos":[{"url":"A","uploaded":true}]}"#;
        std::fs::write(&h.config.record, compact).unwrap();

        assert_eq!(h.run().unwrap(), CycleOutcome::NothingPending);
        assert!(h.resolver.calls.borrow().is_empty());
        assert!(h.downloader.calls.borrow().is_empty());
        assert!(h.publisher.calls.borrow().is_empty());
        assert_eq!(std::fs::read_to_string(&h.config.record).unwrap(), compact);
    }

    #[test]
    fn resolve_failure_skips_to_next_pending_entry() {
        let mut h = Harness::new(&[("A", false), ("B", false)]);
        h.resolver.failing = vec!["A"];

        let outcome = h.run().unwrap();
        assert!(matches!(outcome, CycleOutcome::Uploaded { url, .. } if url == "B"));
        assert_eq!(h.uploaded(), vec![false, true]);
        assert_eq!(h.downloader.calls.borrow().as_slice(), ["https://cdn.example/B"]);
    }

    #[test]
    fn resolve_failure_downloads_nothing() {
        let mut h = Harness::new(&[("A", false)]);
        h.resolver.failing = vec!["A"];
        let before = std::fs::read_to_string(&h.config.record).unwrap();

        assert_eq!(h.run().unwrap(), CycleOutcome::AllSkipped);
        assert_eq!(h.uploaded(), vec![false]);
        assert!(h.downloader.calls.borrow().is_empty());
        assert!(h.publisher.calls.borrow().is_empty());
        assert_eq!(std::fs::read_to_string(&h.config.record).unwrap(), before);
    }

    #[test]
    fn download_failure_publishes_nothing() {
        let mut h = Harness::new(&[("A", false)]);
        h.downloader.fail = true;

        assert_eq!(h.run().unwrap(), CycleOutcome::AllSkipped);
        assert_eq!(h.uploaded(), vec![false]);
        assert!(h.publisher.calls.borrow().is_empty());
    }

    #[test]
    fn create_failure_keeps_file_and_entry() {
        let mut h = Harness::new(&[("A", false), ("B", false)]);
        h.publisher.step = Step::CreateFails;

        assert_eq!(
            h.run().unwrap(),
            CycleOutcome::PublishFailed { url: "A".into() }
        );
        assert_eq!(h.uploaded(), vec![false, false]);
        assert_eq!(h.downloaded_files(), 1);
        // The cycle stops at the first publication attempt
        assert_eq!(h.resolver.calls.borrow().as_slice(), ["A"]);
    }

    #[test]
    fn publish_failure_keeps_file_and_entry() {
        let mut h = Harness::new(&[("A", false)]);
        h.publisher.step = Step::PublishFails;

        assert_eq!(
            h.run().unwrap(),
            CycleOutcome::PublishFailed { url: "A".into() }
        );
        assert_eq!(h.uploaded(), vec![false]);
        assert_eq!(h.downloaded_files(), 1);
    }

    #[test]
    fn unexpected_response_is_fatal() {
        let mut h = Harness::new(&[("A", false), ("B", false)]);
        h.publisher.step = Step::BadResponse;

        assert!(h.run().unwrap_err().is_fatal());
        assert_eq!(h.uploaded(), vec![false, false]);
        assert_eq!(h.downloaded_files(), 1);
    }

    #[test]
    fn failed_entry_is_retried_next_cycle() {
        let mut h = Harness::new(&[("A", false)]);
        h.publisher.step = Step::PublishFails;
        h.run().unwrap();

        h.publisher.step = Step::Success;
        h.run().unwrap();
        assert_eq!(h.uploaded(), vec![true]);
        assert_eq!(h.resolver.calls.borrow().as_slice(), ["A", "A"]);
    }

    #[test]
    fn unreadable_record_is_fatal() {
        let h = Harness::new(&[]);
        std::fs::write(&h.config.record, "{").unwrap();

        assert!(h.run().unwrap_err().is_fatal());
    }

    #[test]
    fn outcome_summary() {
        let outcome = CycleOutcome::Uploaded {
            url: "https://v/1".into(),
            media_id: "42".into(),
        };
        assert_eq!(outcome.to_string(), "published https://v/1 as 42");
    }

    #[test]
    fn media_filename_is_timestamped() {
        let name = media_filename();
        let ts = name
            .strip_prefix("video_")
            .and_then(|s| s.strip_suffix(".mp4"))
            .unwrap();
        assert!(ts.parse::<i64>().unwrap() > 0);
    }
}
