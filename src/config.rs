use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::cli::Args;

/// Runtime configuration, built once at startup and handed to every component
#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    pub account_id: String,
    pub record: PathBuf,
    pub downloads: PathBuf,
    pub public_url: String,
    pub graph_url: String,
    pub caption: String,
    pub bind: SocketAddr,
    pub interval: Duration,
    pub poll: Duration,
    pub download_timeout: Duration,
}

impl Config {
    /// Credentials that were not provided. They are not required to start,
    /// the Graph API will reject the calls instead.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.access_token.trim().is_empty() {
            missing.push("INSTAGRAM_ACCESS_TOKEN");
        }
        if self.account_id.trim().is_empty() {
            missing.push("INSTAGRAM_ACCOUNT_ID");
        }
        missing
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            access_token: args.access_token,
            account_id: args.account_id,
            record: args.record,
            downloads: args.downloads,
            public_url: args.public_url,
            graph_url: args.graph_url,
            caption: args.caption,
            bind: args.bind,
            interval: Duration::from_secs(args.interval),
            // A zero tick would spin the scheduler
            poll: Duration::from_secs(args.poll.max(1)),
            download_timeout: Duration::from_secs(args.download_timeout),
        }
    }
}
