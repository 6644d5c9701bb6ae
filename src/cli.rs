use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use tracing::Level;

macro_rules! arg_env {
    ($v:literal) => {
        concat!("REELPOST_", $v)
    };
}

/// Republish web videos as Instagram Reels.
///
/// Every cycle, take the first video of the record not uploaded yet,
/// download it, serve it over HTTP and ask the Graph API to publish it.
/// Every option can also be set from the environment or a `.env` file.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// The Graph API access token
    #[arg(long, env = "INSTAGRAM_ACCESS_TOKEN", default_value = "", hide_env_values = true)]
    pub access_token: String,

    /// The Instagram account publishing the videos
    #[arg(long, env = "INSTAGRAM_ACCOUNT_ID", default_value = "")]
    pub account_id: String,

    /// The path to the JSON record listing the videos and their upload status
    #[arg(long, default_value = "videos.json", env = arg_env!("RECORD"))]
    pub record: PathBuf,

    /// The directory where videos are downloaded and served from
    #[arg(long, default_value = "downloads", env = arg_env!("DOWNLOADS"))]
    pub downloads: PathBuf,

    /// The externally reachable base URL of the file server
    #[arg(
        long,
        default_value = "https://your-render-app.onrender.com",
        env = arg_env!("PUBLIC_URL")
    )]
    pub public_url: String,

    /// The versioned Graph API base URL
    #[arg(
        long,
        default_value = "https://graph.facebook.com/v18.0",
        env = arg_env!("GRAPH_URL")
    )]
    pub graph_url: String,

    /// The caption of every published video
    #[arg(long, default_value = "🔥 Trending video! #viral", env = arg_env!("CAPTION"))]
    pub caption: String,

    /// The address the file server listens on
    #[arg(long, default_value = "0.0.0.0:5000", env = arg_env!("BIND"))]
    pub bind: SocketAddr,

    /// Seconds between two cycles
    #[arg(long, default_value_t = 12 * 60 * 60, env = arg_env!("INTERVAL"))]
    pub interval: u64,

    /// Seconds between two checks of whether a cycle is due
    #[arg(long, default_value_t = 10, env = arg_env!("POLL"))]
    pub poll: u64,

    /// Seconds before a video download is abandoned
    #[arg(long, default_value_t = 30, env = arg_env!("DOWNLOAD_TIMEOUT"))]
    pub download_timeout: u64,

    /// The maximum log level. `RUST_LOG` directives take precedence
    #[arg(long, default_value_t = Level::INFO, env = arg_env!("LOG_LEVEL"))]
    pub log_level: Level,
}
