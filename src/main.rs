mod cli;
mod config;
mod download;
mod logging;
mod outside;
mod pipeline;
mod publish;
mod record;
mod result;
mod scheduler;
mod server;

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use tracing::{info, warn};

use crate::{
    cli::Args,
    config::Config,
    download::HttpDownloader,
    logging::init_logging,
    outside::Ytdl,
    pipeline::Pipeline,
    publish::GraphPublisher,
    record::RecordStore,
    scheduler::Scheduler,
};

fn main() -> miette::Result<()> {
    // Initialize the environment & CLI
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_level)?;

    let config = Config::from(args);
    for name in config.missing_credentials() {
        warn!("{name} is not set, the Graph API will reject the uploads");
    }

    // Make sure the needed directories are created
    std::fs::create_dir_all(&config.downloads)
        .into_diagnostic()
        .wrap_err("Could not create downloads directory")?;

    let resolver = Ytdl::new()?;
    info!("Using {} to resolve video URLs", resolver.program());
    let downloader = HttpDownloader::new(config.download_timeout)?;
    let publisher = GraphPublisher::new(
        &config.graph_url,
        &config.account_id,
        &config.access_token,
        &config.caption,
    )?;
    let store = RecordStore::new(&config.record);

    server::spawn(config.downloads.clone(), config.bind)?;

    let pipeline = Pipeline::new(&config, &store, &resolver, &downloader, &publisher);
    let scheduler = Scheduler::new(config.interval, config.poll);

    info!("✅ Instagram auto-upload bot started!");
    scheduler.run_forever(|| {
        let outcome = pipeline.run_cycle()?;
        info!("Cycle done: {outcome}");
        Ok(())
    })?;

    Ok(())
}
