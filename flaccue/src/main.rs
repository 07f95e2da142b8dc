mod mount;

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use flaccue_fs::cache::CacheConfig;
use flaccue_fs::fs::FlacCueFs;
use flaccue_fs::probe::FlacProbe;
use flaccue_fs::transcode::FfmpegTranscoder;

/// Read-only overlay that serves each cue track as its own WAV file.
#[derive(Parser, Debug)]
#[command(name = "flaccue", version, about)]
struct Arguments {
    /// Directory whose contents are overlaid.
    root: PathBuf,

    /// Where the overlay appears.
    mount: PathBuf,

    /// FUSE dispatch threads.
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Seconds a decoded buffer may stay idle before eviction.
    #[arg(long, default_value_t = 60)]
    idle_timeout_secs: u64,

    /// Optional cap on the aggregate bytes of decoded buffers.
    #[arg(long)]
    cache_limit_bytes: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_env("FLACCUE_LOG")
        .init();

    let args = Arguments::parse();
    log::debug!("{args:#?}");

    let root = args.root.canonicalize()?;
    let config = CacheConfig {
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
        max_bytes: args.cache_limit_bytes,
        ..CacheConfig::default()
    };
    let fs = FlacCueFs::new(
        root,
        Arc::new(FfmpegTranscoder::new()?),
        Arc::new(FlacProbe),
        config,
    );

    let options = ["-o", "ro", "-o", "allow_other", "-o", "fsname=flaccue"];
    let options: Vec<&OsStr> = options.iter().map(OsStr::new).collect();

    log::info!(
        "overlaying {} at {}",
        args.root.display(),
        args.mount.display()
    );
    fuse_mt::mount(
        fuse_mt::FuseMT::new(mount::FlacCueMount::new(fs), args.threads),
        &args.mount,
        &options,
    )?;
    Ok(())
}
