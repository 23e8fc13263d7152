// Panflute - plays a folder of music through the playback engine
// Resumes where the last session left off and keeps saving as it goes

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use panflute::config::app_dir;
use panflute::{
    AudioFormat, Config, EventKind, Player, PlayerEvent, PlayerState, RodioTransport,
    SqliteStore, Track, Transport,
};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "panflute")]
#[command(about = "Plays directories of music as one playlist, resuming where you left off")]
struct Args {
    /// Files or directories to play (defaults to the configured music directories)
    paths: Vec<PathBuf>,

    /// Start over from the top when the playlist runs out
    #[arg(long = "loop")]
    repeat: bool,

    #[arg(long)]
    shuffle: bool,

    /// Volume between 0.0 and 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Pick up the previous session's track and position
    #[arg(long)]
    resume: bool,

    /// Use this config file instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,
}

fn init_logging(dev: bool) -> Result<WorkerGuard> {
    let log_dir = app_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&log_dir, "panflute.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let base_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,panflute=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);
    // dev mode mirrors everything to stderr
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}

fn collect_tracks(roots: &[PathBuf]) -> Vec<Track> {
    let mut files: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| WalkDir::new(root).follow_links(true))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| AudioFormat::from_path(path).is_supported())
        .collect();

    files.sort();
    files.into_iter().map(Track::File).collect()
}

fn describe(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.dev)?;

    info!("Panflute starting up");

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let roots = if args.paths.is_empty() {
        config.library.music_directories.clone()
    } else {
        args.paths.clone()
    };
    let tracks = collect_tracks(&roots);
    if tracks.is_empty() {
        bail!("no playable files found in {}", describe(&roots));
    }

    let transport = RodioTransport::new()?;
    if args.dev {
        for device in transport.devices() {
            let marker = if device.is_default { " [default]" } else { "" };
            info!("Output device: {} ({}){}", device.name, device.id, marker);
        }
    }
    let player = Player::new(transport, config.player.clone())?;
    let loaded = player.load_tracks(tracks);
    println!("Loaded {} tracks", loaded);

    player.set_loop(args.repeat);
    player.set_shuffle(args.shuffle);
    if let Some(volume) = args.volume {
        player.set_volume(volume)?;
    }

    player.on(EventKind::TrackStart, |event| {
        if let PlayerEvent::TrackStart { track, index } = event {
            println!("▶ {:>3}  {}", index + 1, track.display_name());
        }
    });

    let finished = Arc::new(Notify::new());
    let notify = Arc::clone(&finished);
    player.on(EventKind::PlaylistEnd, move |_| notify.notify_one());

    let store = Arc::new(SqliteStore::open(&config.state.database_path)?);
    let key = config.state.key.clone();

    if args.resume && !player.load_state(store.as_ref(), &key).await? {
        println!("Nothing to resume, starting from the top");
    }
    if !matches!(player.state(), PlayerState::Loading | PlayerState::Playing) {
        player.play_current_track()?;
    }

    let autosave = (config.state.autosave_secs > 0).then(|| {
        player.spawn_autosave(
            Arc::clone(&store),
            key.clone(),
            Duration::from_secs(config.state.autosave_secs),
        )
    });

    finished.notified().await;
    println!("Playlist finished");

    if let Some(task) = autosave {
        task.abort();
    }
    player.save_state(store.as_ref(), &key).await?;
    player.dispose();

    info!("Panflute shutting down");
    Ok(())
}

