use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;

use streamforge_core::event::Event;
use streamforge_core::format::{PixelFormat, SampleFormat};
use streamforge_player::{Player, PlayerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless demonstration player for the streamforge pipeline", long_about = None)]
struct Cli {
    /// URL or path of the media to open. Demuxing is a synthetic fixture
    /// (see `Player::open`); the value only needs to be non-empty.
    #[arg(required = true)]
    source: String,

    /// How many seconds to run before stopping.
    #[arg(short, long, default_value_t = 2.0)]
    duration: f64,

    /// Seek to this position (seconds) shortly after starting playback.
    #[arg(long, value_name = "SECONDS")]
    seek: Option<f64>,

    /// Item capacity of each stream's queue.
    #[arg(long, default_value_t = 200)]
    queue_capacity: usize,

    /// Force the video leg to negotiate onto this pixel format (e.g. "rgba").
    #[arg(long, value_name = "FORMAT")]
    pixel_format: Option<String>,

    /// Force the audio leg to negotiate onto this sample format (e.g. "s16").
    #[arg(long, value_name = "FORMAT")]
    sample_format: Option<String>,

    /// Print the pipeline topology as a Mermaid graph before playing.
    #[arg(long)]
    dump_topology: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = PlayerConfig {
        queue_capacity: cli.queue_capacity,
        ..PlayerConfig::default()
    };
    if let Some(tag) = cli.pixel_format.as_deref() {
        config.preferred_pixel_format =
            Some(PixelFormat::from_tag(tag).ok_or_else(|| anyhow::anyhow!("unknown pixel format: {tag}"))?);
    }
    if let Some(tag) = cli.sample_format.as_deref() {
        config.preferred_sample_format =
            Some(SampleFormat::from_tag(tag).ok_or_else(|| anyhow::anyhow!("unknown sample format: {tag}"))?);
    }

    let player = Player::open(&cli.source, config)?;

    if cli.dump_topology {
        println!("{}", player.dump_topology());
    }

    let eos = Arc::new(AtomicBool::new(false));
    let eos_flag = eos.clone();
    player.set_event_callback(move |event| match event {
        Event::MediaEndOfFile { sender, .. } => {
            info!("end of stream reached on {sender}");
            eos_flag.store(true, Ordering::Release);
        }
        Event::ErrorOccurred { sender, message, .. } => {
            log::error!("[{sender}] {message}");
        }
        _ => {}
    });

    info!("playing {}", cli.source);
    player.play()?;

    if let Some(position) = cli.seek {
        std::thread::sleep(Duration::from_millis(200));
        info!("seeking to {position}s");
        player.seek(position)?;
    }

    let deadline = Duration::from_secs_f64(cli.duration.max(0.0));
    let start = std::time::Instant::now();
    while start.elapsed() < deadline && !eos.load(Ordering::Acquire) {
        std::thread::sleep(Duration::from_millis(50));
    }

    player.stop()?;
    info!("dropped {} video frame(s) while playing", player.video_dropped_count());

    Ok(())
}
