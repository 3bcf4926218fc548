//! wavplay - play a WAVE file on a chosen output device.
//!
//! Lists the output devices (the default is marked `[*]`), asks for a device
//! number and a file, then plays it. Space pauses/resumes, q quits.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use stream_playback::input::read_path;
use stream_playback::{
    list_output_devices, DeviceSelection, OutputDevice, PlaybackConfig, PlaybackEvent, Player,
    TerminalInput, DEFAULT_CHUNK_FRAMES,
};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for wavplay
#[derive(Parser, Debug)]
#[command(name = "wavplay")]
#[command(about = "Stream a WAVE file to an audio output device")]
#[command(version)]
struct Args {
    /// WAVE file to play (prompted for if omitted)
    file: Option<PathBuf>,

    /// Output device number from the listing (prompted for if omitted)
    #[arg(short, long, env = "WAVPLAY_DEVICE")]
    device: Option<usize>,

    /// List output devices and exit
    #[arg(short, long)]
    list: bool,

    /// Frames per lease/commit cycle
    #[arg(long, default_value_t = DEFAULT_CHUNK_FRAMES, env = "WAVPLAY_CHUNK_FRAMES")]
    chunk_frames: u32,

    /// Render buffer duration in seconds
    #[arg(long, default_value_t = 2.0, env = "WAVPLAY_BUFFER_SECS")]
    buffer_secs: f64,

    /// Sleep this many milliseconds when the device buffer is full instead of busy-polling
    #[arg(long, env = "WAVPLAY_BACKOFF_MS")]
    backoff_ms: Option<u64>,
}

impl Args {
    fn playback_config(&self) -> Result<PlaybackConfig> {
        let buffer_duration = Duration::try_from_secs_f64(self.buffer_secs)
            .context("buffer duration must be a non-negative number of seconds")?;
        Ok(PlaybackConfig {
            chunk_frames: self.chunk_frames,
            buffer_duration,
            busy_poll_backoff: self.backoff_ms.map(Duration::from_millis),
            ..Default::default()
        })
    }
}

fn main() -> Result<ExitCode> {
    // Logs go to stderr so they never interleave with the prompts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.playback_config()?;

    let devices = list_output_devices().context("Failed to enumerate output devices")?;
    print_devices(&devices);
    if args.list {
        return Ok(ExitCode::SUCCESS);
    }

    let index = match args.device {
        Some(index) => Some(index),
        None => prompt("Select the device number: ")?.parse::<usize>().ok(),
    };
    let Some(device) = index.and_then(|i| devices.get(i)) else {
        println!("Invalid device number");
        return Ok(ExitCode::from(1));
    };

    let path = match args.file {
        Some(path) => path,
        None => PathBuf::from(read_path("Input the wave file name: ")?),
    };
    if !path.exists() {
        println!("Invalid file name");
        return Ok(ExitCode::from(1));
    }

    println!("q: quit, sp: pause/resume");
    tracing::info!(device = %device.name, path = %path.display(), "starting playback");

    let player = Player::builder()
        .device(DeviceSelection::ById(device.id.clone()))
        .config(config)
        .on_event(print_status)
        .build()?;

    let result = {
        let mut input = TerminalInput::new().context("Failed to enable raw terminal mode")?;
        player.play_file(&path, &mut input)
    };

    match result {
        Ok(report) => {
            tracing::info!(
                outcome = %report.outcome,
                cycles = report.cycles,
                "playback complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Playback failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_devices(devices: &[OutputDevice]) {
    for (i, device) in devices.iter().enumerate() {
        let mark = if device.is_default { '*' } else { ' ' };
        println!("[{mark}] {i} {}", device.name);
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Raw mode is active while events arrive, so lines end in `\r\n`.
fn print_status(event: PlaybackEvent) {
    let line = match event {
        PlaybackEvent::Paused { position } => format!("paused at {:.1}s", position.as_secs_f64()),
        PlaybackEvent::Resumed { position } => {
            format!("resumed at {:.1}s", position.as_secs_f64())
        }
        _ => return,
    };
    print!("{line}\r\n");
    let _ = io::stdout().flush();
}
