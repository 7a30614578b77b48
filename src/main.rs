// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing::warn;

use drumsampler::audio;
use drumsampler::config::{Audio, SamplerConfig};
use drumsampler::console::{Console, ConsoleCommand};
use drumsampler::events::Events;
use drumsampler::render::render_to_wav;
use drumsampler::sampler::{self, loader, LoadWorker, PlayMode, Sampler};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A 24-voice drum sampler."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Decodes a sample and prints what the sampler would load.
    Inspect {
        /// The sample file.
        path: PathBuf,
    },
    /// Renders voices triggered together into a mono WAV file.
    Render {
        /// The sample file.
        sample: PathBuf,
        /// Where to write the WAV file.
        output: PathBuf,
        /// The sampler config. Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How much audio to render, e.g. 2s or 500ms.
        #[arg(short, long, default_value = "2s")]
        length: String,
        /// The voices to trigger, e.g. 0,3,5.
        #[arg(short, long, value_delimiter = ',', default_value = "0")]
        voices: Vec<usize>,
        /// Playback mode for the triggered voices, from -3 (backward loop) to 2 (forward loop).
        #[arg(short, long, allow_negative_numbers = true)]
        mode: Option<i32>,
        /// Playback speed for the triggered voices.
        #[arg(short, long)]
        speed: Option<f32>,
    },
    /// Plays live through the configured audio device. Commands are read from stdin.
    Play {
        /// The sampler config.
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Inspect { path } => {
            let max_frames = SamplerConfig::default().max_sample_frames();
            let decoded = loader::decode_file(&path, max_frames)?;
            let peak = decoded
                .frames
                .iter()
                .fold(0.0f32, |peak, sample| peak.max(sample.abs()));
            println!("{}:", path.display());
            println!("- Channels: {}", decoded.channels);
            println!("- Sample rate: {}", decoded.sample_rate);
            println!("- Frames: {}", decoded.frames.len());
            println!("- Duration: {:.3}s", decoded.duration().as_secs_f64());
            println!("- Peak: {:.3}", peak);
        }
        Commands::Render {
            sample,
            output,
            config,
            length,
            voices,
            mode,
            speed,
        } => {
            let config = match config {
                Some(path) => SamplerConfig::deserialize(&path)?,
                None => SamplerConfig::default(),
            };
            let length: Duration = DurationString::from_string(length)?.into();
            let (handle, mut engine) = Sampler::build(&config)?;
            handle.load_sample(&sample)?;
            for index in voices.iter() {
                let voice = handle.voice(*index)?;
                if let Some(mode) = mode {
                    voice.set_mode(PlayMode::from_raw(mode));
                }
                if let Some(speed) = speed {
                    voice.speed.set(speed);
                }
            }
            let frames = render_to_wav(&handle, &mut engine, &voices, length, &output)?;
            println!("Wrote {} frames to {}", frames, output.display());
        }
        Commands::Play { config } => play(&config)?,
    }

    Ok(())
}

fn play(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let config = SamplerConfig::deserialize(config_path)?;
    let (handle, engine) = sampler::init(&config)?;

    let events = Events::new();
    handle.subscribe(&events);

    let audio = config.audio().cloned().unwrap_or_else(|| Audio::new("default"));
    let output = audio::cpal::Output::start(&audio, config.sample_rate(), engine)?;
    let _watcher = output.watch_block_size(events.clone())?;

    let worker = LoadWorker::start(handle.clone())?;
    let console = Console::new(handle, worker, config.state_file());

    println!("Type 'help' for commands.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        for message in console.poll_loads() {
            println!("{}", message);
        }
        if line.trim().is_empty() {
            continue;
        }
        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => match console.execute(&command) {
                Ok(reply) if !reply.is_empty() => println!("{}", reply),
                Ok(_) => {}
                Err(e) => println!("{}", e),
            },
            Err(e) => println!("{}", e),
        }
        stdout.flush()?;
    }

    if let Err(e) = console.save_if_configured() {
        warn!(err = %e, "Unable to save sampler state");
    }
    Ok(())
}
