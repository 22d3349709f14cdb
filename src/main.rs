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
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mixgraph::audio::modifier::reverb::{DEFAULT_STEPS, DEFAULT_VOLUME};
use mixgraph::audio::{self, AudioEngine, InstanceListener, OutputDevice, SoundLoader};
use mixgraph::config::{load_engine_config, EngineConfig, ReverbConfig};

/// How often the play loop checks the device for faults.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A real-time sample mixer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays a sound file through the audio interface.
    Play {
        /// The path to the sound file.
        file: PathBuf,
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// The device name to play through. Overrides the config.
        #[arg(short, long)]
        device: Option<String>,
        /// Loop the sound until --seconds elapses or the process is killed.
        #[arg(short, long)]
        looped: bool,
        /// Playback speed. Negative values play in reverse.
        #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
        speed: f64,
        /// Instance volume.
        #[arg(long, default_value_t = 1.0)]
        volume: f32,
        /// Pan from -1 (left) to 1 (right).
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        pan: f32,
        /// Low-pass cutoff in Hz.
        #[arg(long)]
        low_pass: Option<f32>,
        /// High-pass cutoff in Hz.
        #[arg(long)]
        high_pass: Option<f32>,
        /// Reverb delay, e.g. 250ms. Overrides the config.
        #[arg(long)]
        reverb: Option<String>,
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<f64>,
    },
}

/// Signals the play loop when the instance finishes.
struct FinishSignal {
    sender: Sender<()>,
}

impl InstanceListener for FinishSignal {
    fn sound_looped(&self, instance: u64, loops: u32) {
        debug!(instance, loops, "Sound looped");
    }

    fn sound_finished(&self, _instance: u64) {
        let _ = self.sender.try_send(());
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

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
        Commands::Play {
            file,
            config: config_path,
            device,
            looped,
            speed,
            volume,
            pan,
            low_pass,
            high_pass,
            reverb,
            seconds,
        } => {
            let engine_config = match config_path {
                Some(path) => load_engine_config(&path)?,
                None => EngineConfig::default(),
            };
            let engine = Arc::new(AudioEngine::from_config(&engine_config));

            let mut loader = SoundLoader::new();
            let sound = loader.load(&file)?;
            let instance = Arc::new(sound.create_instance());
            instance.set_looped(looped);
            instance.set_speed(speed);
            instance.set_volume(volume);
            instance.set_pan(pan);
            instance.set_low_pass_frequency(low_pass);
            instance.set_high_pass_frequency(high_pass);

            let reverb = match reverb {
                Some(delay) => Some(ReverbConfig::new(&delay, DEFAULT_STEPS, DEFAULT_VOLUME)),
                None => engine_config.reverb().cloned(),
            };
            if let Some(reverb) = reverb {
                instance.add_modifier(Box::new(reverb.create_modifier()?));
            }

            let (sender, finished): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(1);
            instance.set_listener(Some(Arc::new(FinishSignal { sender })));

            let device_name = device.as_deref().or(engine_config.device());
            let mut output = OutputDevice::open(engine.clone(), device_name)?;
            info!(
                file = ?file,
                device = output.name(),
                duration_ms = sound.duration().as_millis(),
                "Playing"
            );

            let deadline = seconds
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| Instant::now() + Duration::from_secs_f64(seconds));
            engine.play(Arc::clone(&instance));

            loop {
                output.check()?;
                if finished.recv_timeout(POLL_INTERVAL).is_ok() {
                    info!("Playback finished");
                    break;
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    instance.stop();
                    info!("Playback time elapsed");
                    break;
                }
            }

            debug!(
                mix_us = engine.last_mix_duration().as_micros(),
                "Last mix pass"
            );
            output.dispose();
        }
    }

    Ok(())
}
