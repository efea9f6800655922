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
use clap::{crate_version, Parser, Subcommand};
use keyclick::audio;
use keyclick::config::Settings;
use keyclick::controller::{keyboard, Controller};
use keyclick::pack::{PackLoader, PackRepository};
use keyclick::player::Player;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when the audio engine can't be initialized.
const ENGINE_FAILURE: u8 = 2;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Plays a sound on every key press."
)]
struct Cli {
    /// The path to the settings file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts playing the sound pack. Key codes are read from stdin.
    Start {
        /// The sound pack to use instead of the configured one.
        #[arg(short, long)]
        pack: Option<String>,
    },
    /// Lists the installed sound packs.
    Packs {},
    /// Loads the sound pack in the given directory and describes it.
    Verify {
        /// The path to the pack directory.
        path: PathBuf,
    },
    /// Lists the available audio output devices.
    Devices {},
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Start { pack } => {
            let engine = match audio::get_engine(settings.device()) {
                Ok(engine) => engine,
                Err(e) => {
                    error!(err = %e, "Unable to initialize the audio engine");
                    return Ok(ExitCode::from(ENGINE_FAILURE));
                }
            };

            let repository = PackRepository::with_default_roots(settings.search_paths());
            let name = pack.as_deref().unwrap_or(settings.pack());
            let pack = match repository.load(name) {
                Ok(Some(pack)) => Some(pack),
                Ok(None) => {
                    warn!(pack = name, "Sound pack not found, keys will be silent");
                    None
                }
                Err(e) => {
                    error!(pack = name, err = %e, "Unable to load sound pack, keys will be silent");
                    None
                }
            };

            let mut player = Player::new(engine, settings.max_voices());
            if let Err(e) = player.set_sound_pack(pack) {
                error!(err = %e, "Unable to open the audio output for the sound pack");
                return Ok(ExitCode::from(ENGINE_FAILURE));
            }

            let mut controller =
                Controller::new(player, repository, Arc::new(keyboard::Driver::new()))?;
            let mut player = controller.join().await?;
            player.clear_sound_pack();
        }
        Commands::Packs {} => {
            let repository = PackRepository::with_default_roots(settings.search_paths());
            let packs = repository.list();

            if packs.is_empty() {
                println!("No sound packs found.");
                return Ok(ExitCode::SUCCESS);
            }

            println!("Sound packs (count: {}):", packs.len());
            for pack in packs {
                println!("- {}", pack);
            }
        }
        Commands::Verify { path } => {
            let pack = PackLoader::load(&path)?;

            println!("Pack: {}", pack.name());
            println!("Format: {}", pack.format());
            println!("Duration: {:?}", pack.resource().duration());
            println!("Memory: {} bytes", pack.memory_size());
            println!("Distinct clips: {}", pack.distinct_clips().len());
            println!("Keys (count: {}):", pack.key_count());
            for key in pack.keys() {
                if let Some(clip) = pack.clip(key) {
                    println!(
                        "- {} ({:#06x}): offset {}, {} bytes, {:?}",
                        key,
                        key,
                        clip.offset(),
                        clip.len(),
                        clip.duration()
                    );
                }
            }
        }
        Commands::Devices {} => {
            let devices = match audio::list_devices() {
                Ok(devices) => devices,
                Err(e) => {
                    error!(err = %e, "Unable to list audio devices");
                    return Ok(ExitCode::from(ENGINE_FAILURE));
                }
            };

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(ExitCode::SUCCESS);
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
