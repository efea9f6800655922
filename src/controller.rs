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
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, warn, Level};

use crate::pack::{KeyCode, PackRepository};
use crate::player::Player;

pub mod keyboard;

/// Controller events that will trigger behavior in the player.
#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    /// A debounced key-down for the given key code.
    Key(KeyCode),

    /// Switches to the named sound pack. If the pack can't be found or
    /// loaded, the current pack stays active.
    SwitchPack(String),
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Feeds input events to a player. The controller's task is the only context
/// that touches the player.
pub struct Controller {
    handle: JoinHandle<Player>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        player: Player,
        repository: PackRepository,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move {
                Controller::trigger_events(player, repository, driver).await
            }),
        })
    }

    /// Join will block until the controller finishes, returning the player.
    pub async fn join(&mut self) -> Result<Player, JoinError> {
        (&mut self.handle).await
    }

    /// Triggers player events by watching the driver and getting events from it.
    async fn trigger_events(
        mut player: Player,
        repository: PackRepository,
        driver: Arc<dyn Driver>,
    ) -> Player {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            pack = player.sound_pack().map(|pack| pack.name()).unwrap_or("none"),
            "Controller started."
        );

        while let Some(event) = events_rx.recv().await {
            match event {
                Event::Key(key) => {
                    let played = player.play_sound(key);
                    debug!(key, played, "Key pressed.");
                }
                Event::SwitchPack(name) => {
                    // Decoding a whole pack blocks.
                    let loader = repository.clone();
                    let lookup = name.clone();
                    match tokio::task::spawn_blocking(move || loader.load(&lookup)).await {
                        Ok(Ok(Some(pack))) => {
                            if let Err(e) = player.set_sound_pack(Some(pack)) {
                                error!(
                                    pack = %name,
                                    err = %e,
                                    "Unable to prepare output for sound pack."
                                );
                            }
                        }
                        Ok(Ok(None)) => {
                            warn!(pack = %name, "Sound pack not found, keeping current pack.")
                        }
                        Ok(Err(e)) => error!(pack = %name, err = %e, "Unable to load sound pack."),
                        Err(e) => error!(pack = %name, err = %e, "Sound pack load task failed."),
                    }
                }
            }
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(err = %e, "Event monitor failed."),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop."),
        }
        player
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Arc};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        audio::mock,
        pack::{PackLoader, PackRepository},
        player::Player,
        testutil::write_pack,
    };

    use super::{Controller, Driver, Event};

    /// A driver that sends a fixed script of events and then closes.
    struct TestDriver {
        events: Mutex<Vec<Event>>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock());
            tokio::task::spawn_blocking(move || {
                for event in events {
                    assert!(events_tx.blocking_send(event).is_ok());
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let root = tempfile::tempdir()?;
        let sound = root.path().join("sound");
        write_pack(&sound.join("first"), r#"{"keys": {"1": [0, 10]}}"#)?;
        write_pack(&sound.join("second"), r#"{"keys": {"2": [100, 10]}}"#)?;
        write_pack(&sound.join("broken"), r#"{"sound": "gone.wav"}"#)?;

        let engine = Arc::new(mock::Engine::manual("mock"));
        let mut player = Player::new(engine.clone(), 8);
        player.set_sound_pack(Some(PackLoader::load(&sound.join("first"))?))?;

        let driver = Arc::new(TestDriver {
            events: Mutex::new(vec![
                Event::Key(1),
                Event::Key(2),
                Event::SwitchPack("second".to_string()),
                Event::Key(1),
                Event::Key(2),
                Event::SwitchPack("missing".to_string()),
                Event::SwitchPack("broken".to_string()),
                Event::Key(2),
            ]),
        });
        let repository = PackRepository::new(vec![root.path().to_path_buf()]);
        let mut controller = Controller::new(player, repository, driver)?;
        let player = controller.join().await?;

        assert_eq!(player.sound_pack().map(|pack| pack.name()), Some("second"));

        // Key 1 from the first pack, then key 2 twice from the second pack.
        let offsets: Vec<usize> = engine
            .submissions()
            .iter()
            .map(|submission| submission.offset)
            .collect();
        assert_eq!(offsets, vec![0, 1600, 1600]);

        // The switch destroyed the first pack's voice.
        assert_eq!(engine.channels_created(), 3);
        assert_eq!(engine.live_channels(), vec![1, 2]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_switch_with_failing_output() -> Result<(), Box<dyn Error>> {
        let root = tempfile::tempdir()?;
        let sound = root.path().join("sound");
        write_pack(&sound.join("first"), r#"{"keys": {"1": [0, 10]}}"#)?;
        write_pack(&sound.join("second"), r#"{"keys": {"1": [100, 10]}}"#)?;

        let engine = Arc::new(mock::Engine::manual("mock"));
        let mut player = Player::new(engine.clone(), 8);
        player.set_sound_pack(Some(PackLoader::load(&sound.join("first"))?))?;
        engine.set_fail_prepare(true);

        let driver = Arc::new(TestDriver {
            events: Mutex::new(vec![
                Event::Key(1),
                Event::SwitchPack("second".to_string()),
                Event::Key(1),
            ]),
        });
        let repository = PackRepository::new(vec![root.path().to_path_buf()]);
        let mut controller = Controller::new(player, repository, driver)?;
        let player = controller.join().await?;

        // The old pack was released before the output failed, so the player
        // is silent afterwards.
        assert!(player.sound_pack().is_none());
        assert_eq!(engine.submissions().len(), 1);
        assert!(engine.live_channels().is_empty());
        Ok(())
    }
}
