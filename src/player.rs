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
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{Engine, EngineError};
use crate::pack::{KeyCode, SoundPack};

mod voice;

pub use voice::{Completion, IdleQueue, Voice};

/// Plays the active sound pack's clips through a bounded pool of voices.
///
/// A voice is idle until a key triggers it and becomes idle again when the
/// engine signals that its clip finished. When every voice is busy further
/// keys are skipped rather than queued.
///
/// The player is owned by the input context. Only the idle queue is shared
/// with the engine's completion context.
pub struct Player {
    engine: Arc<dyn Engine>,
    capacity: usize,
    /// Every voice created since the pool was last destroyed, indexed by the
    /// voice number carried in its completion.
    voices: Vec<Voice>,
    idle: Arc<IdleQueue>,
    pack: Option<SoundPack>,
}

impl Player {
    /// Creates a player with no sound pack and room for `capacity` voices.
    pub fn new(engine: Arc<dyn Engine>, capacity: usize) -> Player {
        Player {
            engine,
            capacity: capacity.max(1),
            voices: Vec::new(),
            idle: Arc::new(IdleQueue::new()),
            pack: None,
        }
    }

    /// Replaces the active sound pack. Every voice is destroyed before the
    /// previous pack is released, then the engine is prepared for the new
    /// pack's format. New voices are created on demand.
    ///
    /// If the engine can't be prepared the new pack is dropped and the player
    /// is left without one.
    pub fn set_sound_pack(&mut self, pack: Option<SoundPack>) -> Result<(), EngineError> {
        self.release();

        let Some(pack) = pack else {
            info!("No sound pack, keys will be silent");
            return Ok(());
        };
        self.engine.prepare(pack.format())?;

        info!(
            pack = pack.name(),
            format = %pack.format(),
            keys = pack.key_count(),
            "Using sound pack"
        );
        self.pack = Some(pack);
        Ok(())
    }

    /// Releases the active sound pack.
    pub fn clear_sound_pack(&mut self) {
        self.release();
        info!("Sound pack cleared");
    }

    fn release(&mut self) {
        self.destroy_all_voices();
        drop(self.pack.take());
    }

    pub fn sound_pack(&self) -> Option<&SoundPack> {
        self.pack.as_ref()
    }

    /// Plays the clip mapped to the given key. Returns false without blocking
    /// if the key isn't mapped, every voice is busy or the engine fails.
    pub fn play_sound(&mut self, key: KeyCode) -> bool {
        let Some(pack) = &self.pack else {
            debug!(key, "No sound pack");
            return false;
        };
        let Some(clip) = pack.clip(key).map(Arc::clone) else {
            debug!(key, "Key is not mapped");
            return false;
        };
        let format = pack.format();

        let index = match self.idle.pop() {
            Some(index) => index,
            None if self.voices.len() < self.capacity => {
                let index = self.voices.len();
                let completion = Completion::new(index, self.idle.generation(), self.idle.clone());
                match self.engine.create_channel(format, completion) {
                    Ok(channel) => {
                        debug!(voice = index, "Created voice");
                        self.voices.push(Voice::new(channel));
                        index
                    }
                    Err(e) => {
                        warn!(key, err = %e, "Unable to create voice");
                        return false;
                    }
                }
            }
            None => {
                debug!(key, voices = self.voices.len(), "All voices are busy");
                return false;
            }
        };

        let Some(voice) = self.voices.get_mut(index) else {
            warn!(voice = index, "Idle voice does not exist");
            return false;
        };
        match voice.play(&clip) {
            Ok(()) => true,
            Err(e) => {
                // The voice keeps its slot but never becomes idle again.
                warn!(key, voice = index, err = %e, "Unable to play sound");
                false
            }
        }
    }

    /// Destroys every voice. Completions still in flight for the destroyed
    /// voices are ignored.
    pub fn destroy_all_voices(&mut self) {
        self.idle.reset();
        if !self.voices.is_empty() {
            debug!(voices = self.voices.len(), "Destroying voices");
        }
        self.voices.clear();
    }

    /// The number of voices in the pool, busy or not.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// The number of voices waiting to be reused.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// The number of voices that failed and can't be used until the pool is
    /// destroyed.
    pub fn broken_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_broken()).count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.destroy_all_voices();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Weak;
    use std::thread;

    use super::*;
    use crate::audio::format::{PcmFormat, SampleFormat};
    use crate::audio::mock;
    use crate::resource::AudioResource;
    use crate::testutil::eventually;

    /// A pack whose keys 1..=keys each play 10ms of an 8kHz mono sound. Key
    /// 100 aliases key 1.
    fn pack(name: &str, sample_rate: u32, keys: u16) -> SoundPack {
        let format = PcmFormat::new(1, sample_rate, 16, SampleFormat::Int).unwrap();
        let resource = Arc::new(AudioResource::new(format, vec![0; 32000]).unwrap());
        let mut clips = HashMap::new();
        for key in 1..=keys {
            let clip = Arc::new(resource.slice(u64::from(key) * 10, 10).unwrap());
            clips.insert(key, clip);
        }
        if let Some(clip) = clips.get(&1).cloned() {
            clips.insert(100, clip);
        }
        SoundPack::new(name.to_string(), resource, clips)
    }

    fn player(capacity: usize) -> (Arc<mock::Engine>, Player) {
        let engine = Arc::new(mock::Engine::manual("mock"));
        let mut player = Player::new(engine.clone(), capacity);
        player.set_sound_pack(Some(pack("test", 8000, 4))).unwrap();
        (engine, player)
    }

    #[test]
    fn test_unmapped_key() {
        let (engine, mut player) = player(8);
        assert!(!player.play_sound(42));
        assert_eq!(engine.channels_created(), 0);
        assert!(engine.submissions().is_empty());
        assert_eq!(player.voice_count(), 0);
    }

    #[test]
    fn test_no_pack() {
        let engine = Arc::new(mock::Engine::manual("mock"));
        let mut player = Player::new(engine.clone(), 8);
        assert!(!player.play_sound(1));
        assert_eq!(engine.channels_created(), 0);
    }

    #[test]
    fn test_play() {
        let (engine, mut player) = player(8);
        assert!(player.play_sound(2));

        let submissions = engine.submissions();
        assert_eq!(submissions.len(), 1);
        // 20ms at 8kHz, 2 bytes per frame.
        assert_eq!(submissions[0].offset, 320);
        assert_eq!(submissions[0].len, 160);
        assert_eq!(
            engine.channel_format(0),
            Some(PcmFormat::new(1, 8000, 16, SampleFormat::Int).unwrap())
        );
        assert_eq!(player.voice_count(), 1);
        assert_eq!(player.idle_count(), 0);
    }

    #[test]
    fn test_pool_exhausted() {
        let (engine, mut player) = player(3);
        for key in [1, 2, 3] {
            assert!(player.play_sound(key));
        }
        assert!(!player.play_sound(4));
        assert_eq!(player.voice_count(), 3);
        assert_eq!(engine.channels_created(), 3);
        assert_eq!(engine.submissions().len(), 3);

        // A finished voice makes room again.
        assert!(engine.finish(1));
        assert_eq!(player.idle_count(), 1);
        assert!(player.play_sound(4));
        assert_eq!(engine.channels_created(), 3);
        assert_eq!(engine.submissions()[3].channel, 1);
    }

    #[test]
    fn test_fifo_reuse() {
        let (engine, mut player) = player(3);
        for key in [1, 2, 3] {
            assert!(player.play_sound(key));
        }
        for channel in [2, 0, 1] {
            assert!(engine.finish(channel));
        }

        for key in [1, 2, 3] {
            assert!(player.play_sound(key));
        }
        let reused: Vec<usize> = engine.submissions()[3..]
            .iter()
            .map(|submission| submission.channel)
            .collect();
        assert_eq!(reused, vec![2, 0, 1]);
    }

    #[test]
    fn test_idle_voice_is_reused_before_creating() {
        let (engine, mut player) = player(8);
        assert!(player.play_sound(1));
        assert!(engine.finish(0));
        assert!(player.play_sound(2));
        assert_eq!(engine.channels_created(), 1);
    }

    #[test]
    fn test_completion_from_another_thread() {
        let (engine, mut player) = player(1);
        assert!(player.play_sound(1));
        assert!(!player.play_sound(2));

        let finisher = engine.clone();
        thread::spawn(move || finisher.finish(0)).join().unwrap();

        eventually(|| player.idle_count() == 1, "Voice never became idle");
        assert!(player.play_sound(2));
    }

    #[test]
    fn test_create_failure() {
        let (engine, mut player) = player(8);
        engine.set_fail_create(true);
        assert!(!player.play_sound(1));
        assert_eq!(player.voice_count(), 0);

        engine.set_fail_create(false);
        assert!(player.play_sound(1));
    }

    #[test]
    fn test_submit_failure_leaks_voice() {
        let (engine, mut player) = player(2);
        engine.set_fail_submit(true);
        assert!(!player.play_sound(1));
        assert_eq!(player.voice_count(), 1);
        assert_eq!(player.broken_count(), 1);
        assert!(engine.live_channels().is_empty());

        engine.set_fail_submit(false);
        assert!(player.play_sound(1));
        // The broken voice still counts against the capacity.
        assert!(!player.play_sound(2));

        // Replacing the pack rebuilds the pool.
        player.set_sound_pack(Some(pack("again", 8000, 4))).unwrap();
        assert_eq!(player.broken_count(), 0);
        assert!(player.play_sound(1));
        assert!(player.play_sound(2));
    }

    #[test]
    fn test_pack_swap_destroys_voices() {
        let (engine, mut player) = player(8);
        assert!(player.play_sound(1));
        assert!(player.play_sound(2));
        assert!(engine.finish(0));
        assert_eq!(player.idle_count(), 1);

        player.set_sound_pack(Some(pack("other", 16000, 2))).unwrap();
        assert_eq!(player.voice_count(), 0);
        assert_eq!(player.idle_count(), 0);
        assert!(engine.live_channels().is_empty());

        // Channels are recreated for the new format.
        assert!(player.play_sound(1));
        assert_eq!(engine.live_channels(), vec![2]);
        assert_eq!(engine.channel_format(2).unwrap().sample_rate(), 16000);
        assert!(!player.play_sound(3));
    }

    #[test]
    fn test_pack_prepares_engine() {
        let (engine, mut player) = player(8);
        player
            .set_sound_pack(Some(pack("other", 16000, 2)))
            .unwrap();
        let rates: Vec<u32> = engine
            .prepared()
            .iter()
            .map(|format| format.sample_rate())
            .collect();
        assert_eq!(rates, vec![8000, 16000]);

        // Clearing doesn't touch the engine.
        player.clear_sound_pack();
        player.set_sound_pack(None).unwrap();
        assert_eq!(engine.prepared().len(), 2);
    }

    #[test]
    fn test_prepare_failure_leaves_player_silent() {
        let (engine, mut player) = player(8);
        assert!(player.play_sound(1));

        engine.set_fail_prepare(true);
        assert!(matches!(
            player.set_sound_pack(Some(pack("other", 44100, 4))),
            Err(EngineError::Stream(_))
        ));
        assert!(player.sound_pack().is_none());
        assert!(engine.live_channels().is_empty());
        assert!(!player.play_sound(1));
        assert_eq!(engine.channels_created(), 1);

        engine.set_fail_prepare(false);
        player
            .set_sound_pack(Some(pack("other", 44100, 4)))
            .unwrap();
        assert!(player.play_sound(1));
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let engine = Arc::new(mock::Engine::manual("mock"));
        let mut player = Player::new(engine.clone(), 2);
        player.set_sound_pack(Some(pack("test", 8000, 4))).unwrap();
        assert!(player.play_sound(1));

        let idle = player.idle.clone();
        let stale = Completion::new(0, idle.generation(), idle.clone());

        player.set_sound_pack(Some(pack("other", 8000, 4))).unwrap();
        stale.finish();
        assert_eq!(player.idle_count(), 0);

        // The new pool still hands out fresh voices up to capacity.
        assert!(player.play_sound(1));
        assert!(player.play_sound(2));
        assert!(!player.play_sound(3));
    }

    #[test]
    fn test_pack_release() {
        let (engine, mut player) = player(8);
        let (weak_resource, weak_clip): (Weak<AudioResource>, _) = {
            let pack = player.sound_pack().unwrap();
            (
                Arc::downgrade(pack.resource()),
                Arc::downgrade(pack.clip(1).unwrap()),
            )
        };
        // Keys 1 and 100 share one clip.
        assert_eq!(weak_clip.strong_count(), 2);
        assert!(player.play_sound(100));
        assert!(player.play_sound(1));

        player.set_sound_pack(Some(pack("other", 8000, 1))).unwrap();
        assert!(weak_clip.upgrade().is_none());
        assert!(weak_resource.upgrade().is_none());
        assert!(engine.live_channels().is_empty());

        player.clear_sound_pack();
        assert!(player.sound_pack().is_none());
        assert!(!player.play_sound(1));
    }
}
