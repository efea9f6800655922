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
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::{Channel, EngineError};
use crate::resource::Clip;

/// The queue of voices that have finished playing and may be reused.
///
/// This is the only state shared between the input context and the engine's
/// completion context. Every operation holds the lock for O(1) work and never
/// calls into the engine.
#[derive(Debug, Default)]
pub struct IdleQueue {
    state: Mutex<IdleState>,
}

#[derive(Debug, Default)]
struct IdleState {
    /// Bumped whenever the pool is torn down. Completions carrying an older
    /// generation refer to destroyed channels.
    generation: u64,
    voices: VecDeque<usize>,
}

impl IdleQueue {
    pub fn new() -> IdleQueue {
        IdleQueue::default()
    }

    /// Takes the least recently idled voice.
    pub fn pop(&self) -> Option<usize> {
        self.state.lock().voices.pop_front()
    }

    /// Returns a voice to the back of the queue. Ignored if the voice belongs
    /// to an earlier generation.
    pub fn push(&self, generation: u64, voice: usize) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.voices.push_back(voice);
        true
    }

    /// Empties the queue and starts a new generation, which is returned.
    pub fn reset(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        state.voices.clear();
        state.generation
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn len(&self) -> usize {
        self.state.lock().voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().voices.is_empty()
    }
}

/// The stream-end signal for one voice. Engines call [`Completion::finish`]
/// from whatever thread notices that a submitted clip has finished.
#[derive(Clone)]
pub struct Completion {
    voice: usize,
    generation: u64,
    idle: Arc<IdleQueue>,
}

impl Completion {
    pub fn new(voice: usize, generation: u64, idle: Arc<IdleQueue>) -> Completion {
        Completion {
            voice,
            generation,
            idle,
        }
    }

    pub fn voice(&self) -> usize {
        self.voice
    }

    /// Marks the voice idle.
    pub fn finish(&self) {
        if !self.idle.push(self.generation, self.voice) {
            debug!(
                voice = self.voice,
                generation = self.generation,
                "Ignoring completion for a destroyed voice"
            );
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("voice", &self.voice)
            .field("generation", &self.generation)
            .finish()
    }
}

/// One slot of the pool. A voice whose channel failed keeps its slot but has
/// no channel.
pub struct Voice {
    channel: Option<Box<dyn Channel>>,
}

impl Voice {
    pub fn new(channel: Box<dyn Channel>) -> Voice {
        Voice {
            channel: Some(channel),
        }
    }

    /// Starts playing the clip. On failure the channel is discarded.
    pub fn play(&mut self, clip: &Clip) -> Result<(), EngineError> {
        let channel = self.channel.as_mut().ok_or(EngineError::Closed)?;
        let result = channel.submit(clip);
        if result.is_err() {
            self.channel = None;
        }
        result
    }

    pub fn is_broken(&self) -> bool {
        self.channel.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn test_fifo() {
        let idle = IdleQueue::new();
        let generation = idle.generation();
        assert!(idle.push(generation, 2));
        assert!(idle.push(generation, 0));
        assert!(idle.push(generation, 1));
        assert_eq!(idle.len(), 3);

        assert_eq!(idle.pop(), Some(2));
        assert_eq!(idle.pop(), Some(0));
        assert_eq!(idle.pop(), Some(1));
        assert_eq!(idle.pop(), None);
        assert!(idle.is_empty());
    }

    #[test]
    fn test_reset_ignores_stale_voices() {
        let idle = Arc::new(IdleQueue::new());
        let stale = Completion::new(0, idle.generation(), idle.clone());
        stale.finish();
        assert_eq!(idle.len(), 1);

        let generation = idle.reset();
        assert!(idle.is_empty());

        stale.finish();
        assert!(idle.is_empty());

        Completion::new(3, generation, idle.clone()).finish();
        assert_eq!(idle.pop(), Some(3));
    }

    #[test]
    fn test_finish_from_other_threads() {
        let idle = Arc::new(IdleQueue::new());
        let generation = idle.generation();
        let handles: Vec<_> = (0..8)
            .map(|voice| {
                let completion = Completion::new(voice, generation, idle.clone());
                thread::spawn(move || completion.finish())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut voices: Vec<usize> = std::iter::from_fn(|| idle.pop()).collect();
        voices.sort_unstable();
        assert_eq!(voices, (0..8).collect::<Vec<_>>());
    }
}
