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
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{EngineError, PcmFormat};
use crate::player::Completion;
use crate::resource::Clip;

/// A mock engine. Doesn't actually play anything.
///
/// In auto-complete mode every submission finishes after the clip's duration
/// on a helper thread. Otherwise nothing finishes until [`Engine::finish`] is
/// called.
#[derive(Clone)]
pub struct Engine {
    name: String,
    auto_complete: bool,
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    next_id: usize,
    channels: HashMap<usize, ChannelState>,
    submissions: Vec<Submission>,
    prepared: Vec<PcmFormat>,
    fail_prepare: bool,
    fail_create: bool,
    fail_submit: bool,
}

struct ChannelState {
    format: PcmFormat,
    completion: Completion,
    playing: bool,
}

/// A clip handed to a mock channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub channel: usize,
    pub offset: usize,
    pub len: usize,
}

impl Engine {
    /// Gets the given mock engine. Playback finishes on its own.
    pub fn get(name: &str) -> Engine {
        Engine {
            name: name.to_string(),
            auto_complete: true,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Gets a mock engine whose playback only finishes through
    /// [`Engine::finish`].
    pub fn manual(name: &str) -> Engine {
        Engine {
            auto_complete: false,
            ..Engine::get(name)
        }
    }

    /// Signals completion for the given channel if it is playing.
    pub fn finish(&self, channel: usize) -> bool {
        finish(&self.state, channel)
    }

    /// Signals completion for every playing channel, in creation order.
    pub fn finish_all(&self) -> usize {
        let mut playing: Vec<usize> = {
            let state = self.state.lock();
            state
                .channels
                .iter()
                .filter(|(_, channel)| channel.playing)
                .map(|(id, _)| *id)
                .collect()
        };
        playing.sort_unstable();
        playing
            .into_iter()
            .filter(|id| finish(&self.state, *id))
            .count()
    }

    /// Makes `prepare` fail, as a device that cannot open a stream would.
    pub fn set_fail_prepare(&self, fail: bool) {
        self.state.lock().fail_prepare = fail;
    }

    /// Makes channel creation fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.state.lock().fail_create = fail;
    }

    /// Makes submissions fail.
    pub fn set_fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    /// The number of channels ever created.
    pub fn channels_created(&self) -> usize {
        self.state.lock().next_id
    }

    /// The ids of the channels that haven't been dropped, in creation order.
    pub fn live_channels(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.state.lock().channels.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The format the given channel was created with.
    pub fn channel_format(&self, channel: usize) -> Option<PcmFormat> {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map(|channel| channel.format)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    /// Every format the engine was successfully prepared for, in order.
    pub fn prepared(&self) -> Vec<PcmFormat> {
        self.state.lock().prepared.clone()
    }
}

fn finish(state: &Mutex<State>, channel: usize) -> bool {
    // Signal outside of the lock, as a real engine's callback thread would.
    let completion = {
        let mut state = state.lock();
        match state.channels.get_mut(&channel) {
            Some(channel) if channel.playing => {
                channel.playing = false;
                channel.completion.clone()
            }
            _ => return false,
        }
    };
    completion.finish();
    true
}

impl super::Engine for Engine {
    fn prepare(&self, format: PcmFormat) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.fail_prepare {
            return Err(EngineError::Stream(format!(
                "{} could not open a stream for {}",
                self.name, format
            )));
        }
        state.prepared.push(format);
        debug!(device = %self.name, format = %format, "Prepared output");
        Ok(())
    }

    fn create_channel(
        &self,
        format: PcmFormat,
        completion: Completion,
    ) -> Result<Box<dyn super::Channel>, EngineError> {
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(EngineError::Device(format!(
                "{} refused to create a channel",
                self.name
            )));
        }

        let id = state.next_id;
        state.next_id += 1;
        state.channels.insert(
            id,
            ChannelState {
                format,
                completion,
                playing: false,
            },
        );
        debug!(device = %self.name, channel = id, format = %format, "Created channel");

        Ok(Box::new(Channel {
            id,
            auto_complete: self.auto_complete,
            state: self.state.clone(),
        }))
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// A mock channel.
struct Channel {
    id: usize,
    auto_complete: bool,
    state: Arc<Mutex<State>>,
}

impl super::Channel for Channel {
    fn submit(&mut self, clip: &Clip) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            if state.fail_submit {
                return Err(EngineError::Submit(format!(
                    "channel {} refused the clip",
                    self.id
                )));
            }
            let channel = state.channels.get_mut(&self.id).ok_or(EngineError::Closed)?;
            channel.playing = true;
            state.submissions.push(Submission {
                channel: self.id,
                offset: clip.offset(),
                len: clip.len(),
            });
        }

        if self.auto_complete {
            let duration = clip.duration();
            let state = self.state.clone();
            let id = self.id;
            thread::spawn(move || {
                thread::sleep(duration);
                finish(&state, id);
            });
        }
        Ok(())
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        if self.state.lock().channels.remove(&self.id).is_some() {
            info!(channel = self.id, "Destroyed channel");
        }
    }
}
