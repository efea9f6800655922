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
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::player::Completion;
use crate::resource::Clip;

pub mod cpal;
pub mod format;
pub mod mock;

pub use format::{FormatError, PcmFormat, SampleFormat};

/// Errors from the audio engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no audio output device is available")]
    NoDevice,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("unable to submit clip: {0}")]
    Submit(String),

    #[error("the audio engine has shut down")]
    Closed,
}

/// An audio output that hands out playback channels.
pub trait Engine: fmt::Display + Send + Sync {
    /// Gets the output ready for clips of the given format. Called whenever a
    /// sound pack is installed, before any channel is created for it.
    fn prepare(&self, format: PcmFormat) -> Result<(), EngineError>;

    /// Creates a channel for clips of the given format. The completion is
    /// signalled, possibly from another thread, each time a submitted clip
    /// finishes playing.
    fn create_channel(
        &self,
        format: PcmFormat,
        completion: Completion,
    ) -> Result<Box<dyn Channel>, EngineError>;
}

/// A single playback channel. Dropping a channel stops anything it is playing
/// without signalling completion.
pub trait Channel: Send {
    /// Starts playing the clip.
    fn submit(&mut self, clip: &Clip) -> Result<(), EngineError>;
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Engine>>, EngineError> {
    cpal::Engine::list()
}

/// Gets the engine for the given device. Device names starting with "mock"
/// get a mock engine; no name selects the default output device.
pub fn get_engine(device: Option<&str>) -> Result<Arc<dyn Engine>, EngineError> {
    if let Some(name) = device {
        if name.starts_with("mock") {
            return Ok(Arc::new(mock::Engine::get(name)));
        }
    }

    Ok(Arc::new(cpal::Engine::get(device)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_engine() {
        let engine = get_engine(Some("mock-device")).unwrap();
        assert_eq!(engine.to_string(), "mock-device (Mock)");
    }
}
