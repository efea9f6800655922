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

//! Decoded PCM resources and the clips carved out of them.
//!
//! A resource is produced once by a reader (the RIFF/WAVE container parser or
//! the compressed-audio codec adapter) and is immutable afterwards. Clips are
//! views into the payload: they hold a strong handle to the resource plus a
//! byte range, so a clip can never outlive the bytes it points at.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::format::PcmFormat;

pub mod codec;
pub mod error;
pub mod reader;
pub mod wav;

pub use error::ResourceError;
pub use reader::{from_file, ResourceReader};

/// An immutable buffer of interleaved linear PCM plus its format.
pub struct AudioResource {
    format: PcmFormat,
    payload: Box<[u8]>,
}

impl AudioResource {
    /// Creates a new resource. The payload must hold a whole number of frames.
    pub fn new(format: PcmFormat, payload: Vec<u8>) -> Result<AudioResource, ResourceError> {
        let block_align = format.bytes_per_frame();
        if payload.len() % block_align != 0 {
            return Err(ResourceError::MalformedContainer(format!(
                "payload of {} bytes is not a multiple of the {} byte frame size",
                payload.len(),
                block_align
            )));
        }

        Ok(AudioResource {
            format,
            payload: payload.into_boxed_slice(),
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the playback duration of the whole resource.
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.payload.len())
    }

    /// Derives a clip starting `start_ms` into the resource and lasting
    /// `duration_ms`. Offsets are computed in whole frames, truncating. Returns
    /// None if the start is at or past the end of the payload; a clip that
    /// would run past the end is shortened to the remaining bytes.
    pub fn slice(self: &Arc<Self>, start_ms: u64, duration_ms: u64) -> Option<Clip> {
        let bytes_per_frame = self.format.bytes_per_frame() as u64;
        let sample_rate = u64::from(self.format.sample_rate());
        let payload_len = self.payload.len() as u64;

        let offset = (sample_rate.saturating_mul(start_ms) / 1000).saturating_mul(bytes_per_frame);
        let length =
            (sample_rate.saturating_mul(duration_ms) / 1000).saturating_mul(bytes_per_frame);

        if offset >= payload_len {
            return None;
        }
        let length = length.min(payload_len - offset);

        // Both values are bounded by the payload length, which is a usize.
        Some(Clip {
            resource: Arc::clone(self),
            offset: offset as usize,
            length: length as usize,
        })
    }
}

impl fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioResource")
            .field("format", &self.format)
            .field("length", &self.payload.len())
            .finish()
    }
}

/// A playable byte range of an audio resource. Cloning a clip is cheap and
/// never copies payload bytes.
#[derive(Clone)]
pub struct Clip {
    resource: Arc<AudioResource>,
    offset: usize,
    length: usize,
}

impl Clip {
    /// The resource this clip borrows from.
    pub fn resource(&self) -> &Arc<AudioResource> {
        &self.resource
    }

    pub fn format(&self) -> PcmFormat {
        self.resource.format
    }

    /// Byte offset of the clip within the resource payload.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Clip length in bytes.
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The clip's PCM bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.resource.payload[self.offset..self.offset + self.length]
    }

    pub fn duration(&self) -> Duration {
        self.resource.format.duration_of(self.length)
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .finish()
    }
}
