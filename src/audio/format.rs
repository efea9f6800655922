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
use std::time::Duration;

/// Errors raised when a PCM descriptor can't describe playable audio.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("channel count must be greater than 0")]
    NoChannels,

    #[error("sample rate must be greater than 0")]
    NoSampleRate,

    #[error("unsupported bits per sample: {0}")]
    UnsupportedBitDepth(u16),

    #[error("float samples must be 32 bits, got {0}")]
    FloatBitDepth(u16),
}

/// Sample encoding of a linear PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples. 8-bit samples are unsigned, wider ones are signed.
    Int,
    /// IEEE 754 samples.
    Float,
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Describes an interleaved little-endian linear PCM payload. Channels created
/// by an engine are bound to one of these for their whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    sample_format: SampleFormat,
}

impl PcmFormat {
    /// Creates a new PCM format, rejecting descriptors that can't be addressed
    /// in whole frames.
    pub fn new(
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        sample_format: SampleFormat,
    ) -> Result<Self, FormatError> {
        if channels == 0 {
            return Err(FormatError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(FormatError::NoSampleRate);
        }
        match (sample_format, bits_per_sample) {
            (SampleFormat::Int, 8 | 16 | 24 | 32) | (SampleFormat::Float, 32) => {}
            (SampleFormat::Float, bits) => return Err(FormatError::FloatBitDepth(bits)),
            (SampleFormat::Int, bits) => return Err(FormatError::UnsupportedBitDepth(bits)),
        }

        Ok(PcmFormat {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Bytes used by a single sample of a single channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes used by one frame (one sample for every channel). This is the
    /// block alignment of the payload.
    pub fn bytes_per_frame(&self) -> usize {
        usize::from(self.channels) * self.bytes_per_sample()
    }

    /// Bytes consumed by one second of audio.
    pub fn bytes_per_sec(&self) -> u64 {
        u64::from(self.sample_rate) * self.bytes_per_frame() as u64
    }

    /// Returns the playback duration of the given number of payload bytes.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let frames = bytes / self.bytes_per_frame();
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Decodes one sample into the range [-1.0, 1.0]. `bytes` must hold exactly
    /// `bytes_per_sample()` bytes.
    #[inline]
    pub fn decode_sample(&self, bytes: &[u8]) -> f32 {
        match (self.sample_format, self.bits_per_sample) {
            (SampleFormat::Float, _) => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }
            (SampleFormat::Int, 8) => (f32::from(bytes[0]) - 128.0) / 128.0,
            (SampleFormat::Int, 16) => {
                f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32768.0
            }
            (SampleFormat::Int, 24) => {
                // Sign extend by placing the sample in the upper three bytes.
                let value = i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]) >> 8;
                value as f32 / 8_388_608.0
            }
            (SampleFormat::Int, _) => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                    / 2_147_483_648.0
            }
        }
    }
}

impl fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz, {} channel(s), {}-bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, self.sample_format
        )
    }
}
