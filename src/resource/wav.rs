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

//! Reader for RIFF/WAVE containers holding linear PCM.

use std::io::{self, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use super::error::ResourceError;
use super::reader::ResourceReader;
use super::AudioResource;
use crate::audio::format::{PcmFormat, SampleFormat};

const RIFF: &[u8; 4] = b"RIFF";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IEEE_FLOAT: u16 = 0x0003;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// The smallest fmt chunk we accept (PCMWAVEFORMAT).
const MIN_FMT_SIZE: u32 = 16;
/// Offset of the sub-format GUID's leading tag in a WAVEFORMATEXTENSIBLE chunk.
const EXTENSIBLE_SUBFORMAT_OFFSET: usize = 24;

/// Parses a RIFF/WAVE byte stream into an audio resource. The fmt and data
/// chunks may appear in any order; parsing stops as soon as both have been
/// read, so trailing chunks are never touched.
pub struct WavReader<R> {
    reader: R,
}

impl<R: Read> WavReader<R> {
    pub fn new(reader: R) -> WavReader<R> {
        WavReader { reader }
    }

    /// Reads the 12 byte master header and returns the size of the body that
    /// follows the form type.
    fn read_riff_header(&mut self) -> Result<u64, ResourceError> {
        let tag = self.read_tag("RIFF header")?;
        if &tag != RIFF {
            return Err(ResourceError::MalformedContainer(
                "missing RIFF tag".to_string(),
            ));
        }

        let size = self
            .reader
            .read_u32::<LittleEndian>()
            .map_err(|e| ResourceError::from_read(e, "RIFF header"))?;

        let form = self.read_tag("RIFF header")?;
        if &form != WAVE {
            return Err(ResourceError::MalformedContainer(
                "RIFF form type is not WAVE".to_string(),
            ));
        }

        // The declared size covers the form type we just read.
        u64::from(size).checked_sub(4).ok_or_else(|| {
            ResourceError::MalformedContainer(format!("RIFF size {} is too small", size))
        })
    }

    fn read_body(&mut self, body_size: u64) -> Result<AudioResource, ResourceError> {
        let mut format: Option<PcmFormat> = None;
        let mut data: Option<Vec<u8>> = None;
        let mut consumed: u64 = 0;

        while consumed < body_size {
            let tag = self.read_tag("chunk header")?;
            let size = self
                .reader
                .read_u32::<LittleEndian>()
                .map_err(|e| ResourceError::from_read(e, "chunk header"))?;
            consumed += 8;

            // Chunks are word aligned. The pad byte isn't part of the size.
            let padded = u64::from(size) + u64::from(size & 1);

            match &tag {
                FMT => format = Some(self.read_format(size)?),
                DATA => data = Some(self.read_data(size)?),
                _ => {
                    debug!(chunk = %String::from_utf8_lossy(&tag), size, "Skipping chunk");
                    self.skip(padded, "chunk body")?;
                    consumed += padded;
                    continue;
                }
            }
            consumed += padded;

            if format.is_some() && data.is_some() {
                break;
            }
            if size & 1 == 1 {
                self.skip(1, "chunk padding")?;
            }
        }

        match (format, data) {
            (Some(format), Some(data)) => AudioResource::new(format, data),
            (None, _) => Err(ResourceError::TruncatedContainer(
                "no fmt chunk before the end of the RIFF body".to_string(),
            )),
            (_, None) => Err(ResourceError::TruncatedContainer(
                "no data chunk before the end of the RIFF body".to_string(),
            )),
        }
    }

    fn read_format(&mut self, size: u32) -> Result<PcmFormat, ResourceError> {
        if size < MIN_FMT_SIZE {
            return Err(ResourceError::MalformedContainer(format!(
                "fmt chunk is {} bytes, expected at least {}",
                size, MIN_FMT_SIZE
            )));
        }
        let chunk = self.read_exact_chunk(size, "fmt chunk")?;

        let mut fields = &chunk[..];
        let tag = fields.read_u16::<LittleEndian>()?;
        let channels = fields.read_u16::<LittleEndian>()?;
        let sample_rate = fields.read_u32::<LittleEndian>()?;
        let _bytes_per_sec = fields.read_u32::<LittleEndian>()?;
        let _block_align = fields.read_u16::<LittleEndian>()?;
        let bits_per_sample = fields.read_u16::<LittleEndian>()?;

        let tag = if tag == WAVE_FORMAT_EXTENSIBLE {
            let subformat = chunk
                .get(EXTENSIBLE_SUBFORMAT_OFFSET..EXTENSIBLE_SUBFORMAT_OFFSET + 2)
                .ok_or_else(|| {
                    ResourceError::MalformedContainer(
                        "extensible fmt chunk is missing its sub-format".to_string(),
                    )
                })?;
            u16::from_le_bytes([subformat[0], subformat[1]])
        } else {
            tag
        };

        let sample_format = match tag {
            WAVE_FORMAT_PCM => SampleFormat::Int,
            WAVE_FORMAT_IEEE_FLOAT => SampleFormat::Float,
            other => {
                return Err(ResourceError::UnsupportedFormat(format!(
                    "WAVE encoding 0x{:04x} is not linear PCM",
                    other
                )))
            }
        };

        PcmFormat::new(channels, sample_rate, bits_per_sample, sample_format)
            .map_err(|e| ResourceError::MalformedContainer(e.to_string()))
    }

    fn read_data(&mut self, size: u32) -> Result<Vec<u8>, ResourceError> {
        self.read_exact_chunk(size, "data chunk")
    }

    /// Reads exactly `size` bytes without trusting `size` for the allocation.
    fn read_exact_chunk(&mut self, size: u32, what: &str) -> Result<Vec<u8>, ResourceError> {
        let mut buf = Vec::new();
        self.reader
            .by_ref()
            .take(u64::from(size))
            .read_to_end(&mut buf)?;
        if buf.len() < size as usize {
            return Err(ResourceError::TruncatedContainer(format!(
                "{} declares {} bytes, only {} available",
                what,
                size,
                buf.len()
            )));
        }
        Ok(buf)
    }

    fn skip(&mut self, count: u64, what: &str) -> Result<(), ResourceError> {
        let skipped = io::copy(&mut self.reader.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(ResourceError::TruncatedContainer(format!(
                "stream ended while skipping {}",
                what
            )));
        }
        Ok(())
    }

    fn read_tag(&mut self, what: &str) -> Result<[u8; 4], ResourceError> {
        let mut tag = [0u8; 4];
        self.reader
            .read_exact(&mut tag)
            .map_err(|e| ResourceError::from_read(e, what))?;
        Ok(tag)
    }
}

impl<R: Read> ResourceReader for WavReader<R> {
    fn read(&mut self) -> Result<AudioResource, ResourceError> {
        let body_size = self.read_riff_header()?;
        self.read_body(body_size)
    }
}
