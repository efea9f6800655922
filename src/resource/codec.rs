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

//! Adapter that hands compressed bitstreams (Ogg/Vorbis and anything else the
//! codec registry understands) to symphonia and collects 16-bit PCM.

use std::fs::File;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::error::ResourceError;
use super::reader::ResourceReader;
use super::AudioResource;
use crate::audio::format::{PcmFormat, SampleFormat};

/// Decodes a compressed stream completely into memory.
pub struct CodecReader {
    source: Option<Box<dyn MediaSource>>,
}

impl CodecReader {
    pub fn new(file: File) -> CodecReader {
        CodecReader::from_source(Box::new(file))
    }

    pub fn from_source(source: Box<dyn MediaSource>) -> CodecReader {
        CodecReader {
            source: Some(source),
        }
    }
}

impl ResourceReader for CodecReader {
    fn read(&mut self) -> Result<AudioResource, ResourceError> {
        let source = self.source.take().ok_or_else(|| {
            ResourceError::DecodeError("stream has already been decoded".to_string())
        })?;
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| ResourceError::DecodeError(format!("unrecognized stream: {}", e)))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ResourceError::DecodeError("no audio track found".to_string()))?;
        let track_id = track.id;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| ResourceError::DecodeError(e.to_string()))?;

        let mut spec: Option<SignalSpec> = None;
        let mut sample_buffer: Option<(SampleBuffer<i16>, usize)> = None;
        let mut payload: Vec<u8> = Vec::new();

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(e) => return Err(ResourceError::DecodeError(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| ResourceError::DecodeError(e.to_string()))?;
            let packet_spec = *decoded.spec();
            let expected = *spec.get_or_insert(packet_spec);
            if expected != packet_spec {
                return Err(ResourceError::DecodeError(format!(
                    "stream changed format mid-way ({} channels @ {}Hz -> {} channels @ {}Hz)",
                    expected.channels.count(),
                    expected.rate,
                    packet_spec.channels.count(),
                    packet_spec.rate
                )));
            }

            let frames = decoded.capacity();
            if sample_buffer
                .as_ref()
                .map_or(true, |(_, capacity)| *capacity < frames)
            {
                sample_buffer = Some((SampleBuffer::new(frames as u64, packet_spec), frames));
            }
            if let Some((buffer, _)) = sample_buffer.as_mut() {
                buffer.copy_interleaved_ref(decoded);
                payload.reserve(buffer.samples().len() * 2);
                for sample in buffer.samples() {
                    payload.extend_from_slice(&sample.to_le_bytes());
                }
            }
        }

        let spec = spec
            .ok_or_else(|| ResourceError::DecodeError("stream holds no audio".to_string()))?;
        let channels = u16::try_from(spec.channels.count())
            .map_err(|_| ResourceError::DecodeError("too many channels".to_string()))?;
        let format = PcmFormat::new(channels, spec.rate, 16, SampleFormat::Int)
            .map_err(|e| ResourceError::DecodeError(e.to_string()))?;

        debug!(
            format = format.to_string(),
            bytes = payload.len(),
            "Decoded compressed stream"
        );
        AudioResource::new(format, payload)
    }
}
