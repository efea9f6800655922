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
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::codec::CodecReader;
use super::error::ResourceError;
use super::wav::WavReader;
use super::AudioResource;

/// Produces an audio resource from some encoded source.
pub trait ResourceReader {
    /// Reads the whole source. A failed read never yields a partial resource.
    fn read(&mut self) -> Result<AudioResource, ResourceError>;
}

/// Creates a reader for the given file, chosen by its (case-insensitive)
/// extension: `.wav` files are parsed directly, `.ogg` files go through the
/// codec adapter. Anything else is unsupported.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Box<dyn ResourceReader>, ResourceError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("wav") => Ok(Box::new(WavReader::new(BufReader::new(File::open(path)?)))),
        Some("ogg") => Ok(Box::new(CodecReader::new(File::open(path)?))),
        _ => Err(ResourceError::UnsupportedFormat(format!(
            "{} has no supported extension",
            path.display()
        ))),
    }
}
