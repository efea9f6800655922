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
use std::io;

/// Error types for reading audio resources
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    #[error("Truncated container: {0}")]
    TruncatedContainer(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl ResourceError {
    /// Maps a failed read to a truncation error when the stream ran dry, keeping
    /// other IO errors as they are.
    pub(crate) fn from_read(e: io::Error, what: &str) -> ResourceError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ResourceError::TruncatedContainer(format!("stream ended while reading {}", what))
        } else {
            ResourceError::IoError(e)
        }
    }
}
