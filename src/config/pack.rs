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
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use super::error::ConfigError;
use crate::pack::KeyCode;

/// The audio file a pack uses when its config doesn't name one.
pub const DEFAULT_SOUND: &str = "sound.wav";

/// A `[start, duration]` pair, in milliseconds, locating a key's sound in the
/// pack's audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySlice {
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// A JSON representation of a sound pack's `config.json`.
///
/// The document is walked by hand: a bad key entry is dropped on its own and
/// never fails the whole pack.
#[derive(Debug, Default)]
pub struct PackConfig {
    /// The audio file, relative to the pack directory.
    sound: Option<String>,

    /// Key codes and the slices they play, ordered by the key's text as
    /// written in the document, so "10" comes before "9".
    keys: Vec<(KeyCode, KeySlice)>,
}

impl PackConfig {
    /// Reads and parses the config document at the given path.
    pub fn read(path: &Path) -> Result<PackConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        PackConfig::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a config document. Only malformed JSON is an error.
    pub fn parse(contents: &str) -> Result<PackConfig, serde_json::Error> {
        let value: Value = serde_json::from_str(contents)?;
        Ok(PackConfig::from_value(&value))
    }

    /// Extracts the pack config from a JSON value, skipping anything that
    /// doesn't have the expected shape.
    pub fn from_value(value: &Value) -> PackConfig {
        let sound = value
            .get("sound")
            .and_then(Value::as_str)
            .map(str::to_string);

        let keys = match value.get("keys") {
            Some(Value::Object(keys)) => keys
                .iter()
                .filter_map(|(key, value)| parse_key_entry(key, value))
                .collect(),
            Some(other) => {
                warn!(keys = %other, "Ignoring keys that are not an object");
                Vec::new()
            }
            None => Vec::new(),
        };

        PackConfig { sound, keys }
    }

    /// Gets the audio file name.
    pub fn sound(&self) -> &str {
        self.sound.as_deref().unwrap_or(DEFAULT_SOUND)
    }

    /// Gets the configured key entries.
    pub fn keys(&self) -> &[(KeyCode, KeySlice)] {
        &self.keys
    }
}

fn parse_key_entry(key: &str, value: &Value) -> Option<(KeyCode, KeySlice)> {
    let code = match key.trim().parse::<KeyCode>() {
        Ok(code) => code,
        Err(e) => {
            warn!(key, err = %e, "Skipping key with a non-numeric code");
            return None;
        }
    };

    let slice = match value.as_array().map(Vec::as_slice) {
        Some([start, duration]) => millis(start).zip(millis(duration)),
        _ => None,
    };

    match slice {
        Some((start_ms, duration_ms)) => Some((
            code,
            KeySlice {
                start_ms,
                duration_ms,
            },
        )),
        None => {
            warn!(key, value = %value, "Skipping key without a [start, duration] pair");
            None
        }
    }
}

/// Accepts non-negative numbers. Fractional milliseconds truncate.
fn millis(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.trunc() as u64)
    })
}
