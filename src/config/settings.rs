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
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use super::error::ConfigError;

/// The pack loaded when none is configured.
pub const DEFAULT_PACK: &str = "cherrymx-black-abs";

/// Default capacity of the voice pool.
pub const DEFAULT_MAX_VOICES: usize = 8;

/// Application settings, read from an optional YAML file and `KEYCLICK_*`
/// environment variables.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// The name of the sound pack to load.
    pack: Option<String>,

    /// The audio output device. Names starting with "mock" select the mock engine.
    device: Option<String>,

    /// The number of sounds that may play at once.
    max_voices: Option<usize>,

    /// Additional directories searched for `sound/<pack>` directories.
    #[serde(default)]
    search_paths: Vec<String>,
}

impl Settings {
    /// Loads settings from the given file, if any, with environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        Ok(builder
            .add_source(
                Environment::with_prefix("KEYCLICK")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("search_paths"),
            )
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// Returns the pack name (default: cherrymx-black-abs).
    pub fn pack(&self) -> &str {
        self.pack.as_deref().unwrap_or(DEFAULT_PACK)
    }

    /// Returns the configured output device, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the voice pool capacity (default: 8, never less than 1).
    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES).max(1)
    }

    /// Returns the extra pack search roots.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(PathBuf::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pack(), DEFAULT_PACK);
        assert_eq!(settings.device(), None);
        assert_eq!(settings.max_voices(), DEFAULT_MAX_VOICES);
        assert!(settings.search_paths().is_empty());
    }

    #[test]
    fn test_deserialize() {
        let yaml = r#"
            pack: topre
            device: mock-device
            max_voices: 0
            search_paths:
              - /opt/keyclick
        "#;

        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.pack(), "topre");
        assert_eq!(settings.device(), Some("mock-device"));
        // Zero voices would make every key silent.
        assert_eq!(settings.max_voices(), 1);
        assert_eq!(settings.search_paths(), vec![PathBuf::from("/opt/keyclick")]);
    }

    #[test]
    fn test_load_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("keyclick.yaml");
        std::fs::write(&path, "max_voices: 4\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.max_voices(), 4);
        assert_eq!(settings.pack(), DEFAULT_PACK);
    }

    #[test]
    fn test_load_missing_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("missing.yaml");
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::Load(_))
        ));
    }
}
