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
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, span, warn, Level};

use super::error::LoadError;
use super::{KeyCode, SoundPack};
use crate::config::PackConfig;
use crate::resource::{self, ResourceError};

/// The name of the config document in a pack directory.
pub const CONFIG_FILE: &str = "config.json";

/// Extended and virtual key codes that play the same clip as a base key, as
/// `(alias, source)` pairs. Packs only need to configure the base layout.
const ALIASES: [(KeyCode, KeyCode); 12] = [
    (0xe01d, 3613), // right ctrl
    (0xe037, 3639), // print screen
    (0xe038, 3640), // right alt
    (0xe047, 3655), // home
    (0xe049, 3657), // page up
    (0xe04f, 3663), // end
    (0xe051, 3665), // page down
    (0xe052, 3666), // insert
    (0xe053, 3667), // delete
    (0xe05b, 3675), // left win
    (0xe05c, 3676), // right win
    (0xe11d, 3653), // pause
];

/// Builds sound packs from pack directories.
pub struct PackLoader {}

impl PackLoader {
    /// Loads the pack in the given directory. The pack is named after the
    /// directory.
    pub fn load(dir: &Path) -> Result<SoundPack, LoadError> {
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let span = span!(Level::INFO, "load pack", pack = %name);
        let _enter = span.enter();

        let config = PackConfig::read(&dir.join(CONFIG_FILE))?;
        let sound_path = dir.join(config.sound());
        let resource = resource::from_file(&sound_path)
            .map_err(|e| match e {
                ResourceError::IoError(io) => LoadError::SourceMissing {
                    path: sound_path.clone(),
                    io,
                },
                source => LoadError::Resource {
                    path: sound_path.clone(),
                    source,
                },
            })?
            .read()
            .map_err(|source| LoadError::Resource {
                path: sound_path.clone(),
                source,
            })?;
        let resource = Arc::new(resource);

        let mut clips = HashMap::new();
        for (key, slice) in config.keys() {
            match resource.slice(slice.start_ms, slice.duration_ms) {
                Some(clip) => {
                    clips.insert(*key, Arc::new(clip));
                }
                None => warn!(
                    key,
                    start_ms = slice.start_ms,
                    "Skipping key that starts past the end of the sound"
                ),
            }
        }
        apply_aliases(&mut clips);

        info!(
            path = %sound_path.display(),
            format = %resource.format(),
            keys = clips.len(),
            "Loaded sound pack"
        );
        Ok(SoundPack::new(name, resource, clips))
    }
}

/// Points every alias at its source key's clip. An alias whose source isn't
/// mapped is left unmapped, even if the pack configured it directly.
fn apply_aliases<T>(clips: &mut HashMap<KeyCode, Arc<T>>) {
    for (alias, source) in ALIASES {
        match clips.get(&source).map(Arc::clone) {
            Some(clip) => {
                clips.insert(alias, clip);
            }
            None => {
                if clips.remove(&alias).is_some() {
                    debug!(alias, source, "Dropping alias with no source key");
                }
            }
        }
    }
}
