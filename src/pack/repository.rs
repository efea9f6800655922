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
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::LoadError;
use super::loader::{PackLoader, CONFIG_FILE};
use super::SoundPack;
use crate::config::DEFAULT_PACK;

/// The directory under each root that holds pack directories.
const SOUND_DIR: &str = "sound";

/// Finds installed packs by name under a set of root directories.
///
/// Roots are searched in sorted order so the same pack always wins when
/// several roots hold one.
#[derive(Debug, Clone)]
pub struct PackRepository {
    roots: BTreeSet<PathBuf>,
}

impl PackRepository {
    pub fn new<I>(roots: I) -> PackRepository
    where
        I: IntoIterator<Item = PathBuf>,
    {
        PackRepository {
            roots: roots.into_iter().collect(),
        }
    }

    /// Creates a repository rooted at the working directory, the directory
    /// holding the executable and any extra paths.
    pub fn with_default_roots<I>(extra: I) -> PackRepository
    where
        I: IntoIterator<Item = PathBuf>,
    {
        PackRepository::new(default_roots().into_iter().chain(extra))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(PathBuf::as_path)
    }

    /// Loads the default pack.
    pub fn load_default(&self) -> Result<Option<SoundPack>, LoadError> {
        self.load(DEFAULT_PACK)
    }

    /// Loads the named pack from the first root that holds it. Returns None
    /// when no root does.
    pub fn load(&self, name: &str) -> Result<Option<SoundPack>, LoadError> {
        match self.find(name) {
            Some(dir) => PackLoader::load(&dir).map(Some),
            None => {
                info!(pack = name, "Sound pack not found");
                Ok(None)
            }
        }
    }

    /// Returns the directory of the named pack, if any root holds it.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(SOUND_DIR).join(name))
            .find(|dir| {
                let found = dir.join(CONFIG_FILE).is_file();
                debug!(dir = %dir.display(), found, "Searching for sound pack");
                found
            })
    }

    /// Lists the names of every installed pack.
    pub fn list(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for root in &self.roots {
            let sound_dir = root.join(SOUND_DIR);
            let entries = match fs::read_dir(&sound_dir) {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(dir = %sound_dir.display(), err = %e, "Error listing sound packs");
                        continue;
                    }
                };
                if entry.path().join(CONFIG_FILE).is_file() {
                    names.insert(entry.file_name().to_string_lossy().into_owned());
                }
            }
        }
        names
    }
}

/// Returns the working directory and the executable's directory, where they
/// can be determined.
pub fn default_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    match env::current_dir() {
        Ok(dir) => roots.push(dir),
        Err(e) => warn!(err = %e, "Unable to determine the working directory"),
    }
    match env::current_exe() {
        Ok(exe) => {
            if let Some(dir) = exe.parent() {
                roots.push(dir.to_path_buf());
            }
        }
        Err(e) => warn!(err = %e, "Unable to determine the executable directory"),
    }
    roots
}
