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
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::audio::format::PcmFormat;
use crate::resource::{AudioResource, Clip};

mod error;
pub mod loader;
pub mod repository;

pub use error::LoadError;
pub use loader::PackLoader;
pub use repository::PackRepository;

/// A keyboard key code: a scan code, optionally OR'd with an extended-key
/// marker such as 0xE000 or 0xE100.
pub type KeyCode = u16;

/// A named bundle of one audio resource and the clips its keys play.
///
/// Several key codes may share one clip. Dropping the pack releases every
/// distinct clip once and then the resource.
pub struct SoundPack {
    name: String,

    // Declared before the resource so the clips are released first.
    clips: HashMap<KeyCode, Arc<Clip>>,
    resource: Arc<AudioResource>,
}

impl SoundPack {
    pub fn new(
        name: String,
        resource: Arc<AudioResource>,
        clips: HashMap<KeyCode, Arc<Clip>>,
    ) -> SoundPack {
        SoundPack {
            name,
            clips,
            resource,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the clip mapped to the given key, if any.
    pub fn clip(&self, key: KeyCode) -> Option<&Arc<Clip>> {
        self.clips.get(&key)
    }

    /// Returns each distinct clip once, however many keys map to it.
    pub fn distinct_clips(&self) -> Vec<Arc<Clip>> {
        let mut distinct: Vec<Arc<Clip>> = Vec::new();
        for clip in self.clips.values() {
            if !distinct.iter().any(|seen| Arc::ptr_eq(seen, clip)) {
                distinct.push(Arc::clone(clip));
            }
        }
        distinct
    }

    /// Returns the number of mapped key codes, aliases included.
    pub fn key_count(&self) -> usize {
        self.clips.len()
    }

    /// Returns the mapped key codes in ascending order.
    pub fn keys(&self) -> Vec<KeyCode> {
        let mut keys: Vec<KeyCode> = self.clips.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn format(&self) -> PcmFormat {
        self.resource.format()
    }

    pub fn resource(&self) -> &Arc<AudioResource> {
        &self.resource
    }

    /// Returns the number of payload bytes held by the pack.
    pub fn memory_size(&self) -> usize {
        self.resource.len()
    }
}

impl fmt::Debug for SoundPack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundPack")
            .field("name", &self.name)
            .field("keys", &self.clips.len())
            .field("resource", &self.resource)
            .finish()
    }
}

impl Drop for SoundPack {
    fn drop(&mut self) {
        info!(
            pack = %self.name,
            keys = self.clips.len(),
            bytes = self.resource.len(),
            "Releasing sound pack"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::audio::format::SampleFormat;

    fn resource() -> Arc<AudioResource> {
        let format = PcmFormat::new(1, 1000, 16, SampleFormat::Int).unwrap();
        Arc::new(AudioResource::new(format, vec![0; 2000]).unwrap())
    }

    #[test]
    fn test_distinct_clips() {
        let resource = resource();
        let a = Arc::new(resource.slice(0, 100).unwrap());
        let b = Arc::new(resource.slice(100, 100).unwrap());

        let mut clips = HashMap::new();
        clips.insert(1, Arc::clone(&a));
        clips.insert(2, Arc::clone(&b));
        clips.insert(0xe001, Arc::clone(&a));

        let pack = SoundPack::new("test".to_string(), resource, clips);
        assert_eq!(pack.key_count(), 3);
        assert_eq!(pack.keys(), vec![1, 2, 0xe001]);
        assert_eq!(pack.distinct_clips().len(), 2);
        assert_eq!(pack.memory_size(), 2000);
        assert!(Arc::ptr_eq(pack.clip(1).unwrap(), pack.clip(0xe001).unwrap()));
        assert!(pack.clip(3).is_none());
    }

    #[test]
    fn test_drop_releases_everything() {
        let resource = resource();
        let clip = Arc::new(resource.slice(0, 100).unwrap());
        let weak_clip: Weak<Clip> = Arc::downgrade(&clip);
        let weak_resource = Arc::downgrade(&resource);

        let mut clips = HashMap::new();
        clips.insert(1, Arc::clone(&clip));
        clips.insert(2, clip);
        let pack = SoundPack::new("test".to_string(), resource, clips);

        assert_eq!(weak_clip.strong_count(), 2);
        drop(pack);
        assert!(weak_clip.upgrade().is_none());
        assert!(weak_resource.upgrade().is_none());
    }
}
