// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hot-reload watch table
//!
//! Maps VFS watch ids to the asset identity they protect. Entries live
//! independently of the cache: a watch survives its asset being released and
//! only goes away on file deletion or an explicit unwatch.

use ahash::AHashMap;

use crate::identity::AssetIdentity;
use crate::vfs::WatchId;

/// One registered watch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEntry {
    pub watch_id: WatchId,
    pub identity: AssetIdentity,
}

/// Watch id ↔ identity index
#[derive(Default)]
pub struct WatchTable {
    by_id: AHashMap<WatchId, AssetIdentity>,
    by_identity: AHashMap<AssetIdentity, WatchId>,
}

impl WatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a watch; an older watch for the same identity is returned
    pub fn insert(&mut self, watch_id: WatchId, identity: AssetIdentity) -> Option<WatchId> {
        let previous = self.by_identity.insert(identity.clone(), watch_id);
        if let Some(old) = previous {
            self.by_id.remove(&old);
        }
        self.by_id.insert(watch_id, identity);
        previous
    }

    /// Identity protected by `watch_id` (what the VFS notifies with)
    pub fn resolve(&self, watch_id: WatchId) -> Option<&AssetIdentity> {
        self.by_id.get(&watch_id)
    }

    pub fn id_of(&self, identity: &AssetIdentity) -> Option<WatchId> {
        self.by_identity.get(identity).copied()
    }

    pub fn remove_id(&mut self, watch_id: WatchId) -> Option<WatchEntry> {
        let identity = self.by_id.remove(&watch_id)?;
        self.by_identity.remove(&identity);
        Some(WatchEntry { watch_id, identity })
    }

    pub fn remove_identity(&mut self, identity: &AssetIdentity) -> Option<WatchEntry> {
        let watch_id = self.by_identity.remove(identity)?;
        self.by_id.remove(&watch_id);
        Some(WatchEntry {
            watch_id,
            identity: identity.clone(),
        })
    }

    /// Take every entry, leaving the table empty
    pub fn drain(&mut self) -> Vec<WatchEntry> {
        self.by_identity.clear();
        self.by_id
            .drain()
            .map(|(watch_id, identity)| WatchEntry { watch_id, identity })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AssetType;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<WatchId> {
        let mut map: SlotMap<WatchId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn identity(name: &str) -> AssetIdentity {
        AssetIdentity::new("game", name, AssetType::Material).unwrap()
    }

    #[test]
    fn test_insert_resolve_remove() {
        let ids = ids(1);
        let mut table = WatchTable::new();
        assert!(table.insert(ids[0], identity("rock")).is_none());

        assert_eq!(table.resolve(ids[0]), Some(&identity("rock")));
        assert_eq!(table.id_of(&identity("rock")), Some(ids[0]));

        let entry = table.remove_id(ids[0]).unwrap();
        assert_eq!(entry.identity, identity("rock"));
        assert!(table.is_empty());
        assert!(table.id_of(&identity("rock")).is_none());
    }

    #[test]
    fn test_rewatch_replaces_old_id() {
        let ids = ids(2);
        let mut table = WatchTable::new();
        table.insert(ids[0], identity("rock"));
        assert_eq!(table.insert(ids[1], identity("rock")), Some(ids[0]));
        assert!(table.resolve(ids[0]).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_drain() {
        let ids = ids(2);
        let mut table = WatchTable::new();
        table.insert(ids[0], identity("rock"));
        table.insert(ids[1], identity("moss"));

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert!(table.is_empty());
        assert!(table.id_of(&identity("moss")).is_none());
    }
}
