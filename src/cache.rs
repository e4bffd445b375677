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

//! Fixed-capacity asset slot table

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::data::AssetData;
use crate::error::{AssetError, Result};
use crate::handle::AssetHandle;
use crate::identity::AssetIdentity;
use crate::request::ImportParams;
use crate::vfs::WatchId;

/// Continuation for one `request` call; invoked exactly once
pub type AssetCallback = Box<dyn for<'a> FnOnce(Result<AssetRef<'a>>)>;

/// Callbacks parked on a slot while it loads
pub(crate) type Waiters = SmallVec<[AssetCallback; 1]>;

/// Assets a slot holds one reference to while it lives
pub(crate) type Dependencies = SmallVec<[AssetHandle; 2]>;

/// Lifecycle of a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    Empty,
    Initialized,
    Loading,
    Loaded,
}

/// Borrowed view of a loaded asset handed to callbacks
#[derive(Clone, Copy, Debug)]
pub struct AssetRef<'a> {
    handle: AssetHandle,
    identity: &'a AssetIdentity,
    data: &'a AssetData,
    reference_count: i32,
}

impl<'a> AssetRef<'a> {
    pub fn handle(&self) -> AssetHandle {
        self.handle
    }

    pub fn identity(&self) -> &'a AssetIdentity {
        self.identity
    }

    pub fn data(&self) -> &'a AssetData {
        self.data
    }

    pub fn reference_count(&self) -> i32 {
        self.reference_count
    }
}

/// One entry of the slot table
pub struct AssetSlot {
    identity: Option<AssetIdentity>,
    state: SlotState,
    generation: u32,
    reference_count: i32,
    auto_release: bool,
    watch_id: Option<WatchId>,
    data: Option<AssetData>,
    import_params: Option<ImportParams>,
    watch_requested: bool,
    waiters: Waiters,
    dependencies: Dependencies,
}

impl AssetSlot {
    fn empty() -> Self {
        Self {
            identity: None,
            state: SlotState::Empty,
            generation: 0,
            reference_count: 0,
            auto_release: false,
            watch_id: None,
            data: None,
            import_params: None,
            watch_requested: false,
            waiters: SmallVec::new(),
            dependencies: SmallVec::new(),
        }
    }

    /// Back to `Empty`; the generation stays so older handles read as stale
    fn reset(&mut self) {
        let generation = self.generation;
        *self = Self::empty();
        self.generation = generation;
    }

    pub fn identity(&self) -> Option<&AssetIdentity> {
        self.identity.as_ref()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn reference_count(&self) -> i32 {
        self.reference_count
    }

    pub fn auto_release(&self) -> bool {
        self.auto_release
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch_id
    }

    pub fn data(&self) -> Option<&AssetData> {
        self.data.as_ref()
    }

    pub fn import_params(&self) -> Option<&ImportParams> {
        self.import_params.as_ref()
    }

    pub(crate) fn data_mut(&mut self) -> Option<&mut AssetData> {
        self.data.as_mut()
    }

    pub(crate) fn set_watch_id(&mut self, watch_id: Option<WatchId>) {
        self.watch_id = watch_id;
    }

    pub(crate) fn request_watch(&mut self) {
        self.watch_requested = true;
    }

    pub(crate) fn watch_requested(&self) -> bool {
        self.watch_requested
    }

    pub(crate) fn push_waiter(&mut self, callback: AssetCallback) {
        self.waiters.push(callback);
    }

    /// Assets loaded on behalf of this one
    pub fn dependencies(&self) -> &[AssetHandle] {
        &self.dependencies
    }

    pub(crate) fn add_dependency(&mut self, handle: AssetHandle) {
        self.dependencies.push(handle);
    }
}

/// What a release did to the slot
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// Still referenced, or kept resident without auto-release
    Retained { remaining: i32 },
    /// Count was already zero; nothing changed
    AlreadyZero,
    /// Slot went back to `Empty`; the payload needs handler cleanup
    Teardown(Teardown),
}

/// Payload removed from a slot that was torn down
#[derive(Debug)]
pub struct Teardown {
    pub identity: AssetIdentity,
    pub data: Option<AssetData>,
    /// Still referenced; the caller releases them
    pub dependencies: Vec<AssetHandle>,
}

/// Cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub failures: u64,
    pub releases: u64,
    pub teardowns: u64,
    pub capacity_rejections: u64,
    pub hot_reloads: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

/// Bounded slot table plus identity index.
///
/// There is no eviction: once every slot is occupied, new identities are
/// refused until something is released.
pub struct AssetCache {
    slots: Vec<AssetSlot>,
    index: AHashMap<AssetIdentity, u32>,
    stats: CacheStats,
}

impl AssetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| AssetSlot::empty()).collect(),
            index: AHashMap::with_capacity(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots that are not `Empty`
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    /// Handle of the slot holding `identity`, in any non-empty state
    pub fn find(&self, identity: &AssetIdentity) -> Option<AssetHandle> {
        self.index
            .get(identity)
            .map(|&index| self.handle_at(index, identity))
    }

    fn handle_at(&self, index: u32, identity: &AssetIdentity) -> AssetHandle {
        let slot = &self.slots[index as usize];
        AssetHandle::new(index, slot.generation, identity.asset_type())
    }

    /// Claim an empty slot for `identity` (cache miss path).
    ///
    /// Bumps the slot generation, so handles from its previous occupant go stale.
    pub fn reserve_slot(
        &mut self,
        identity: AssetIdentity,
        auto_release: bool,
        import_params: Option<ImportParams>,
    ) -> Result<AssetHandle> {
        debug_assert!(!self.index.contains_key(&identity));

        let Some(index) = self
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Empty)
        else {
            self.stats.capacity_rejections += 1;
            return Err(AssetError::CapacityExceeded {
                capacity: self.capacity(),
            });
        };

        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = SlotState::Initialized;
        slot.identity = Some(identity.clone());
        slot.auto_release = auto_release;
        slot.import_params = import_params;

        let index = index as u32;
        self.index.insert(identity.clone(), index);
        Ok(self.handle_at(index, &identity))
    }

    pub fn slot(&self, handle: AssetHandle) -> Result<&AssetSlot> {
        let slot = self.slots.get(handle.index() as usize).ok_or(AssetError::StaleHandle {
            index: handle.index(),
            generation: handle.generation(),
        })?;
        if slot.state == SlotState::Empty || !handle.is_valid_generation(slot.generation) {
            return Err(AssetError::StaleHandle {
                index: handle.index(),
                generation: handle.generation(),
            });
        }
        Ok(slot)
    }

    pub(crate) fn slot_mut(&mut self, handle: AssetHandle) -> Result<&mut AssetSlot> {
        self.slot(handle)?;
        Ok(&mut self.slots[handle.index() as usize])
    }

    pub(crate) fn set_state(&mut self, handle: AssetHandle, state: SlotState) -> Result<()> {
        self.slot_mut(handle)?.state = state;
        Ok(())
    }

    /// Add one reference
    pub fn acquire(&mut self, handle: AssetHandle) -> Result<i32> {
        let slot = self.slot_mut(handle)?;
        slot.reference_count += 1;
        Ok(slot.reference_count)
    }

    /// Drop one reference; tears the slot down at zero when auto-release is set
    pub fn release(&mut self, handle: AssetHandle) -> Result<ReleaseOutcome> {
        let slot = self.slot_mut(handle)?;
        if slot.reference_count <= 0 {
            return Ok(ReleaseOutcome::AlreadyZero);
        }

        slot.reference_count -= 1;
        let remaining = slot.reference_count;
        let tear_down = remaining == 0 && slot.auto_release && slot.state == SlotState::Loaded;
        self.stats.releases += 1;
        if tear_down {
            return Ok(ReleaseOutcome::Teardown(self.teardown(handle.index())?));
        }
        Ok(ReleaseOutcome::Retained { remaining })
    }

    /// Tear down regardless of references or auto-release (shutdown path)
    pub fn force_release(&mut self, handle: AssetHandle) -> Result<Teardown> {
        self.slot(handle)?;
        self.teardown(handle.index())
    }

    fn teardown(&mut self, index: u32) -> Result<Teardown> {
        let slot = &mut self.slots[index as usize];
        let identity = slot.identity.take().ok_or_else(|| {
            AssetError::InternalFailure(format!("slot {index} is live without an identity"))
        })?;
        let data = slot.data.take();
        let dependencies = std::mem::take(&mut slot.dependencies).into_vec();
        debug_assert!(slot.waiters.is_empty());
        slot.reset();

        self.index.remove(&identity);
        self.stats.teardowns += 1;
        Ok(Teardown {
            identity,
            data,
            dependencies,
        })
    }

    /// Store the payload, mark the slot `Loaded` and hand back its waiters
    pub(crate) fn complete_load(&mut self, handle: AssetHandle, data: AssetData) -> Result<Waiters> {
        let slot = self.slot_mut(handle)?;
        slot.data = Some(data);
        slot.state = SlotState::Loaded;
        let waiters = std::mem::take(&mut slot.waiters);
        self.stats.loads += 1;
        Ok(waiters)
    }

    /// Return the slot to `Empty` after a failed load.
    ///
    /// Hands back its waiters and any dependencies acquired before the failure.
    pub(crate) fn fail_load(&mut self, handle: AssetHandle) -> Result<(Waiters, Dependencies)> {
        let slot = self.slot_mut(handle)?;
        let waiters = std::mem::take(&mut slot.waiters);
        let dependencies = std::mem::take(&mut slot.dependencies);
        let identity = slot.identity.take();
        slot.reset();
        if let Some(identity) = identity {
            self.index.remove(&identity);
        }
        self.stats.failures += 1;
        Ok((waiters, dependencies))
    }

    /// View for callbacks
    pub fn asset_ref(&self, handle: AssetHandle) -> Result<AssetRef<'_>> {
        let slot = self.slot(handle)?;
        match (&slot.identity, &slot.data) {
            (Some(identity), Some(data)) if slot.state == SlotState::Loaded => Ok(AssetRef {
                handle,
                identity,
                data,
                reference_count: slot.reference_count,
            }),
            (identity, _) => Err(AssetError::NotLoaded(
                identity
                    .as_ref()
                    .map(|i| i.to_string())
                    .unwrap_or_default(),
            )),
        }
    }

    /// Handles of every non-empty slot, in slot order
    pub fn handles(&self) -> Vec<AssetHandle> {
        let mut handles: Vec<_> = self
            .index
            .iter()
            .map(|(identity, &index)| self.handle_at(index, identity))
            .collect();
        handles.sort_by_key(|h| h.index());
        handles
    }

    /// Resident identities matching `package` and `name`, any type
    pub fn find_named(&self, package: &str, name: &str) -> Vec<AssetHandle> {
        self.index
            .iter()
            .filter(|(identity, _)| {
                identity.package().as_str() == package && identity.name().as_str() == name
            })
            .map(|(identity, &index)| self.handle_at(index, identity))
            .collect()
    }
}
