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

use ahash::AHashMap;
use crossbeam::channel::Sender;
use parking_lot::Mutex;
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::data::AssetSource;
use crate::error::{AssetError, Result};
use crate::identity::AssetIdentity;
use crate::vfs::{Vfs, VfsEvent, VfsReply, VfsRequest, WatchId};

/// When asynchronous reads complete
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionMode {
    /// Result is queued on the event channel during `request_asset`
    Immediate,
    /// Requests wait until [`MemoryVfs::flush`]
    Deferred,
}

struct WatchRegistration {
    identity: AssetIdentity,
    notify: Sender<VfsEvent>,
}

struct MemoryVfsState {
    files: AHashMap<AssetIdentity, AssetSource>,
    mode: CompletionMode,
    queued: VecDeque<(VfsRequest, VfsReply)>,
    watches: SlotMap<WatchId, WatchRegistration>,
    reads: usize,
}

impl MemoryVfsState {
    fn read(&mut self, request: &VfsRequest) -> Result<AssetSource> {
        self.reads += 1;
        let source = self.files.get(&request.identity).ok_or_else(|| {
            AssetError::VfsRequestFailed(format!("{} not found", request.identity))
        })?;

        if request.is_binary {
            Ok(AssetSource::Binary(source.as_bytes().to_vec()))
        } else {
            let text = source.as_text().map_err(|_| {
                AssetError::VfsRequestFailed(format!("{} is not valid text", request.identity))
            })?;
            Ok(AssetSource::Text(text.to_string()))
        }
    }

    fn notify(&self, identity: &AssetIdentity, event: impl Fn(WatchId) -> VfsEvent) -> usize {
        let mut sent = 0;
        for (id, watch) in &self.watches {
            if &watch.identity == identity && watch.notify.send(event(id)).is_ok() {
                sent += 1;
            }
        }
        sent
    }
}

/// In-memory package store.
///
/// Clones share the same files, queue and watches.
#[derive(Clone)]
pub struct MemoryVfs {
    inner: Arc<Mutex<MemoryVfsState>>,
}

impl MemoryVfs {
    pub fn new() -> Self {
        Self::with_mode(CompletionMode::Immediate)
    }

    /// Asynchronous reads stay queued until [`MemoryVfs::flush`]
    pub fn deferred() -> Self {
        Self::with_mode(CompletionMode::Deferred)
    }

    pub fn with_mode(mode: CompletionMode) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryVfsState {
                files: AHashMap::new(),
                mode,
                queued: VecDeque::new(),
                watches: SlotMap::with_key(),
                reads: 0,
            })),
        }
    }

    /// Store a file without notifying watchers
    pub fn insert(&self, identity: AssetIdentity, source: AssetSource) {
        self.inner.lock().files.insert(identity, source);
    }

    pub fn insert_text(&self, identity: AssetIdentity, text: impl Into<String>) {
        self.insert(identity, AssetSource::Text(text.into()));
    }

    pub fn insert_binary(&self, identity: AssetIdentity, bytes: Vec<u8>) {
        self.insert(identity, AssetSource::Binary(bytes));
    }

    /// Replace a file and notify its watchers; returns notifications sent
    pub fn write_file(&self, identity: &AssetIdentity, source: AssetSource) -> usize {
        let mut state = self.inner.lock();
        state.files.insert(identity.clone(), source);
        state.notify(identity, VfsEvent::FileWritten)
    }

    /// Remove a file and notify its watchers; returns notifications sent
    pub fn delete_file(&self, identity: &AssetIdentity) -> usize {
        let mut state = self.inner.lock();
        state.files.remove(identity);
        state.notify(identity, VfsEvent::FileDeleted)
    }

    /// Complete every queued asynchronous read; returns how many completed
    pub fn flush(&self) -> usize {
        let queued: Vec<_> = self.inner.lock().queued.drain(..).collect();
        let count = queued.len();
        for (request, reply) in queued {
            let result = self.inner.lock().read(&request);
            reply.complete(result);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().queued.len()
    }

    /// Total reads served, sync and async
    pub fn read_count(&self) -> usize {
        self.inner.lock().reads
    }

    pub fn watch_count(&self) -> usize {
        self.inner.lock().watches.len()
    }
}

impl Default for MemoryVfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs for MemoryVfs {
    fn request_asset(&mut self, request: VfsRequest, reply: VfsReply) {
        let mut state = self.inner.lock();
        match state.mode {
            CompletionMode::Immediate => {
                let result = state.read(&request);
                drop(state);
                reply.complete(result);
            }
            CompletionMode::Deferred => state.queued.push_back((request, reply)),
        }
    }

    fn request_asset_sync(&mut self, request: &VfsRequest) -> Result<AssetSource> {
        self.inner.lock().read(request)
    }

    fn watch_file(&mut self, identity: &AssetIdentity, notify: Sender<VfsEvent>) -> Result<WatchId> {
        let mut state = self.inner.lock();
        let id = state.watches.insert(WatchRegistration {
            identity: identity.clone(),
            notify,
        });
        Ok(id)
    }

    fn unwatch_file(&mut self, watch_id: WatchId) {
        if self.inner.lock().watches.remove(watch_id).is_none() {
            tracing::warn!(?watch_id, "unwatch of unknown watch id");
        }
    }
}
