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

//! Virtual file system interface consumed by the asset server
//!
//! The VFS performs the actual I/O. Results and file-watch notifications come
//! back as [`VfsEvent`]s over a channel, and the owning thread drains that
//! channel in `AssetServer::update`.

pub mod memory;

pub use memory::MemoryVfs;

use crossbeam::channel::Sender;

use crate::data::AssetSource;
use crate::error::{AssetError, Result};
use crate::identity::AssetIdentity;

slotmap::new_key_type! {
    /// Identifier of one file-watch registration
    pub struct WatchId;
}

/// Identifies one outstanding load across VFS round trips
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(pub u64);

/// Which file to read and how to transport it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VfsRequest {
    pub identity: AssetIdentity,
    pub is_binary: bool,
}

impl VfsRequest {
    pub fn new(identity: AssetIdentity, is_binary: bool) -> Self {
        Self {
            identity,
            is_binary,
        }
    }
}

/// Notification delivered to the owning thread
#[derive(Debug)]
pub enum VfsEvent {
    /// An asynchronous read finished
    Loaded {
        ticket: LoadTicket,
        tag: u32,
        result: Result<AssetSource>,
    },
    /// A watched file changed on disk
    FileWritten(WatchId),
    /// A watched file was removed
    FileDeleted(WatchId),
}

/// One-shot completion for an asynchronous read.
///
/// Consumed by [`VfsReply::complete`]. A reply dropped without completing
/// reports `VfsRequestFailed`, so a load can never hang on a lost reply.
pub struct VfsReply {
    ticket: LoadTicket,
    tag: u32,
    events: Sender<VfsEvent>,
    delivered: bool,
}

impl VfsReply {
    pub(crate) fn new(ticket: LoadTicket, tag: u32, events: Sender<VfsEvent>) -> Self {
        Self {
            ticket,
            tag,
            events,
            delivered: false,
        }
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn complete(mut self, result: Result<AssetSource>) {
        self.deliver(result);
    }

    fn deliver(&mut self, result: Result<AssetSource>) {
        self.delivered = true;
        let event = VfsEvent::Loaded {
            ticket: self.ticket,
            tag: self.tag,
            result,
        };
        if self.events.send(event).is_err() {
            tracing::debug!(ticket = self.ticket.0, "asset server gone, dropping vfs result");
        }
    }
}

impl Drop for VfsReply {
    fn drop(&mut self) {
        if !self.delivered {
            self.deliver(Err(AssetError::VfsRequestFailed(
                "request dropped without completion".to_string(),
            )));
        }
    }
}

/// File access used by handlers
pub trait Vfs: Send {
    /// Start a read; the result arrives through `reply`
    fn request_asset(&mut self, request: VfsRequest, reply: VfsReply);

    /// Blocking read
    fn request_asset_sync(&mut self, request: &VfsRequest) -> Result<AssetSource>;

    /// Register for written/deleted notifications on the file behind `identity`
    fn watch_file(&mut self, identity: &AssetIdentity, notify: Sender<VfsEvent>) -> Result<WatchId>;

    fn unwatch_file(&mut self, watch_id: WatchId);
}
