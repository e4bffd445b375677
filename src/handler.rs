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

//! Per-type asset handlers and the registry that holds them

use crossbeam::channel::Sender;

use crate::backend::RenderBackend;
use crate::cache::AssetRef;
use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::{AssetRequest, ImportParams};
use crate::vfs::{LoadTicket, Vfs, VfsEvent, VfsReply, VfsRequest};

/// Operations a handler actually provides.
///
/// A missing capability just disables that feature for the type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerCapabilities {
    /// Drives its own (possibly asynchronous) load through `request`
    pub request: bool,
    pub deserialize: bool,
    pub serialize: bool,
    pub hot_reload: bool,
}

impl HandlerCapabilities {
    /// deserialize + serialize, loaded inline by the server
    pub const INLINE: Self = Self {
        request: false,
        deserialize: true,
        serialize: true,
        hot_reload: false,
    };

    /// deserialize + serialize with handler-driven loads
    pub const ASYNC: Self = Self {
        request: true,
        deserialize: true,
        serialize: true,
        hot_reload: false,
    };

    pub const fn with_hot_reload(mut self) -> Self {
        self.hot_reload = true;
        self
    }

    /// Whether the server can produce a payload at all
    pub fn can_load(&self) -> bool {
        self.request || self.deserialize
    }
}

/// An asset a load needs from the cache before it can finish
#[derive(Clone, Debug)]
pub struct DependencyRequest {
    pub request: AssetRequest,
    /// Handed back to `on_dependency_loaded`
    pub tag: u32,
}

/// Collaborators passed explicitly into every handler call.
///
/// Dependency requests are only honoured from `request`, `on_source_loaded`
/// and `on_dependency_loaded` of a load that answers `Pending`.
pub struct HandlerContext<'a> {
    pub vfs: &'a mut dyn Vfs,
    pub backend: &'a mut dyn RenderBackend,
    dependencies: Vec<DependencyRequest>,
}

impl<'a> HandlerContext<'a> {
    pub fn new(vfs: &'a mut dyn Vfs, backend: &'a mut dyn RenderBackend) -> Self {
        Self {
            vfs,
            backend,
            dependencies: Vec::new(),
        }
    }

    /// Ask the cache for another asset on behalf of the current load.
    ///
    /// The server requests it once the handler returns, keeps one reference
    /// to it for as long as the dependent asset lives, and reports it through
    /// `on_dependency_loaded` with `tag`. A failed dependency fails the load.
    pub fn request_dependency(&mut self, request: AssetRequest, tag: u32) {
        self.dependencies.push(DependencyRequest { request, tag });
    }

    pub fn dependencies(&self) -> &[DependencyRequest] {
        &self.dependencies
    }

    pub(crate) fn into_dependencies(self) -> Vec<DependencyRequest> {
        self.dependencies
    }
}

/// The load a handler is working on
pub struct LoadRequest<'a> {
    identity: &'a AssetIdentity,
    import_params: Option<&'a ImportParams>,
    synchronous: bool,
    ticket: LoadTicket,
    events: &'a Sender<VfsEvent>,
}

impl<'a> LoadRequest<'a> {
    pub(crate) fn new(
        identity: &'a AssetIdentity,
        import_params: Option<&'a ImportParams>,
        synchronous: bool,
        ticket: LoadTicket,
        events: &'a Sender<VfsEvent>,
    ) -> Self {
        Self {
            identity,
            import_params,
            synchronous,
            ticket,
            events,
        }
    }

    pub fn identity(&self) -> &AssetIdentity {
        self.identity
    }

    pub fn import_params(&self) -> Option<&ImportParams> {
        self.import_params
    }

    pub fn synchronous(&self) -> bool {
        self.synchronous
    }

    /// Stable across every stage of this load
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Completion routed back to this load, carrying `tag`
    pub fn reply(&self, tag: u32) -> VfsReply {
        VfsReply::new(self.ticket, tag, self.events.clone())
    }

    /// Read `request` the way this load was asked for.
    ///
    /// Synchronous loads get `Some(source)` back; asynchronous loads get `None`
    /// and the source arrives later through `on_source_loaded` with `tag`.
    pub fn fetch(
        &self,
        vfs: &mut dyn Vfs,
        request: VfsRequest,
        tag: u32,
    ) -> Result<Option<AssetSource>> {
        if self.synchronous {
            vfs.request_asset_sync(&request).map(Some)
        } else {
            vfs.request_asset(request, self.reply(tag));
            Ok(None)
        }
    }
}

/// What a handler step produced
#[derive(Debug)]
pub enum RequestOutcome {
    /// Payload is complete
    Ready(AssetData),
    /// More VFS reads are in flight for this ticket
    Pending,
}

/// Load/release/serialize/hot-reload behaviour for one asset type.
///
/// Only methods covered by [`AssetHandler::capabilities`] are called by the
/// server; the defaults of the others report `Unsupported`.
pub trait AssetHandler: Send {
    fn asset_type(&self) -> AssetType;

    fn capabilities(&self) -> HandlerCapabilities;

    /// Byte or text transport from the VFS
    fn is_binary(&self) -> bool {
        self.asset_type().is_binary()
    }

    /// Start a load. The default reads the asset's own file and finishes in
    /// `on_source_loaded`.
    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        load: &LoadRequest<'_>,
    ) -> Result<RequestOutcome> {
        let request = VfsRequest::new(load.identity().clone(), self.is_binary());
        match load.fetch(ctx.vfs, request, 0)? {
            Some(source) => self.on_source_loaded(ctx, load, source, 0),
            None => Ok(RequestOutcome::Pending),
        }
    }

    /// A read issued by this handler finished
    fn on_source_loaded(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        load: &LoadRequest<'_>,
        source: AssetSource,
        _tag: u32,
    ) -> Result<RequestOutcome> {
        self.deserialize(load.identity(), &source, load.import_params())
            .map(RequestOutcome::Ready)
    }

    /// A dependency asked for through [`HandlerContext::request_dependency`] is loaded
    fn on_dependency_loaded(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _load: &LoadRequest<'_>,
        _dependency: AssetRef<'_>,
        _tag: u32,
    ) -> Result<RequestOutcome> {
        Err(self.unsupported("dependency load"))
    }

    /// The load behind `ticket` failed or was dropped; forget any state kept for it
    fn abandon(&mut self, _ticket: LoadTicket) {}

    /// Last step before the payload goes live (GPU upload and the like).
    /// On error the handler must leave nothing allocated.
    fn finalize(&mut self, _ctx: &mut HandlerContext<'_>, _data: &mut AssetData) -> Result<()> {
        Ok(())
    }

    /// Free type-specific resources of a payload being torn down.
    /// Dependencies are released by the server afterwards.
    fn release(&mut self, _ctx: &mut HandlerContext<'_>, _data: &mut AssetData) {}

    fn deserialize(
        &self,
        _identity: &AssetIdentity,
        _source: &AssetSource,
        _params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        Err(self.unsupported("deserialize"))
    }

    fn serialize(&self, _data: &AssetData) -> Result<AssetSource> {
        Err(self.unsupported("serialize"))
    }

    /// Apply a freshly deserialized payload onto the live one in place
    fn on_hot_reload(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        _live: &mut AssetData,
        _fresh: AssetData,
    ) -> Result<()> {
        Err(self.unsupported("hot reload"))
    }

    fn unsupported(&self, operation: &'static str) -> AssetError {
        AssetError::Unsupported {
            asset_type: self.asset_type(),
            operation,
        }
    }
}

/// Payload of the wrong variant handed to a handler
pub(crate) fn wrong_payload(expected: AssetType, got: &AssetData) -> AssetError {
    AssetError::InternalFailure(format!(
        "{expected} handler received a {} payload",
        got.asset_type()
    ))
}

/// Fixed table of handlers indexed by asset type
pub struct HandlerRegistry {
    handlers: [Option<Box<dyn AssetHandler>>; AssetType::COUNT],
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Install `handler` for its type, returning whatever it replaced
    pub fn register(&mut self, handler: Box<dyn AssetHandler>) -> Option<Box<dyn AssetHandler>> {
        let asset_type = handler.asset_type();
        let previous = self.handlers[asset_type.index()].replace(handler);
        if previous.is_some() {
            tracing::debug!(%asset_type, "replacing registered asset handler");
        }
        previous
    }

    pub fn unregister(&mut self, asset_type: AssetType) -> Option<Box<dyn AssetHandler>> {
        self.handlers[asset_type.index()].take()
    }

    pub fn get(&self, asset_type: AssetType) -> Option<&dyn AssetHandler> {
        self.handlers[asset_type.index()].as_deref()
    }

    pub fn get_mut(&mut self, asset_type: AssetType) -> Option<&mut (dyn AssetHandler + 'static)> {
        self.handlers[asset_type.index()].as_deref_mut()
    }

    pub fn contains(&self, asset_type: AssetType) -> bool {
        self.handlers[asset_type.index()].is_some()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.iter().filter(|h| h.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandler(AssetType);

    impl AssetHandler for NullHandler {
        fn asset_type(&self) -> AssetType {
            self.0
        }

        fn capabilities(&self) -> HandlerCapabilities {
            HandlerCapabilities::default()
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(AssetType::Shader).is_none());

        assert!(registry
            .register(Box::new(NullHandler(AssetType::Shader)))
            .is_none());
        assert!(registry.contains(AssetType::Shader));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(NullHandler(AssetType::Text)));
        let previous = registry.register(Box::new(NullHandler(AssetType::Text)));
        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_operations_are_unsupported() {
        let handler = NullHandler(AssetType::Scene);
        assert!(!handler.capabilities().can_load());
        let err = handler
            .serialize(&AssetData::Text(crate::handlers::text::TextAsset {
                content: String::new(),
            }))
            .unwrap_err();
        assert!(matches!(err, AssetError::Unsupported { .. }));
    }

    #[test]
    fn test_context_collects_dependency_requests() {
        let mut vfs = crate::vfs::MemoryVfs::new();
        let mut backend = crate::backend::HeadlessBackend::new();
        let mut ctx = HandlerContext::new(&mut vfs, &mut backend);
        ctx.request_dependency(AssetRequest::new(AssetType::Binary, "face"), 7);
        assert_eq!(ctx.dependencies().len(), 1);

        let requests = ctx.into_dependencies();
        assert_eq!(requests[0].tag, 7);
        assert_eq!(requests[0].request.asset_type, AssetType::Binary);
    }
}
