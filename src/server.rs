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

//! Asset server: request dispatch, completion routing, release and hot reload
//!
//! All state is owned by one thread. VFS completions, file notifications and
//! finished handler dependencies are queued on channels and applied by
//! [`AssetServer::update`].

use ahash::AHashMap;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};

use crate::backend::RenderBackend;
use crate::cache::{
    AssetCache, AssetCallback, AssetRef, CacheStats, ReleaseOutcome, SlotState, Teardown, Waiters,
};
use crate::config::AssetServerConfig;
use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handle::AssetHandle;
use crate::handler::{
    AssetHandler, DependencyRequest, HandlerContext, HandlerRegistry, LoadRequest, RequestOutcome,
};
use crate::handlers::register_builtin_handlers;
use crate::identity::{AssetIdentity, Name};
use crate::request::{AssetRequest, ImportParams};
use crate::vfs::{LoadTicket, Vfs, VfsEvent, VfsRequest, WatchId};
use crate::watch::WatchTable;

/// Multi-stage load waiting on VFS results or dependencies
struct PendingLoad {
    handle: AssetHandle,
    identity: AssetIdentity,
    synchronous: bool,
}

/// A dependency request answered by the cache
struct DependencyEvent {
    ticket: LoadTicket,
    tag: u32,
    result: Result<AssetHandle>,
}

/// Typed asset cache front end
pub struct AssetServer {
    config: AssetServerConfig,
    default_package: Name,
    cache: AssetCache,
    handlers: HandlerRegistry,
    watches: WatchTable,
    vfs: Box<dyn Vfs>,
    backend: Box<dyn RenderBackend>,
    events_tx: Sender<VfsEvent>,
    events_rx: Receiver<VfsEvent>,
    deps_tx: Sender<DependencyEvent>,
    deps_rx: Receiver<DependencyEvent>,
    pending: AHashMap<LoadTicket, PendingLoad>,
    next_ticket: u64,
    shut_down: bool,
}

impl AssetServer {
    /// Create a server with an empty handler registry.
    ///
    /// The config is validated here; an invalid config never yields a server.
    pub fn new(
        config: AssetServerConfig,
        vfs: impl Vfs + 'static,
        backend: impl RenderBackend + 'static,
    ) -> Result<Self> {
        config.validate()?;
        let default_package = Name::new(&config.default_package_name)
            .ok_or_else(|| AssetError::Config("default_package_name must not be empty".into()))?;
        let (events_tx, events_rx) = unbounded();
        let (deps_tx, deps_rx) = unbounded();

        Ok(Self {
            cache: AssetCache::new(config.max_asset_count as usize),
            config,
            default_package,
            handlers: HandlerRegistry::new(),
            watches: WatchTable::new(),
            vfs: Box::new(vfs),
            backend: Box::new(backend),
            events_tx,
            events_rx,
            deps_tx,
            deps_rx,
            pending: AHashMap::new(),
            next_ticket: 0,
            shut_down: false,
        })
    }

    /// Create a server with every built-in handler registered
    pub fn with_builtin_handlers(
        config: AssetServerConfig,
        vfs: impl Vfs + 'static,
        backend: impl RenderBackend + 'static,
    ) -> Result<Self> {
        let mut server = Self::new(config, vfs, backend)?;
        register_builtin_handlers(&mut server.handlers);
        Ok(server)
    }

    pub fn config(&self) -> &AssetServerConfig {
        &self.config
    }

    /// Install `handler` for its asset type; returns the handler it replaced
    pub fn register_handler(
        &mut self,
        handler: Box<dyn AssetHandler>,
    ) -> Option<Box<dyn AssetHandler>> {
        self.handlers.register(handler)
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    /// Request an asset.
    ///
    /// `callback` runs exactly once. On a cache hit it runs before `request`
    /// returns; on a miss it runs when the load finishes, which for
    /// asynchronous handlers is inside a later [`AssetServer::update`]. Every
    /// successful callback owns one reference that must be released.
    pub fn request<F>(&mut self, req: AssetRequest, callback: F)
    where
        F: for<'a> FnOnce(Result<AssetRef<'a>>) + 'static,
    {
        #[cfg(feature = "profiling")]
        let span = tracing::info_span!("asset_request", asset_type = %req.asset_type, name = %req.name);
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        self.dispatch(req, Box::new(callback));
    }

    /// Request an asset, receiving its handle on a channel instead of a callback
    pub fn request_deferred(&mut self, req: AssetRequest) -> Receiver<Result<AssetHandle>> {
        let (tx, rx) = bounded(1);
        self.request(req, move |result| {
            if tx.send(result.map(|asset| asset.handle())).is_err() {
                tracing::debug!("deferred asset receiver dropped");
            }
        });
        rx
    }

    /// Load synchronously and return the handle (one reference taken).
    ///
    /// An identity already loading asynchronously is pumped once; if it is
    /// still in flight afterwards this returns `NotLoaded`.
    pub fn load_sync(&mut self, req: AssetRequest) -> Result<AssetHandle> {
        let req = req.synchronous(true);
        let identity = req.identity(&self.default_package)?;
        if self.state_of(&identity) == SlotState::Loading {
            self.update();
            if self.state_of(&identity) == SlotState::Loading {
                return Err(AssetError::NotLoaded(identity.to_string()));
            }
        }

        let rx = self.request_deferred(req);
        rx.try_recv().unwrap_or_else(|_| {
            Err(AssetError::InternalFailure(format!(
                "synchronous load of {identity} did not complete"
            )))
        })
    }

    fn dispatch(&mut self, req: AssetRequest, callback: AssetCallback) {
        if self.shut_down {
            callback(Err(AssetError::InternalFailure(
                "asset server is shut down".to_string(),
            )));
            return;
        }
        let identity = match req.identity(&self.default_package) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!(name = %req.name, error = %err, "rejected asset request");
                callback(Err(err));
                return;
            }
        };

        if let Some(handle) = self.cache.find(&identity) {
            self.join_existing(handle, &identity, &req, callback);
            return;
        }

        self.cache.stats_mut().misses += 1;

        let loadable = self
            .handlers
            .get(identity.asset_type())
            .is_some_and(|handler| handler.capabilities().can_load());
        if !loadable {
            tracing::warn!(asset = %identity, "no handler for asset type");
            self.cache.stats_mut().failures += 1;
            callback(Err(AssetError::NoHandler(identity.asset_type())));
            return;
        }

        let handle = match self.cache.reserve_slot(
            identity.clone(),
            req.auto_release,
            req.import_params.clone(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(asset = %identity, error = %err, "asset request refused");
                callback(Err(err));
                return;
            }
        };

        match self.cache.slot_mut(handle) {
            Ok(slot) => {
                if req.watch {
                    slot.request_watch();
                }
                slot.push_waiter(callback);
            }
            Err(err) => {
                callback(Err(err));
                return;
            }
        }

        self.start_load(handle, identity, req.synchronous);
    }

    /// Hit path, or join a load already in flight for this identity
    fn join_existing(
        &mut self,
        handle: AssetHandle,
        identity: &AssetIdentity,
        req: &AssetRequest,
        callback: AssetCallback,
    ) {
        let state = match self.cache.slot(handle) {
            Ok(slot) => slot.state(),
            Err(err) => {
                callback(Err(err));
                return;
            }
        };

        if state == SlotState::Loaded {
            self.cache.stats_mut().hits += 1;
            if req.watch {
                if let Err(err) = self.watch(identity) {
                    tracing::warn!(asset = %identity, error = %err, "could not watch asset");
                }
            }
            let result = self
                .cache
                .acquire(handle)
                .and_then(|_| self.cache.asset_ref(handle));
            callback(result);
            return;
        }

        tracing::debug!(asset = %identity, "joining in-flight load");
        match self.cache.slot_mut(handle) {
            Ok(slot) => {
                if req.watch {
                    slot.request_watch();
                }
                slot.push_waiter(callback);
            }
            Err(err) => {
                callback(Err(err));
                return;
            }
        }
        if req.synchronous {
            self.update();
        }
    }

    fn next_ticket(&mut self) -> LoadTicket {
        self.next_ticket += 1;
        LoadTicket(self.next_ticket)
    }

    fn start_load(&mut self, handle: AssetHandle, identity: AssetIdentity, synchronous: bool) {
        let import_params = self
            .cache
            .slot(handle)
            .ok()
            .and_then(|slot| slot.import_params().cloned());
        if let Err(err) = self.cache.set_state(handle, SlotState::Loading) {
            self.fail_load(handle, None, err);
            return;
        }
        let ticket = self.next_ticket();
        tracing::debug!(asset = %identity, ticket = ticket.0, synchronous, "loading asset");

        let Self {
            handlers,
            vfs,
            backend,
            events_tx,
            ..
        } = &mut *self;
        let (outcome, dependencies) = match handlers.get_mut(identity.asset_type()) {
            Some(handler) if handler.capabilities().request => {
                let load = LoadRequest::new(
                    &identity,
                    import_params.as_ref(),
                    synchronous,
                    ticket,
                    events_tx,
                );
                let mut ctx = HandlerContext::new(&mut **vfs, &mut **backend);
                let outcome = handler.request(&mut ctx, &load);
                (outcome, ctx.into_dependencies())
            }
            Some(handler) => {
                // No request step: read and decode inline
                let request = VfsRequest::new(identity.clone(), handler.is_binary());
                let outcome = vfs
                    .request_asset_sync(&request)
                    .and_then(|source| {
                        handler.deserialize(&identity, &source, import_params.as_ref())
                    })
                    .map(RequestOutcome::Ready);
                (outcome, Vec::new())
            }
            None => (Err(AssetError::NoHandler(identity.asset_type())), Vec::new()),
        };

        self.apply_outcome(
            ticket,
            handle,
            identity.clone(),
            synchronous,
            outcome,
            dependencies,
        );

        if synchronous {
            // Synchronous dependencies have answered by now; apply them
            self.pump_dependencies();
            if self.pending.contains_key(&ticket) {
                self.fail_load(
                    handle,
                    Some(ticket),
                    AssetError::InternalFailure(format!(
                        "handler deferred synchronous load of {identity}"
                    )),
                );
            }
        }
    }

    fn apply_outcome(
        &mut self,
        ticket: LoadTicket,
        handle: AssetHandle,
        identity: AssetIdentity,
        synchronous: bool,
        outcome: Result<RequestOutcome>,
        dependencies: Vec<DependencyRequest>,
    ) {
        match outcome {
            Ok(RequestOutcome::Ready(data)) => {
                if !dependencies.is_empty() {
                    tracing::warn!(
                        asset = %identity,
                        count = dependencies.len(),
                        "dependency requests from a finished load ignored"
                    );
                }
                self.pending.remove(&ticket);
                self.finish_load(handle, &identity, data);
            }
            Ok(RequestOutcome::Pending) => {
                self.pending.entry(ticket).or_insert(PendingLoad {
                    handle,
                    identity: identity.clone(),
                    synchronous,
                });
                for dependency in dependencies {
                    self.request_dependency(ticket, &identity, synchronous, dependency);
                }
            }
            Err(err) => self.fail_load(handle, Some(ticket), err),
        }
    }

    /// Request an asset on behalf of the load `ticket`.
    ///
    /// The answer is queued and routed back to the owning handler; the
    /// reference it carries is held until the owner is torn down.
    fn request_dependency(
        &mut self,
        ticket: LoadTicket,
        owner: &AssetIdentity,
        synchronous: bool,
        dependency: DependencyRequest,
    ) {
        let DependencyRequest { request, tag } = dependency;
        let request = if synchronous {
            request.synchronous(true)
        } else {
            request
        };

        if request
            .identity(&self.default_package)
            .is_ok_and(|identity| &identity == owner)
        {
            let event = DependencyEvent {
                ticket,
                tag,
                result: Err(AssetError::InternalFailure(format!(
                    "{owner} depends on itself"
                ))),
            };
            if self.deps_tx.send(event).is_err() {
                tracing::error!(asset = %owner, "dependency queue closed");
            }
            return;
        }

        tracing::debug!(asset = %owner, dependency = %request.name, tag, "requesting dependency");
        let deps_tx = self.deps_tx.clone();
        self.request(request, move |result| {
            let event = DependencyEvent {
                ticket,
                tag,
                result: result.map(|asset| asset.handle()),
            };
            if deps_tx.send(event).is_err() {
                tracing::debug!("dependency receiver dropped");
            }
        });
    }

    /// Route queued dependency answers to their handlers
    fn pump_dependencies(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.deps_rx.try_recv() {
            processed += 1;
            self.on_dependency_loaded(event);
        }
        processed
    }

    fn on_dependency_loaded(&mut self, event: DependencyEvent) {
        let DependencyEvent {
            ticket,
            tag,
            result,
        } = event;
        let Some(pending) = self.pending.get(&ticket) else {
            // Owner failed or finished first; hand the reference back
            if let Ok(dependency) = result {
                tracing::debug!(ticket = ticket.0, ?dependency, "dependency outlived its load");
                self.release_handle(dependency);
            }
            return;
        };
        let handle = pending.handle;
        let identity = pending.identity.clone();
        let synchronous = pending.synchronous;

        let dependency = match result {
            Ok(dependency) => dependency,
            Err(err) => {
                self.fail_load(handle, Some(ticket), err);
                return;
            }
        };
        match self.cache.slot_mut(handle) {
            Ok(slot) => slot.add_dependency(dependency),
            Err(err) => {
                tracing::error!(asset = %identity, error = %err, "dependent load lost its slot");
                self.pending.remove(&ticket);
                if let Some(handler) = self.handlers.get_mut(identity.asset_type()) {
                    handler.abandon(ticket);
                }
                self.release_handle(dependency);
                return;
            }
        }
        let import_params = self
            .cache
            .slot(handle)
            .ok()
            .and_then(|slot| slot.import_params().cloned());

        let Self {
            cache,
            handlers,
            vfs,
            backend,
            events_tx,
            ..
        } = &mut *self;
        let (outcome, dependencies) = match handlers.get_mut(identity.asset_type()) {
            Some(handler) => {
                let load = LoadRequest::new(
                    &identity,
                    import_params.as_ref(),
                    synchronous,
                    ticket,
                    events_tx,
                );
                let mut ctx = HandlerContext::new(&mut **vfs, &mut **backend);
                let outcome = cache
                    .asset_ref(dependency)
                    .and_then(|asset| handler.on_dependency_loaded(&mut ctx, &load, asset, tag));
                (outcome, ctx.into_dependencies())
            }
            None => (Err(AssetError::NoHandler(identity.asset_type())), Vec::new()),
        };

        self.apply_outcome(ticket, handle, identity, synchronous, outcome, dependencies);
    }

    /// Hand back the references a torn down or failed asset held
    fn release_dependencies(&mut self, dependencies: impl IntoIterator<Item = AssetHandle>) {
        // Shutdown force-releases every slot itself
        if self.shut_down {
            return;
        }
        for dependency in dependencies {
            self.release_handle(dependency);
        }
    }

    fn finish_load(&mut self, handle: AssetHandle, identity: &AssetIdentity, mut data: AssetData) {
        let finalized = match self.handlers.get_mut(identity.asset_type()) {
            Some(handler) => {
                let mut ctx = HandlerContext::new(&mut *self.vfs, &mut *self.backend);
                handler.finalize(&mut ctx, &mut data)
            }
            None => Err(AssetError::NoHandler(identity.asset_type())),
        };
        if let Err(err) = finalized {
            self.fail_load(handle, None, err);
            return;
        }

        let waiters = match self.cache.complete_load(handle, data) {
            Ok(waiters) => waiters,
            Err(err) => {
                tracing::error!(asset = %identity, error = %err, "loaded asset lost its slot");
                return;
            }
        };
        tracing::debug!(asset = %identity, waiters = waiters.len(), "asset loaded");

        // A watch that outlived an earlier teardown is reattached too
        let wants_watch = self.watches.id_of(identity).is_some()
            || self
                .cache
                .slot(handle)
                .is_ok_and(|slot| slot.watch_requested());
        if wants_watch {
            if let Err(err) = self.watch(identity) {
                tracing::warn!(asset = %identity, error = %err, "could not watch asset");
            }
        }

        self.deliver(handle, waiters);
    }

    /// Give every waiter its reference and call it
    fn deliver(&mut self, handle: AssetHandle, waiters: Waiters) {
        for callback in waiters {
            let result = self
                .cache
                .acquire(handle)
                .and_then(|_| self.cache.asset_ref(handle));
            callback(result);
        }
    }

    fn fail_load(&mut self, handle: AssetHandle, ticket: Option<LoadTicket>, err: AssetError) {
        if let Some(ticket) = ticket {
            self.pending.remove(&ticket);
            if let Some(handler) = self.handlers.get_mut(handle.asset_type()) {
                handler.abandon(ticket);
            }
        }

        let (waiters, dependencies) = match self.cache.fail_load(handle) {
            Ok(failed) => failed,
            Err(stale) => {
                tracing::error!(error = %stale, "failed load lost its slot");
                return;
            }
        };
        tracing::warn!(asset_type = %handle.asset_type(), error = %err, "asset load failed");
        self.release_dependencies(dependencies);
        for callback in waiters {
            callback(Err(err.clone()));
        }
    }

    /// Apply queued VFS completions, file notifications and dependency
    /// answers until both queues are empty.
    ///
    /// Returns the number of events processed.
    pub fn update(&mut self) -> usize {
        #[cfg(feature = "profiling")]
        let span = tracing::info_span!("asset_update", pending = self.pending.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let mut processed = 0;
        loop {
            let mut step = 0;
            while let Ok(event) = self.events_rx.try_recv() {
                step += 1;
                match event {
                    VfsEvent::Loaded {
                        ticket,
                        tag,
                        result,
                    } => self.on_source_loaded(ticket, tag, result),
                    VfsEvent::FileWritten(watch_id) => self.on_file_written(watch_id),
                    VfsEvent::FileDeleted(watch_id) => self.on_file_deleted(watch_id),
                }
            }
            step += self.pump_dependencies();
            if step == 0 {
                return processed;
            }
            processed += step;
        }
    }

    fn on_source_loaded(&mut self, ticket: LoadTicket, tag: u32, result: Result<AssetSource>) {
        let Some(pending) = self.pending.get(&ticket) else {
            tracing::warn!(ticket = ticket.0, "vfs result for unknown load");
            return;
        };
        let handle = pending.handle;
        let identity = pending.identity.clone();
        let synchronous = pending.synchronous;

        let source = match result {
            Ok(source) => source,
            Err(err) => {
                self.fail_load(handle, Some(ticket), err);
                return;
            }
        };
        let import_params: Option<ImportParams> = self
            .cache
            .slot(handle)
            .ok()
            .and_then(|slot| slot.import_params().cloned());

        let Self {
            handlers,
            vfs,
            backend,
            events_tx,
            ..
        } = &mut *self;
        let (outcome, dependencies) = match handlers.get_mut(identity.asset_type()) {
            Some(handler) => {
                let load = LoadRequest::new(
                    &identity,
                    import_params.as_ref(),
                    synchronous,
                    ticket,
                    events_tx,
                );
                let mut ctx = HandlerContext::new(&mut **vfs, &mut **backend);
                let outcome = handler.on_source_loaded(&mut ctx, &load, source, tag);
                (outcome, ctx.into_dependencies())
            }
            None => (Err(AssetError::NoHandler(identity.asset_type())), Vec::new()),
        };

        self.apply_outcome(ticket, handle, identity, synchronous, outcome, dependencies);
    }

    fn on_file_written(&mut self, watch_id: WatchId) {
        #[cfg(feature = "profiling")]
        let span = tracing::info_span!("asset_hot_reload");
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let Some(identity) = self.watches.resolve(watch_id).cloned() else {
            tracing::warn!(?watch_id, "file event for unknown watch");
            return;
        };
        let attached = self
            .cache
            .find(&identity)
            .and_then(|handle| self.cache.slot(handle).ok())
            .filter(|slot| slot.state() == SlotState::Loaded)
            .and_then(|slot| slot.watch_id());
        if attached != Some(watch_id) {
            tracing::warn!(asset = %identity, "watched file changed but asset is not resident");
            return;
        }
        if let Err(err) = self.reload(&identity) {
            tracing::warn!(asset = %identity, error = %err, "hot reload skipped");
        }
    }

    fn on_file_deleted(&mut self, watch_id: WatchId) {
        let Some(entry) = self.watches.remove_id(watch_id) else {
            tracing::warn!(?watch_id, "delete event for unknown watch");
            return;
        };
        tracing::debug!(asset = %entry.identity, "watched file deleted");
        self.vfs.unwatch_file(watch_id);
        self.clear_slot_watch(&entry.identity);
    }

    /// Re-read `identity` and apply it onto the live payload in place.
    ///
    /// Handles and references stay valid; the generation does not change.
    pub fn reload(&mut self, identity: &AssetIdentity) -> Result<()> {
        let handle = self
            .cache
            .find(identity)
            .ok_or_else(|| AssetError::NotFound(identity.to_string()))?;
        let slot = self.cache.slot(handle)?;
        if slot.state() != SlotState::Loaded {
            return Err(AssetError::NotLoaded(identity.to_string()));
        }
        let import_params = slot.import_params().cloned();

        let Self {
            cache,
            handlers,
            vfs,
            backend,
            ..
        } = &mut *self;
        let handler = handlers
            .get_mut(identity.asset_type())
            .ok_or(AssetError::NoHandler(identity.asset_type()))?;
        let capabilities = handler.capabilities();
        if !capabilities.hot_reload || !capabilities.deserialize {
            return Err(handler.unsupported("hot reload"));
        }

        let request = VfsRequest::new(identity.clone(), handler.is_binary());
        let source = vfs.request_asset_sync(&request)?;
        let fresh = handler.deserialize(identity, &source, import_params.as_ref())?;

        let live = cache
            .slot_mut(handle)?
            .data_mut()
            .ok_or_else(|| AssetError::NotLoaded(identity.to_string()))?;
        let mut ctx = HandlerContext::new(&mut **vfs, &mut **backend);
        handler.on_hot_reload(&mut ctx, live, fresh)?;

        cache.stats_mut().hot_reloads += 1;
        tracing::debug!(asset = %identity, "asset hot reloaded");
        Ok(())
    }

    /// Drop one reference to `identity`
    pub fn release(&mut self, identity: &AssetIdentity) {
        match self.cache.find(identity) {
            Some(handle) => self.release_handle(handle),
            None => tracing::warn!(asset = %identity, "release of unknown asset"),
        }
    }

    /// Drop one reference through a handle; stale handles are ignored
    pub fn release_handle(&mut self, handle: AssetHandle) {
        match self.cache.release(handle) {
            Ok(ReleaseOutcome::Retained { remaining }) => {
                tracing::debug!(?handle, remaining, "asset reference released");
            }
            Ok(ReleaseOutcome::AlreadyZero) => {
                tracing::warn!(?handle, "release would drop reference count below zero");
            }
            Ok(ReleaseOutcome::Teardown(teardown)) => self.finish_teardown(teardown),
            Err(err) => tracing::warn!(?handle, error = %err, "release of stale handle"),
        }
    }

    /// Release the single resident asset called `package.name`, whatever its type
    pub fn release_named(&mut self, package: &str, name: &str) {
        match self.cache.find_named(package, name).as_slice() {
            [handle] => self.release_handle(*handle),
            [] => tracing::warn!(package, name, "release of unknown asset"),
            matches => tracing::warn!(
                package,
                name,
                count = matches.len(),
                "ambiguous release; use the typed identity"
            ),
        }
    }

    fn finish_teardown(&mut self, teardown: Teardown) {
        let Teardown {
            identity,
            data,
            dependencies,
        } = teardown;
        if let Some(mut data) = data {
            match self.handlers.get_mut(identity.asset_type()) {
                Some(handler) => {
                    let mut ctx = HandlerContext::new(&mut *self.vfs, &mut *self.backend);
                    handler.release(&mut ctx, &mut data);
                }
                None => tracing::warn!(asset = %identity, "no handler to release asset payload"),
            }
        }
        tracing::debug!(asset = %identity, "asset torn down");
        self.release_dependencies(dependencies);
    }

    /// Register a hot-reload watch for `identity`; an existing watch is reused
    pub fn watch(&mut self, identity: &AssetIdentity) -> Result<WatchId> {
        let watch_id = match self.watches.id_of(identity) {
            Some(existing) => existing,
            None => {
                let watch_id = self.vfs.watch_file(identity, self.events_tx.clone())?;
                self.watches.insert(watch_id, identity.clone());
                tracing::debug!(asset = %identity, ?watch_id, "watching asset");
                watch_id
            }
        };
        if let Some(handle) = self.cache.find(identity) {
            if let Ok(slot) = self.cache.slot_mut(handle) {
                slot.set_watch_id(Some(watch_id));
            }
        }
        Ok(watch_id)
    }

    /// Cancel the watch on `identity`; false if there was none
    pub fn unwatch(&mut self, identity: &AssetIdentity) -> bool {
        match self.watches.remove_identity(identity) {
            Some(entry) => {
                self.vfs.unwatch_file(entry.watch_id);
                self.clear_slot_watch(identity);
                true
            }
            None => false,
        }
    }

    pub fn unwatch_id(&mut self, watch_id: WatchId) -> bool {
        match self.watches.remove_id(watch_id) {
            Some(entry) => {
                self.vfs.unwatch_file(watch_id);
                self.clear_slot_watch(&entry.identity);
                true
            }
            None => false,
        }
    }

    fn clear_slot_watch(&mut self, identity: &AssetIdentity) {
        if let Some(handle) = self.cache.find(identity) {
            if let Ok(slot) = self.cache.slot_mut(handle) {
                slot.set_watch_id(None);
            }
        }
    }

    pub fn watch_of(&self, identity: &AssetIdentity) -> Option<WatchId> {
        self.watches.id_of(identity)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Encode a loaded asset with its handler
    pub fn serialize(&self, handle: AssetHandle) -> Result<AssetSource> {
        let data = self.get(handle)?;
        let handler = self
            .handlers
            .get(handle.asset_type())
            .ok_or(AssetError::NoHandler(handle.asset_type()))?;
        if !handler.capabilities().serialize {
            return Err(handler.unsupported("serialize"));
        }
        handler.serialize(data)
    }

    /// Build an asset from in-memory source instead of the VFS.
    ///
    /// The identity must not be resident yet. One reference is taken.
    pub fn create_from_source(
        &mut self,
        req: AssetRequest,
        source: AssetSource,
    ) -> Result<AssetHandle> {
        if self.shut_down {
            return Err(AssetError::InternalFailure(
                "asset server is shut down".to_string(),
            ));
        }
        let identity = req.identity(&self.default_package)?;
        if self.cache.find(&identity).is_some() {
            return Err(AssetError::InternalFailure(format!(
                "{identity} is already resident"
            )));
        }

        let handler = self
            .handlers
            .get(identity.asset_type())
            .ok_or(AssetError::NoHandler(identity.asset_type()))?;
        if !handler.capabilities().deserialize {
            return Err(handler.unsupported("deserialize"));
        }
        let data = handler.deserialize(&identity, &source, req.import_params.as_ref())?;

        let handle = self
            .cache
            .reserve_slot(identity.clone(), req.auto_release, req.import_params)?;
        let mut data = data;
        let finalized = match self.handlers.get_mut(identity.asset_type()) {
            Some(handler) => {
                let mut ctx = HandlerContext::new(&mut *self.vfs, &mut *self.backend);
                handler.finalize(&mut ctx, &mut data)
            }
            None => Err(AssetError::NoHandler(identity.asset_type())),
        };
        if let Err(err) = finalized {
            self.cache.fail_load(handle)?;
            return Err(err);
        }

        self.cache.complete_load(handle, data)?;
        self.cache.acquire(handle)?;
        if req.watch {
            if let Err(err) = self.watch(&identity) {
                tracing::warn!(asset = %identity, error = %err, "could not watch asset");
            }
        }
        tracing::debug!(asset = %identity, "asset created from source");
        Ok(handle)
    }

    /// Payload behind `handle`
    pub fn get(&self, handle: AssetHandle) -> Result<&AssetData> {
        let slot = self.cache.slot(handle)?;
        match slot.data() {
            Some(data) if slot.state() == SlotState::Loaded => Ok(data),
            _ => Err(AssetError::NotLoaded(
                slot.identity().map(|i| i.to_string()).unwrap_or_default(),
            )),
        }
    }

    /// Borrowed view of a loaded asset by identity
    pub fn asset(&self, identity: &AssetIdentity) -> Option<AssetRef<'_>> {
        self.cache
            .find(identity)
            .and_then(|handle| self.cache.asset_ref(handle).ok())
    }

    pub fn handle_of(&self, identity: &AssetIdentity) -> Option<AssetHandle> {
        self.cache.find(identity)
    }

    pub fn reference_count(&self, identity: &AssetIdentity) -> Option<i32> {
        self.cache
            .find(identity)
            .and_then(|handle| self.cache.slot(handle).ok())
            .map(|slot| slot.reference_count())
    }

    /// `Empty` for identities with no slot
    pub fn state_of(&self, identity: &AssetIdentity) -> SlotState {
        self.cache
            .find(identity)
            .and_then(|handle| self.cache.slot(handle).ok())
            .map_or(SlotState::Empty, |slot| slot.state())
    }

    pub fn is_resident(&self, identity: &AssetIdentity) -> bool {
        self.state_of(identity) == SlotState::Loaded
    }

    pub fn stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Slots currently occupied, loading or loaded
    pub fn resident_count(&self) -> usize {
        self.cache.len()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Loads waiting on the VFS
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fail in-flight loads, release every asset and drop every watch.
    ///
    /// Later requests fail with `InternalFailure`. Runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let pending: Vec<_> = self.pending.drain().collect();
        for (ticket, load) in pending {
            self.fail_load(
                load.handle,
                Some(ticket),
                AssetError::InternalFailure(format!(
                    "asset server shut down while loading {}",
                    load.identity
                )),
            );
        }

        let handles = self.cache.handles();
        let released = handles.len();
        for handle in handles {
            match self.cache.force_release(handle) {
                Ok(teardown) => self.finish_teardown(teardown),
                Err(err) => tracing::error!(?handle, error = %err, "shutdown release failed"),
            }
        }

        for entry in self.watches.drain() {
            self.vfs.unwatch_file(entry.watch_id);
        }
        while self.events_rx.try_recv().is_ok() {}
        while self.deps_rx.try_recv().is_ok() {}
        tracing::debug!(released, "asset server shut down");
    }
}

impl Drop for AssetServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
