//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use typed_asset_cache::prelude::*;
//! ```

pub use crate::backend::{GpuHandle, HeadlessBackend, RenderBackend};
pub use crate::cache::{AssetRef, CacheStats, SlotState};
pub use crate::config::AssetServerConfig;
pub use crate::data::{AssetData, AssetSource};
pub use crate::error::{AssetError, Result, ResultCode};
pub use crate::handle::AssetHandle;
pub use crate::handler::{
    AssetHandler, HandlerCapabilities, HandlerContext, HandlerRegistry, LoadRequest,
    RequestOutcome,
};
pub use crate::handlers::register_builtin_handlers;
pub use crate::identity::{AssetIdentity, AssetType, Name};
pub use crate::request::{AssetRequest, ImportParams};
pub use crate::server::AssetServer;
pub use crate::vfs::{MemoryVfs, Vfs, VfsEvent, VfsReply, VfsRequest, WatchId};
