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

//! # Profiling
//!
//! With the `profiling` feature the server wraps `request`, `update` and hot
//! reload dispatch in `info_span!`s:
//!
//! ```toml
//! [dependencies]
//! typed_asset_cache = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! [`init_profiling`] installs a JSON subscriber writing to a file through a
//! non-blocking appender. Keep the returned guard alive until exit or the
//! tail of the trace is lost.
//!
//! ```ignore
//! let _guard = typed_asset_cache::profiling::init_profiling("trace.json")?;
//! ```
//!
//! Without the feature only the regular `warn!`/`debug!` events are emitted
//! and collecting them is up to the application's own subscriber.

use std::fs::File;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

use crate::error::{AssetError, Result};

/// Send every span and event to `path` as JSON lines
pub fn init_profiling(path: impl AsRef<Path>) -> Result<WorkerGuard> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        AssetError::Config(format!("cannot create trace file {}: {e}", path.display()))
    })?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .try_init()
        .map_err(|e| AssetError::Config(format!("tracing subscriber already set: {e}")))?;

    Ok(guard)
}
