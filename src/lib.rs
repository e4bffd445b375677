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

//! Typed asset cache
//!
//! Turns `(package, name, type)` identities into live, reference-counted
//! assets through per-type handlers, with synchronous and asynchronous loads,
//! a fixed-capacity generation-checked slot table and hot reload.

pub mod backend;
pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod handle;
pub mod handler;
pub mod handlers;
pub mod identity;
pub mod prelude;
pub mod request;
pub mod server;
pub mod vfs;
pub mod watch;

#[cfg(feature = "profiling")]
pub mod profiling;

pub use backend::*;
pub use cache::*;
pub use config::*;
pub use data::*;
pub use error::*;
pub use handle::*;
pub use handler::*;
pub use identity::*;
pub use request::*;
pub use server::*;
pub use vfs::*;
pub use watch::*;
