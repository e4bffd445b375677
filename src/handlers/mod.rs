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

//! Built-in handlers, one per asset kind
//!
//! Text-transport kinds use JSON documents, binary-transport kinds use
//! `speedy` little-endian encodings.

pub mod audio;
pub mod binary;
pub mod font;
pub mod image;
pub mod material;
pub mod scene;
pub mod shader;
pub mod static_mesh;
pub mod terrain;
pub mod text;

use serde::de::DeserializeOwned;
use serde::Serialize;
use speedy::{LittleEndian, Readable, Writable};

use crate::data::AssetSource;
use crate::error::Result;
use crate::handler::HandlerRegistry;

pub use audio::AudioHandler;
pub use binary::BinaryHandler;
pub use font::{BitmapFontHandler, SystemFontHandler};
pub use image::ImageHandler;
pub use material::MaterialHandler;
pub use scene::SceneHandler;
pub use shader::ShaderHandler;
pub use static_mesh::StaticMeshHandler;
pub use terrain::HeightmapTerrainHandler;
pub use text::TextHandler;

/// Install a handler for every asset type
pub fn register_builtin_handlers(registry: &mut HandlerRegistry) {
    registry.register(Box::new(BinaryHandler));
    registry.register(Box::new(TextHandler));
    registry.register(Box::new(ImageHandler));
    registry.register(Box::new(StaticMeshHandler));
    registry.register(Box::new(MaterialHandler));
    registry.register(Box::new(ShaderHandler));
    registry.register(Box::new(SceneHandler));
    registry.register(Box::new(AudioHandler::sound()));
    registry.register(Box::new(AudioHandler::music()));
    registry.register(Box::new(BitmapFontHandler));
    registry.register(Box::new(SystemFontHandler::default()));
    registry.register(Box::new(HeightmapTerrainHandler));
}

pub(crate) fn parse_json<T: DeserializeOwned>(source: &AssetSource) -> Result<T> {
    Ok(serde_json::from_str(source.as_text()?)?)
}

pub(crate) fn write_json<T: Serialize>(value: &T) -> Result<AssetSource> {
    Ok(AssetSource::Text(serde_json::to_string_pretty(value)?))
}

pub(crate) fn read_speedy<T>(source: &AssetSource) -> Result<T>
where
    T: for<'a> Readable<'a, LittleEndian>,
{
    Ok(T::read_from_buffer(source.as_bytes())?)
}

pub(crate) fn write_speedy<T: Writable<LittleEndian>>(value: &T) -> Result<AssetSource> {
    Ok(AssetSource::Binary(value.write_to_vec()?))
}
