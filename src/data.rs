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

//! Asset payloads and the raw sources they are built from

use crate::error::{AssetError, Result};
use crate::handlers::audio::AudioAsset;
use crate::handlers::binary::BinaryAsset;
use crate::handlers::font::{BitmapFontAsset, FontFace, SystemFontAsset};
use crate::handlers::image::ImageAsset;
use crate::handlers::material::MaterialAsset;
use crate::handlers::scene::SceneAsset;
use crate::handlers::shader::ShaderAsset;
use crate::handlers::static_mesh::StaticMeshAsset;
use crate::handlers::terrain::HeightmapTerrainAsset;
use crate::handlers::text::TextAsset;
use crate::identity::AssetType;

/// Raw asset content as delivered by the VFS
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssetSource {
    Binary(Vec<u8>),
    Text(String),
}

impl AssetSource {
    pub fn is_binary(&self) -> bool {
        matches!(self, AssetSource::Binary(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AssetSource::Binary(bytes) => bytes,
            AssetSource::Text(text) => text.as_bytes(),
        }
    }

    /// Borrow as UTF-8 text, decoding binary content if needed
    pub fn as_text(&self) -> Result<&str> {
        match self {
            AssetSource::Text(text) => Ok(text),
            AssetSource::Binary(bytes) => std::str::from_utf8(bytes)
                .map_err(|e| AssetError::ParseFailed(format!("UTF-8 decode error: {e}"))),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            AssetSource::Binary(bytes) => bytes,
            AssetSource::Text(text) => text.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Type-tagged payload stored in a cache slot
#[derive(Clone, Debug)]
pub enum AssetData {
    Binary(BinaryAsset),
    Text(TextAsset),
    Image(ImageAsset),
    StaticMesh(StaticMeshAsset),
    Material(MaterialAsset),
    Shader(ShaderAsset),
    Scene(SceneAsset),
    Audio(AudioAsset),
    Music(AudioAsset),
    BitmapFont(BitmapFontAsset),
    SystemFont(SystemFontAsset),
    HeightmapTerrain(HeightmapTerrainAsset),
}

/// Generates `as_*` / `as_*_mut` accessors for payload variants
macro_rules! payload_accessors {
    ($($variant:ident => $ty:ty, $get:ident, $get_mut:ident;)*) => {
        impl AssetData {
            $(
                pub fn $get(&self) -> Option<&$ty> {
                    match self {
                        AssetData::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                pub fn $get_mut(&mut self) -> Option<&mut $ty> {
                    match self {
                        AssetData::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            )*
        }
    };
}

payload_accessors! {
    Binary => BinaryAsset, as_binary, as_binary_mut;
    Text => TextAsset, as_text, as_text_mut;
    Image => ImageAsset, as_image, as_image_mut;
    StaticMesh => StaticMeshAsset, as_static_mesh, as_static_mesh_mut;
    Material => MaterialAsset, as_material, as_material_mut;
    Shader => ShaderAsset, as_shader, as_shader_mut;
    Scene => SceneAsset, as_scene, as_scene_mut;
    BitmapFont => BitmapFontAsset, as_bitmap_font, as_bitmap_font_mut;
    SystemFont => SystemFontAsset, as_system_font, as_system_font_mut;
    HeightmapTerrain => HeightmapTerrainAsset, as_heightmap_terrain, as_heightmap_terrain_mut;
}

impl AssetData {
    pub fn asset_type(&self) -> AssetType {
        match self {
            AssetData::Binary(_) => AssetType::Binary,
            AssetData::Text(_) => AssetType::Text,
            AssetData::Image(_) => AssetType::Image,
            AssetData::StaticMesh(_) => AssetType::StaticMesh,
            AssetData::Material(_) => AssetType::Material,
            AssetData::Shader(_) => AssetType::Shader,
            AssetData::Scene(_) => AssetType::Scene,
            AssetData::Audio(_) => AssetType::Audio,
            AssetData::Music(_) => AssetType::Music,
            AssetData::BitmapFont(_) => AssetType::BitmapFont,
            AssetData::SystemFont(_) => AssetType::SystemFont,
            AssetData::HeightmapTerrain(_) => AssetType::HeightmapTerrain,
        }
    }

    /// Audio and music share a payload shape
    pub fn as_audio(&self) -> Option<&AudioAsset> {
        match self {
            AssetData::Audio(inner) | AssetData::Music(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_audio_mut(&mut self) -> Option<&mut AudioAsset> {
        match self {
            AssetData::Audio(inner) | AssetData::Music(inner) => Some(inner),
            _ => None,
        }
    }

    /// Approximate heap footprint in bytes
    pub fn memory_size(&self) -> usize {
        match self {
            AssetData::Binary(b) => b.bytes.len(),
            AssetData::Text(t) => t.content.len(),
            AssetData::Image(i) => i.pixels.len(),
            AssetData::StaticMesh(m) => m.memory_size(),
            AssetData::Audio(a) | AssetData::Music(a) => {
                a.samples.len() * std::mem::size_of::<i16>()
            }
            // Face bytes live in their own binary asset
            AssetData::SystemFont(f) => f.faces.len() * std::mem::size_of::<FontFace>(),
            AssetData::Material(_)
            | AssetData::Shader(_)
            | AssetData::Scene(_)
            | AssetData::BitmapFont(_)
            | AssetData::HeightmapTerrain(_) => std::mem::size_of_val(self),
        }
    }
}
