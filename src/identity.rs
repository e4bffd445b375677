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

//! Asset identity: `(package, name, type)` triples and their parts

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};

/// Canonical, cheaply cloneable name.
///
/// Surrounding whitespace is stripped; case is preserved and significant.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    /// Canonicalize `raw`, returning `None` if nothing is left
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", &*self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Every kind of asset the cache knows how to hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Binary,
    Text,
    Image,
    StaticMesh,
    Material,
    Shader,
    Scene,
    Audio,
    Music,
    BitmapFont,
    SystemFont,
    HeightmapTerrain,
}

impl AssetType {
    pub const COUNT: usize = 12;

    pub const ALL: [AssetType; AssetType::COUNT] = [
        AssetType::Binary,
        AssetType::Text,
        AssetType::Image,
        AssetType::StaticMesh,
        AssetType::Material,
        AssetType::Shader,
        AssetType::Scene,
        AssetType::Audio,
        AssetType::Music,
        AssetType::BitmapFont,
        AssetType::SystemFont,
        AssetType::HeightmapTerrain,
    ];

    /// Position in fixed per-type tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the VFS should hand this type over as bytes rather than text
    pub fn is_binary(self) -> bool {
        match self {
            AssetType::Binary
            | AssetType::Image
            | AssetType::StaticMesh
            | AssetType::Audio
            | AssetType::Music => true,
            AssetType::Text
            | AssetType::Material
            | AssetType::Shader
            | AssetType::Scene
            | AssetType::BitmapFont
            | AssetType::SystemFont
            | AssetType::HeightmapTerrain => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetType::Binary => "binary",
            AssetType::Text => "text",
            AssetType::Image => "image",
            AssetType::StaticMesh => "static_mesh",
            AssetType::Material => "material",
            AssetType::Shader => "shader",
            AssetType::Scene => "scene",
            AssetType::Audio => "audio",
            AssetType::Music => "music",
            AssetType::BitmapFont => "bitmap_font",
            AssetType::SystemFont => "system_font",
            AssetType::HeightmapTerrain => "heightmap_terrain",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetType {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        AssetType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AssetError::InvalidAssetType(s.to_string()))
    }
}

/// The `(package, name, type)` triple naming one asset
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AssetIdentity {
    package: Name,
    name: Name,
    asset_type: AssetType,
}

impl AssetIdentity {
    pub fn new(package: &str, name: &str, asset_type: AssetType) -> Result<Self> {
        let package =
            Name::new(package).ok_or_else(|| AssetError::InvalidPackage(package.to_string()))?;
        let name = Name::new(name).ok_or_else(|| AssetError::InvalidName(name.to_string()))?;
        Ok(Self::from_names(package, name, asset_type))
    }

    pub fn from_names(package: Name, name: Name, asset_type: AssetType) -> Self {
        Self {
            package,
            name,
            asset_type,
        }
    }

    /// Parse `"package.name"`; a bare `"name"` lands in `default_package`
    pub fn parse_qualified(
        qualified: &str,
        asset_type: AssetType,
        default_package: &str,
    ) -> Result<Self> {
        match qualified.trim().split_once('.') {
            Some((package, name)) => Self::new(package, name, asset_type),
            None => Self::new(default_package, qualified, asset_type),
        }
    }

    pub fn package(&self) -> &Name {
        &self.package
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Same package and name, different type
    pub fn with_type(&self, asset_type: AssetType) -> Self {
        Self {
            package: self.package.clone(),
            name: self.name.clone(),
            asset_type,
        }
    }
}

impl fmt::Display for AssetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} [{}]", self.package, self.name, self.asset_type)
    }
}
