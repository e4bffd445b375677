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

use std::collections::BTreeMap;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext};
use crate::handlers::{parse_json, write_json};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

fn white() -> Vec4 {
    Vec4::ONE
}

fn one() -> f32 {
    1.0
}

/// Surface description referencing a shader and image assets by name
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialAsset {
    pub shader: String,
    #[serde(default = "white")]
    pub base_color: Vec4,
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "one")]
    pub roughness: f32,
    #[serde(default)]
    pub double_sided: bool,
    /// Sampler name → image asset name
    #[serde(default)]
    pub textures: BTreeMap<String, String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
}

impl MaterialAsset {
    fn validate(&self, identity: &AssetIdentity) -> Result<()> {
        if self.shader.trim().is_empty() {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: material has no shader"
            )));
        }
        for (field, value) in [("metallic", self.metallic), ("roughness", self.roughness)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AssetError::ParseFailed(format!(
                    "{identity}: {field} {value} outside 0..=1"
                )));
            }
        }
        Ok(())
    }

    pub fn texture(&self, sampler: &str) -> Option<&str> {
        self.textures.get(sampler).map(String::as_str)
    }
}

pub struct MaterialHandler;

impl AssetHandler for MaterialHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Material
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::ASYNC.with_hot_reload()
    }

    fn deserialize(
        &self,
        identity: &AssetIdentity,
        source: &AssetSource,
        _params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        let material: MaterialAsset = parse_json(source)?;
        material.validate(identity)?;
        Ok(AssetData::Material(material))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        write_json(
            data.as_material()
                .ok_or_else(|| wrong_payload(AssetType::Material, data))?,
        )
    }

    fn on_hot_reload(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        live: &mut AssetData,
        fresh: AssetData,
    ) -> Result<()> {
        match (live, fresh) {
            (AssetData::Material(live), AssetData::Material(fresh)) => {
                *live = fresh;
                Ok(())
            }
            (_, fresh) => Err(wrong_payload(AssetType::Material, &fresh)),
        }
    }
}
