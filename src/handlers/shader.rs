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

//! Shader program description: per-stage source plus the vertex attribute and
//! uniform interface the renderer binds against.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext};
use crate::handlers::{parse_json, write_json};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

fn main_entry() -> String {
    "main".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSource {
    pub stage: ShaderStage,
    #[serde(default = "main_entry")]
    pub entry_point: String,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Sampler2d,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uniform {
    pub name: String,
    pub kind: UniformKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderAsset {
    pub stages: Vec<StageSource>,
    #[serde(default)]
    pub attributes: Vec<VertexAttribute>,
    #[serde(default)]
    pub uniforms: Vec<Uniform>,
}

impl ShaderAsset {
    pub fn stage(&self, stage: ShaderStage) -> Option<&StageSource> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    fn validate(&self, identity: &AssetIdentity) -> Result<()> {
        let fail = |msg: String| Err(AssetError::ParseFailed(format!("{identity}: {msg}")));

        if self.stages.is_empty() {
            return fail("shader has no stages".to_string());
        }
        let mut stages = AHashSet::new();
        if let Some(dup) = self.stages.iter().find(|s| !stages.insert(s.stage)) {
            return fail(format!("stage {:?} defined twice", dup.stage));
        }
        let mut names = AHashSet::new();
        if let Some(dup) = self.uniforms.iter().find(|u| !names.insert(u.name.as_str())) {
            return fail(format!("uniform '{}' declared twice", dup.name));
        }
        let mut locations = AHashSet::new();
        if let Some(dup) = self.attributes.iter().find(|a| !locations.insert(a.location)) {
            return fail(format!("attribute location {} reused", dup.location));
        }
        Ok(())
    }
}

pub struct ShaderHandler;

impl AssetHandler for ShaderHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Shader
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
        let shader: ShaderAsset = parse_json(source)?;
        shader.validate(identity)?;
        Ok(AssetData::Shader(shader))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        write_json(
            data.as_shader()
                .ok_or_else(|| wrong_payload(AssetType::Shader, data))?,
        )
    }

    fn on_hot_reload(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        live: &mut AssetData,
        fresh: AssetData,
    ) -> Result<()> {
        match (live, fresh) {
            (AssetData::Shader(live), AssetData::Shader(fresh)) => {
                *live = fresh;
                Ok(())
            }
            (_, fresh) => Err(wrong_payload(AssetType::Shader, &fresh)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> AssetIdentity {
        AssetIdentity::new("game", "lit", AssetType::Shader).unwrap()
    }

    fn parse(json: &str) -> Result<AssetData> {
        ShaderHandler.deserialize(&id(), &AssetSource::Text(json.into()), None)
    }

    #[test]
    fn test_shader_stages_and_uniforms() {
        let data = parse(
            r#"{
                "stages": [
                    { "stage": "vertex", "source": "void main() {}" },
                    { "stage": "fragment", "entry_point": "fs_main", "source": "..." }
                ],
                "attributes": [{ "name": "position", "location": 0 }],
                "uniforms": [{ "name": "model", "kind": "mat4" }]
            }"#,
        )
        .unwrap();
        let shader = data.as_shader().unwrap();
        assert_eq!(shader.stage(ShaderStage::Vertex).unwrap().entry_point, "main");
        assert_eq!(
            shader.stage(ShaderStage::Fragment).unwrap().entry_point,
            "fs_main"
        );
        assert!(shader.stage(ShaderStage::Compute).is_none());
        assert_eq!(shader.uniform("model").unwrap().kind, UniformKind::Mat4);
    }

    #[test]
    fn test_shader_validation() {
        assert!(parse(r#"{ "stages": [] }"#).is_err());
        assert!(parse(
            r#"{ "stages": [{ "stage": "compute", "source": "" }],
                 "uniforms": [{ "name": "t", "kind": "float" }, { "name": "t", "kind": "int" }] }"#
        )
        .is_err());
    }
}
