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

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities};
use crate::handlers::{parse_json, write_json};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Local transform of a scene node
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Asset referenced by a node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Attachment {
    StaticMesh(String),
    Material(String),
    Audio(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    fn visit<'a>(&'a self, parent: Mat4, f: &mut dyn FnMut(&'a SceneNode, Mat4)) {
        let world = parent * self.transform.to_matrix();
        f(self, world);
        for child in &self.children {
            child.visit(world, f);
        }
    }
}

/// Node hierarchy with per-node attachments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneAsset {
    pub root: SceneNode,
}

impl SceneAsset {
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(Mat4::IDENTITY, &mut |_, _| count += 1);
        count
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        let mut found = None;
        self.root.visit(Mat4::IDENTITY, &mut |node, _| {
            if found.is_none() && node.name == name {
                found = Some(node);
            }
        });
        found
    }

    /// World matrix of the first node called `name`
    pub fn world_transform(&self, name: &str) -> Option<Mat4> {
        let mut found = None;
        self.root.visit(Mat4::IDENTITY, &mut |node, world| {
            if found.is_none() && node.name == name {
                found = Some(world);
            }
        });
        found
    }

    /// Every asset name attached anywhere in the tree
    pub fn attachments(&self) -> Vec<&Attachment> {
        let mut out = Vec::new();
        self.root
            .visit(Mat4::IDENTITY, &mut |node, _| out.extend(node.attachments.iter()));
        out
    }
}

pub struct SceneHandler;

impl AssetHandler for SceneHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Scene
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::ASYNC
    }

    fn deserialize(
        &self,
        identity: &AssetIdentity,
        source: &AssetSource,
        _params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        let scene: SceneAsset = parse_json(source)?;
        if scene.root.name.trim().is_empty() {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: root node has no name"
            )));
        }
        Ok(AssetData::Scene(scene))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        write_json(
            data.as_scene()
                .ok_or_else(|| wrong_payload(AssetType::Scene, data))?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: &str = r#"{
        "root": {
            "name": "level",
            "children": [
                {
                    "name": "house",
                    "transform": { "translation": [10.0, 0.0, 0.0] },
                    "attachments": [{ "kind": "static_mesh", "name": "house_mesh" }],
                    "children": [
                        {
                            "name": "door",
                            "transform": { "translation": [0.0, 1.0, 0.0] },
                            "attachments": [{ "kind": "material", "name": "oak" }]
                        }
                    ]
                }
            ]
        }
    }"#;

    fn load() -> SceneAsset {
        let id = AssetIdentity::new("game", "level1", AssetType::Scene).unwrap();
        match SceneHandler
            .deserialize(&id, &AssetSource::Text(LEVEL.into()), None)
            .unwrap()
        {
            AssetData::Scene(scene) => scene,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_scene_tree() {
        let scene = load();
        assert_eq!(scene.node_count(), 3);
        assert_eq!(scene.find("door").unwrap().attachments.len(), 1);
        assert_eq!(scene.find("house").unwrap().transform.scale, Vec3::ONE);
        assert_eq!(scene.attachments().len(), 2);
    }

    #[test]
    fn test_world_transform_composes_parents() {
        let scene = load();
        let door = scene.world_transform("door").unwrap();
        assert_eq!(door.transform_point3(Vec3::ZERO), Vec3::new(10.0, 1.0, 0.0));
    }

    #[test]
    fn test_scene_has_no_hot_reload() {
        assert!(!SceneHandler.capabilities().hot_reload);
    }
}
