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

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities};
use crate::handlers::{parse_json, write_json};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Regular height grid, `width` samples along x by `depth` along z
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightmapTerrainAsset {
    pub width: u32,
    pub depth: u32,
    pub cell_spacing: f32,
    pub height_scale: f32,
    pub heights: Vec<f32>,
    #[serde(default)]
    pub material: Option<String>,
}

impl HeightmapTerrainAsset {
    /// World-space footprint along x and z
    pub fn world_size(&self) -> Vec2 {
        Vec2::new(
            (self.width - 1) as f32 * self.cell_spacing,
            (self.depth - 1) as f32 * self.cell_spacing,
        )
    }

    /// Scaled height at grid sample `(x, z)`
    pub fn sample(&self, x: u32, z: u32) -> Option<f32> {
        if x >= self.width || z >= self.depth {
            return None;
        }
        self.heights
            .get((z * self.width + x) as usize)
            .map(|h| h * self.height_scale)
    }

    /// Bilinear height at a world position, clamped to the grid
    pub fn height_at(&self, position: Vec2) -> f32 {
        let grid = (position / self.cell_spacing)
            .clamp(Vec2::ZERO, Vec2::new((self.width - 1) as f32, (self.depth - 1) as f32));
        let x0 = grid.x.floor() as u32;
        let z0 = grid.y.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let z1 = (z0 + 1).min(self.depth - 1);
        let t = grid - Vec2::new(x0 as f32, z0 as f32);

        let h = |x, z| self.sample(x, z).unwrap_or(0.0);
        let near = h(x0, z0) + (h(x1, z0) - h(x0, z0)) * t.x;
        let far = h(x0, z1) + (h(x1, z1) - h(x0, z1)) * t.x;
        near + (far - near) * t.y
    }
}

pub struct HeightmapTerrainHandler;

impl AssetHandler for HeightmapTerrainHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::HeightmapTerrain
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
        let terrain: HeightmapTerrainAsset = parse_json(source)?;
        if terrain.width < 2 || terrain.depth < 2 {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: terrain grid {}x{} is too small",
                terrain.width, terrain.depth
            )));
        }
        if terrain.cell_spacing <= 0.0 {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: cell spacing must be positive"
            )));
        }
        let expected = terrain.width as usize * terrain.depth as usize;
        if terrain.heights.len() != expected {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: {} heights for a {}x{} grid",
                terrain.heights.len(),
                terrain.width,
                terrain.depth
            )));
        }
        Ok(AssetData::HeightmapTerrain(terrain))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        write_json(
            data.as_heightmap_terrain()
                .ok_or_else(|| wrong_payload(AssetType::HeightmapTerrain, data))?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> AssetIdentity {
        AssetIdentity::new("game", "valley", AssetType::HeightmapTerrain).unwrap()
    }

    #[test]
    fn test_terrain_interpolation() {
        let json = r#"{
            "width": 2, "depth": 2, "cell_spacing": 2.0, "height_scale": 10.0,
            "heights": [0.0, 1.0, 0.0, 1.0]
        }"#;
        let data = HeightmapTerrainHandler
            .deserialize(&id(), &AssetSource::Text(json.into()), None)
            .unwrap();
        let terrain = data.as_heightmap_terrain().unwrap();
        assert_eq!(terrain.world_size(), Vec2::new(2.0, 2.0));
        assert_eq!(terrain.sample(1, 0), Some(10.0));
        assert!((terrain.height_at(Vec2::new(1.0, 1.0)) - 5.0).abs() < 1e-5);
        assert_eq!(terrain.height_at(Vec2::new(50.0, 0.0)), 10.0);
    }

    #[test]
    fn test_terrain_height_count_checked() {
        let json = r#"{ "width": 3, "depth": 3, "cell_spacing": 1.0, "height_scale": 1.0, "heights": [0.0] }"#;
        assert!(HeightmapTerrainHandler
            .deserialize(&id(), &AssetSource::Text(json.into()), None)
            .is_err());
    }
}
