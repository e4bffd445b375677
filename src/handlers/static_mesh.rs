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

//! Static mesh handler
//!
//! A mesh is a list of geometries, each with its own material binding. Every
//! geometry is uploaded separately; a failed upload rolls back the ones that
//! already went through.

use glam::Vec3;
use speedy::{Readable, Writable};

use crate::backend::{GpuHandle, RenderBackend};
use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext};
use crate::handlers::{read_speedy, write_speedy};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// On-disk geometry: flat float streams plus triangle indices
#[derive(Clone, Debug, PartialEq, Readable, Writable)]
pub struct GeometryFile {
    pub name: String,
    pub material_name: String,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub texcoords: Vec<f32>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Readable, Writable)]
pub struct MeshFile {
    pub geometries: Vec<GeometryFile>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub name: String,
    pub material_name: String,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub texcoords: Vec<f32>,
    pub indices: Vec<u32>,
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub gpu_handle: Option<GpuHandle>,
}

impl Geometry {
    fn from_file(file: GeometryFile) -> Result<Self> {
        let invalid = |what: String| AssetError::ParseFailed(format!("geometry '{}': {what}", file.name));

        if file.positions.is_empty() || file.positions.len() % 3 != 0 {
            return Err(invalid(format!(
                "{} position floats is not a whole number of vertices",
                file.positions.len()
            )));
        }
        let vertex_count = file.positions.len() / 3;
        if !file.normals.is_empty() && file.normals.len() != file.positions.len() {
            return Err(invalid("normal count does not match vertices".to_string()));
        }
        if !file.texcoords.is_empty() && file.texcoords.len() != vertex_count * 2 {
            return Err(invalid("texcoord count does not match vertices".to_string()));
        }
        if file.indices.len() % 3 != 0 {
            return Err(invalid("index count is not a multiple of 3".to_string()));
        }
        if let Some(&bad) = file.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(invalid(format!("index {bad} out of range ({vertex_count} vertices)")));
        }

        let (min, max) = file
            .positions
            .chunks_exact(3)
            .map(Vec3::from_slice)
            .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), p| {
                (lo.min(p), hi.max(p))
            });

        Ok(Self {
            name: file.name,
            material_name: file.material_name,
            positions: file.positions,
            normals: file.normals,
            texcoords: file.texcoords,
            indices: file.indices,
            min,
            max,
            center: (min + max) * 0.5,
            gpu_handle: None,
        })
    }

    fn to_file(&self) -> GeometryFile {
        GeometryFile {
            name: self.name.clone(),
            material_name: self.material_name.clone(),
            positions: self.positions.clone(),
            normals: self.normals.clone(),
            texcoords: self.texcoords.clone(),
            indices: self.indices.clone(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StaticMeshAsset {
    pub geometries: Vec<Geometry>,
}

impl StaticMeshAsset {
    /// Bytes held by the vertex and index streams
    pub fn memory_size(&self) -> usize {
        self.geometries
            .iter()
            .map(|g| {
                (g.positions.len() + g.normals.len() + g.texcoords.len()) * std::mem::size_of::<f32>()
                    + g.indices.len() * std::mem::size_of::<u32>()
            })
            .sum()
    }

    /// Bounds over every geometry
    pub fn bounds(&self) -> (Vec3, Vec3) {
        self.geometries.iter().fold(
            (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
            |(lo, hi), g| (lo.min(g.min), hi.max(g.max)),
        )
    }

    pub fn geometry(&self, name: &str) -> Option<&Geometry> {
        self.geometries.iter().find(|g| g.name == name)
    }

    fn upload(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        for i in 0..self.geometries.len() {
            match backend.upload_geometry(&self.geometries[i]) {
                Ok(handle) => self.geometries[i].gpu_handle = Some(handle),
                Err(err) => {
                    self.release_gpu(backend);
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn release_gpu(&mut self, backend: &mut dyn RenderBackend) {
        for geometry in &mut self.geometries {
            if let Some(handle) = geometry.gpu_handle.take() {
                backend.release_geometry(handle);
            }
        }
    }
}

pub struct StaticMeshHandler;

impl AssetHandler for StaticMeshHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::StaticMesh
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
        let file: MeshFile = read_speedy(source)?;
        if file.geometries.is_empty() {
            return Err(AssetError::ParseFailed(format!("{identity} has no geometry")));
        }
        let geometries = file
            .geometries
            .into_iter()
            .map(Geometry::from_file)
            .collect::<Result<Vec<_>>>()?;
        Ok(AssetData::StaticMesh(StaticMeshAsset { geometries }))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        let mesh = data
            .as_static_mesh()
            .ok_or_else(|| wrong_payload(AssetType::StaticMesh, data))?;
        write_speedy(&MeshFile {
            geometries: mesh.geometries.iter().map(Geometry::to_file).collect(),
        })
    }

    fn finalize(&mut self, ctx: &mut HandlerContext<'_>, data: &mut AssetData) -> Result<()> {
        match data {
            AssetData::StaticMesh(mesh) => mesh.upload(ctx.backend),
            other => Err(wrong_payload(AssetType::StaticMesh, other)),
        }
    }

    fn release(&mut self, ctx: &mut HandlerContext<'_>, data: &mut AssetData) {
        if let Some(mesh) = data.as_static_mesh_mut() {
            mesh.release_gpu(ctx.backend);
        }
    }

    fn on_hot_reload(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        live: &mut AssetData,
        fresh: AssetData,
    ) -> Result<()> {
        match (live, fresh) {
            (AssetData::StaticMesh(live), AssetData::StaticMesh(mut fresh)) => {
                fresh.upload(ctx.backend)?;
                live.release_gpu(ctx.backend);
                *live = fresh;
                Ok(())
            }
            (_, fresh) => Err(wrong_payload(AssetType::StaticMesh, &fresh)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::vfs::MemoryVfs;

    fn id() -> AssetIdentity {
        AssetIdentity::new("game", "crate_mesh", AssetType::StaticMesh).unwrap()
    }

    fn triangle(name: &str, offset: f32) -> GeometryFile {
        GeometryFile {
            name: name.to_string(),
            material_name: "wood".to_string(),
            positions: vec![
                offset, 0.0, 0.0, //
                offset + 2.0, 0.0, 0.0, //
                offset, 4.0, -2.0,
            ],
            normals: Vec::new(),
            texcoords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        }
    }

    fn encoded(geometries: Vec<GeometryFile>) -> AssetSource {
        write_speedy(&MeshFile { geometries }).unwrap()
    }

    #[test]
    fn test_extents_and_center() {
        let data = StaticMeshHandler
            .deserialize(&id(), &encoded(vec![triangle("lid", 0.0)]), None)
            .unwrap();
        let mesh = data.as_static_mesh().unwrap();
        let lid = mesh.geometry("lid").unwrap();
        assert_eq!(lid.min, Vec3::new(0.0, 0.0, -2.0));
        assert_eq!(lid.max, Vec3::new(2.0, 4.0, 0.0));
        assert_eq!(lid.center, Vec3::new(1.0, 2.0, -1.0));
        assert_eq!(lid.triangle_count(), 1);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut bad = triangle("lid", 0.0);
        bad.indices = vec![0, 1, 3];
        let err = StaticMeshHandler
            .deserialize(&id(), &encoded(vec![bad]), None)
            .unwrap_err();
        assert!(matches!(err, AssetError::ParseFailed(_)));
    }

    #[test]
    fn test_upload_every_geometry_and_release() {
        let mut vfs = MemoryVfs::new();
        let backend = HeadlessBackend::new();
        let mut device = backend.clone();
        let mut ctx = HandlerContext::new(&mut vfs, &mut device);
        let mut handler = StaticMeshHandler;

        let mut data = handler
            .deserialize(
                &id(),
                &encoded(vec![triangle("a", 0.0), triangle("b", 5.0)]),
                None,
            )
            .unwrap();
        handler.finalize(&mut ctx, &mut data).unwrap();
        assert_eq!(backend.live_count(), 2);

        let (lo, hi) = data.as_static_mesh().unwrap().bounds();
        assert_eq!(lo.x, 0.0);
        assert_eq!(hi.x, 7.0);

        handler.release(&mut ctx, &mut data);
        assert_eq!(backend.live_count(), 0);
        assert_eq!(backend.release_count(), 2);
    }
}
