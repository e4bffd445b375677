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

//! Render backend seam used by GPU-facing handlers

use ahash::AHashSet;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{AssetError, Result};
use crate::handlers::image::ImageAsset;
use crate::handlers::static_mesh::Geometry;

/// Opaque backend resource id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuHandle(pub u64);

/// Uploads texture/geometry data; implemented by the renderer
pub trait RenderBackend: Send {
    fn upload_texture(&mut self, image: &ImageAsset) -> Result<GpuHandle>;

    fn release_texture(&mut self, handle: GpuHandle);

    fn upload_geometry(&mut self, geometry: &Geometry) -> Result<GpuHandle>;

    fn release_geometry(&mut self, handle: GpuHandle);
}

#[derive(Default)]
struct HeadlessState {
    next_handle: u64,
    live: AHashSet<GpuHandle>,
    uploads: usize,
    releases: usize,
    fail_uploads: bool,
}

impl HeadlessState {
    fn upload(&mut self, what: &str) -> Result<GpuHandle> {
        if self.fail_uploads {
            return Err(AssetError::GpuUploadFailed(format!(
                "headless backend rejected {what}"
            )));
        }
        self.next_handle += 1;
        let handle = GpuHandle(self.next_handle);
        self.live.insert(handle);
        self.uploads += 1;
        Ok(handle)
    }

    fn release(&mut self, handle: GpuHandle) {
        if self.live.remove(&handle) {
            self.releases += 1;
        } else {
            tracing::warn!(?handle, "release of unknown gpu handle");
        }
    }
}

/// Backend with no device behind it: hands out ids and counts traffic.
///
/// Clones share state, so a test can keep one and give another to the server.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    inner: Arc<Mutex<HeadlessState>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following upload fail with `GpuUploadFailed`
    pub fn set_fail_uploads(&self, fail: bool) {
        self.inner.lock().fail_uploads = fail;
    }

    pub fn upload_count(&self) -> usize {
        self.inner.lock().uploads
    }

    pub fn release_count(&self) -> usize {
        self.inner.lock().releases
    }

    /// Handles uploaded and not yet released
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }
}

impl RenderBackend for HeadlessBackend {
    fn upload_texture(&mut self, image: &ImageAsset) -> Result<GpuHandle> {
        self.inner
            .lock()
            .upload(&format!("{}x{} texture", image.width, image.height))
    }

    fn release_texture(&mut self, handle: GpuHandle) {
        self.inner.lock().release(handle);
    }

    fn upload_geometry(&mut self, geometry: &Geometry) -> Result<GpuHandle> {
        self.inner
            .lock()
            .upload(&format!("geometry '{}'", geometry.name))
    }

    fn release_geometry(&mut self, handle: GpuHandle) {
        self.inner.lock().release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::image::ImageFormat;

    fn image() -> ImageAsset {
        ImageAsset {
            width: 1,
            height: 1,
            channel_count: 4,
            format: ImageFormat::Rgba8,
            mip_levels: 1,
            pixels: vec![0; 4],
            gpu_handle: None,
        }
    }

    #[test]
    fn test_headless_upload_release() {
        let shared = HeadlessBackend::new();
        let mut backend = shared.clone();
        let handle = backend.upload_texture(&image()).unwrap();
        assert_eq!(shared.live_count(), 1);

        backend.release_texture(handle);
        assert_eq!(shared.live_count(), 0);
        assert_eq!(shared.release_count(), 1);

        // Double release is ignored
        backend.release_texture(handle);
        assert_eq!(shared.release_count(), 1);
    }

    #[test]
    fn test_headless_failing_uploads() {
        let mut backend = HeadlessBackend::new();
        backend.set_fail_uploads(true);
        let err = backend.upload_texture(&image()).unwrap_err();
        assert!(matches!(err, AssetError::GpuUploadFailed(_)));
    }
}
