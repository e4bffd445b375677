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

//! Image handler
//!
//! Images are stored as a `speedy` encoded [`ImageFile`] and uploaded to the
//! render backend when the load finishes.

use speedy::{Readable, Writable};

use crate::backend::GpuHandle;
use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext};
use crate::handlers::{read_speedy, write_speedy};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Pixel layout, derived from the channel count
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    R8,
    Rg8,
    Rgb8,
    Rgba8,
}

impl ImageFormat {
    pub fn from_channel_count(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(ImageFormat::R8),
            2 => Some(ImageFormat::Rg8),
            3 => Some(ImageFormat::Rgb8),
            4 => Some(ImageFormat::Rgba8),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u8 {
        match self {
            ImageFormat::R8 => 1,
            ImageFormat::Rg8 => 2,
            ImageFormat::Rgb8 => 3,
            ImageFormat::Rgba8 => 4,
        }
    }
}

/// On-disk image layout
#[derive(Clone, Debug, PartialEq, Eq, Readable, Writable)]
pub struct ImageFile {
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub pixels: Vec<u8>,
}

/// Decoded image, row-major, top row first
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub channel_count: u8,
    pub format: ImageFormat,
    pub mip_levels: u32,
    pub pixels: Vec<u8>,
    /// Set once the texture is resident on the backend
    pub gpu_handle: Option<GpuHandle>,
}

impl ImageAsset {
    pub fn from_file(file: ImageFile, flip_y: bool) -> Result<Self> {
        let format = ImageFormat::from_channel_count(file.channel_count).ok_or_else(|| {
            AssetError::ParseFailed(format!("unsupported channel count {}", file.channel_count))
        })?;
        if file.width == 0 || file.height == 0 {
            return Err(AssetError::ParseFailed(format!(
                "degenerate image {}x{}",
                file.width, file.height
            )));
        }
        let expected = file.width as usize * file.height as usize * file.channel_count as usize;
        if file.pixels.len() != expected {
            return Err(AssetError::ParseFailed(format!(
                "pixel data is {} bytes, expected {expected}",
                file.pixels.len()
            )));
        }

        let mut image = Self {
            width: file.width,
            height: file.height,
            channel_count: file.channel_count,
            format,
            mip_levels: mip_level_count(file.width, file.height),
            pixels: file.pixels,
            gpu_handle: None,
        };
        if flip_y {
            image.flip_vertical();
        }
        Ok(image)
    }

    pub fn row_pitch(&self) -> usize {
        self.width as usize * self.channel_count as usize
    }

    pub fn flip_vertical(&mut self) {
        let pitch = self.row_pitch();
        let rows = self.height as usize;
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (head, tail) = self.pixels.split_at_mut(bottom * pitch);
            head[top * pitch..(top + 1) * pitch].swap_with_slice(&mut tail[..pitch]);
        }
    }

    fn to_file(&self) -> ImageFile {
        ImageFile {
            width: self.width,
            height: self.height,
            channel_count: self.channel_count,
            pixels: self.pixels.clone(),
        }
    }
}

/// Full mip chain length down to 1x1
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

pub struct ImageHandler;

impl AssetHandler for ImageHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Image
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::ASYNC.with_hot_reload()
    }

    fn deserialize(
        &self,
        _identity: &AssetIdentity,
        source: &AssetSource,
        params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        let flip_y = matches!(params, Some(ImportParams::Image { flip_y: true }));
        let file: ImageFile = read_speedy(source)?;
        ImageAsset::from_file(file, flip_y).map(AssetData::Image)
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        let image = data
            .as_image()
            .ok_or_else(|| wrong_payload(AssetType::Image, data))?;
        write_speedy(&image.to_file())
    }

    fn finalize(&mut self, ctx: &mut HandlerContext<'_>, data: &mut AssetData) -> Result<()> {
        let image = match data {
            AssetData::Image(image) => image,
            other => return Err(wrong_payload(AssetType::Image, other)),
        };
        image.gpu_handle = Some(ctx.backend.upload_texture(image)?);
        Ok(())
    }

    fn release(&mut self, ctx: &mut HandlerContext<'_>, data: &mut AssetData) {
        if let Some(handle) = data.as_image_mut().and_then(|i| i.gpu_handle.take()) {
            ctx.backend.release_texture(handle);
        }
    }

    fn on_hot_reload(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        live: &mut AssetData,
        fresh: AssetData,
    ) -> Result<()> {
        let (live, mut fresh) = match (live, fresh) {
            (AssetData::Image(live), AssetData::Image(fresh)) => (live, fresh),
            (_, fresh) => return Err(wrong_payload(AssetType::Image, &fresh)),
        };
        // Upload first so a failed upload leaves the live texture untouched
        fresh.gpu_handle = Some(ctx.backend.upload_texture(&fresh)?);
        if let Some(old) = live.gpu_handle.take() {
            ctx.backend.release_texture(old);
        }
        *live = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::vfs::MemoryVfs;

    fn id() -> AssetIdentity {
        AssetIdentity::new("game", "hero_texture", AssetType::Image).unwrap()
    }

    fn encoded(width: u32, height: u32, pixels: Vec<u8>) -> AssetSource {
        write_speedy(&ImageFile {
            width,
            height,
            channel_count: 1,
            pixels,
        })
        .unwrap()
    }

    #[test]
    fn test_mip_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 20), 9);
    }

    #[test]
    fn test_decode_and_flip() {
        let source = encoded(2, 3, vec![1, 1, 2, 2, 3, 3]);
        let plain = ImageHandler.deserialize(&id(), &source, None).unwrap();
        assert_eq!(plain.as_image().unwrap().pixels, vec![1, 1, 2, 2, 3, 3]);
        assert_eq!(plain.as_image().unwrap().format, ImageFormat::R8);

        let flipped = ImageHandler
            .deserialize(&id(), &source, Some(&ImportParams::Image { flip_y: true }))
            .unwrap();
        assert_eq!(flipped.as_image().unwrap().pixels, vec![3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn test_pixel_size_mismatch_is_parse_failure() {
        let err = ImageHandler
            .deserialize(&id(), &encoded(4, 4, vec![0; 3]), None)
            .unwrap_err();
        assert!(matches!(err, AssetError::ParseFailed(_)));
    }

    #[test]
    fn test_upload_release_and_reload_swap() {
        let mut vfs = MemoryVfs::new();
        let backend = HeadlessBackend::new();
        let mut device = backend.clone();
        let mut ctx = HandlerContext::new(&mut vfs, &mut device);
        let mut handler = ImageHandler;

        let mut live = handler
            .deserialize(&id(), &encoded(1, 1, vec![9]), None)
            .unwrap();
        handler.finalize(&mut ctx, &mut live).unwrap();
        let first = live.as_image().unwrap().gpu_handle;
        assert!(first.is_some());

        let fresh = handler
            .deserialize(&id(), &encoded(1, 1, vec![7]), None)
            .unwrap();
        handler.on_hot_reload(&mut ctx, &mut live, fresh).unwrap();
        assert_eq!(live.as_image().unwrap().pixels, vec![7]);
        assert_ne!(live.as_image().unwrap().gpu_handle, first);
        assert_eq!(backend.live_count(), 1);

        handler.release(&mut ctx, &mut live);
        assert_eq!(backend.live_count(), 0);
    }

    #[test]
    fn test_failed_upload_surfaces_gpu_error() {
        let mut vfs = MemoryVfs::new();
        let mut backend = HeadlessBackend::new();
        backend.set_fail_uploads(true);
        let mut ctx = HandlerContext::new(&mut vfs, &mut backend);

        let mut data = ImageHandler
            .deserialize(&id(), &encoded(1, 1, vec![0]), None)
            .unwrap();
        let err = ImageHandler.finalize(&mut ctx, &mut data).unwrap_err();
        assert_eq!(err.code(), crate::error::ResultCode::GpuUploadFailed);
        assert!(data.as_image().unwrap().gpu_handle.is_none());
    }
}
