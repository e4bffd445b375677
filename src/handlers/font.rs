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

//! Font handlers
//!
//! Bitmap fonts are a single JSON glyph table. System fonts are loaded in two
//! stages: a JSON config naming a binary face file, then the face itself,
//! which is requested from the cache so fonts naming one face share it.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::cache::AssetRef;
use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handle::AssetHandle;
use crate::handler::{
    wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext, LoadRequest, RequestOutcome,
};
use crate::handlers::{parse_json, write_json};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::{AssetRequest, ImportParams};
use crate::vfs::{LoadTicket, VfsRequest};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: char,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub x_offset: f32,
    #[serde(default)]
    pub y_offset: f32,
    pub x_advance: f32,
}

/// Glyph atlas description; `texture` names the atlas image asset
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BitmapFontAsset {
    pub texture: String,
    pub line_height: f32,
    pub glyphs: Vec<Glyph>,
}

impl BitmapFontAsset {
    pub fn glyph(&self, c: char) -> Option<&Glyph> {
        self.glyphs.iter().find(|g| g.id == c)
    }

    /// Advance width of `text`; unknown characters count as zero
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .filter_map(|c| self.glyph(c))
            .map(|g| g.x_advance)
            .sum()
    }
}

pub struct BitmapFontHandler;

impl AssetHandler for BitmapFontHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::BitmapFont
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
        let font: BitmapFontAsset = parse_json(source)?;
        if font.line_height <= 0.0 {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: line height must be positive"
            )));
        }
        let mut seen = AHashSet::new();
        if let Some(dup) = font.glyphs.iter().find(|g| !seen.insert(g.id)) {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: glyph {:?} defined twice",
                dup.id
            )));
        }
        Ok(AssetData::BitmapFont(font))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        write_json(
            data.as_bitmap_font()
                .ok_or_else(|| wrong_payload(AssetType::BitmapFont, data))?,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FontFace {
    pub size: f32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

/// Text-side description of a system font
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemFontConfig {
    /// Binary face file, `"package.name"` or a name in the font's own package
    pub ttf_asset_name: String,
    pub faces: Vec<FontFace>,
}

/// A loaded system font; the face bytes stay in the binary asset `face`
#[derive(Clone, Debug, PartialEq)]
pub struct SystemFontAsset {
    pub ttf_asset_name: String,
    pub faces: Vec<FontFace>,
    /// Binary face asset, referenced for as long as this font is resident
    pub face: AssetHandle,
}

const CONFIG_STAGE: u32 = 0;
const FACE_STAGE: u32 = 1;

/// Two-stage system font loader.
///
/// Configs waiting for their face asset are parked by load ticket.
#[derive(Default)]
pub struct SystemFontHandler {
    pending: AHashMap<LoadTicket, SystemFontConfig>,
}

impl SystemFontHandler {
    /// Configs parked while their face asset is in flight
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl AssetHandler for SystemFontHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::SystemFont
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities {
            request: true,
            ..HandlerCapabilities::default()
        }
    }

    fn request(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        load: &LoadRequest<'_>,
    ) -> Result<RequestOutcome> {
        let config = VfsRequest::new(load.identity().clone(), false);
        match load.fetch(ctx.vfs, config, CONFIG_STAGE)? {
            Some(source) => self.on_source_loaded(ctx, load, source, CONFIG_STAGE),
            None => Ok(RequestOutcome::Pending),
        }
    }

    fn on_source_loaded(
        &mut self,
        ctx: &mut HandlerContext<'_>,
        load: &LoadRequest<'_>,
        source: AssetSource,
        tag: u32,
    ) -> Result<RequestOutcome> {
        if tag != CONFIG_STAGE {
            return Err(AssetError::InternalFailure(format!(
                "unknown system font load stage {tag}"
            )));
        }
        let config: SystemFontConfig = parse_json(&source)?;
        if config.faces.is_empty() {
            return Err(AssetError::ParseFailed(format!(
                "{}: system font declares no faces",
                load.identity()
            )));
        }
        let face = AssetIdentity::parse_qualified(
            &config.ttf_asset_name,
            AssetType::Binary,
            load.identity().package().as_str(),
        )?;
        tracing::debug!(font = %load.identity(), %face, "requesting font face");

        let request = AssetRequest::for_identity(&face).synchronous(load.synchronous());
        ctx.request_dependency(request, FACE_STAGE);
        self.pending.insert(load.ticket(), config);
        Ok(RequestOutcome::Pending)
    }

    fn on_dependency_loaded(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        load: &LoadRequest<'_>,
        dependency: AssetRef<'_>,
        tag: u32,
    ) -> Result<RequestOutcome> {
        if tag != FACE_STAGE {
            return Err(AssetError::InternalFailure(format!(
                "unknown system font dependency {tag}"
            )));
        }
        let config = self.pending.remove(&load.ticket()).ok_or_else(|| {
            AssetError::InternalFailure(format!(
                "font face arrived for {} without a config",
                load.identity()
            ))
        })?;
        let bytes = dependency
            .data()
            .as_binary()
            .ok_or_else(|| wrong_payload(AssetType::Binary, dependency.data()))?;
        if bytes.bytes.is_empty() {
            return Err(AssetError::ParseFailed(format!(
                "font face '{}' is empty",
                config.ttf_asset_name
            )));
        }

        Ok(RequestOutcome::Ready(AssetData::SystemFont(SystemFontAsset {
            ttf_asset_name: config.ttf_asset_name,
            faces: config.faces,
            face: dependency.handle(),
        })))
    }

    fn abandon(&mut self, ticket: LoadTicket) {
        self.pending.remove(&ticket);
    }
}
