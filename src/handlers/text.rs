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

use crate::data::{AssetData, AssetSource};
use crate::error::Result;
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities, HandlerContext};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Text file asset
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TextAsset {
    pub content: String,
}

/// Text handler; loaded inline, reloadable
pub struct TextHandler;

impl AssetHandler for TextHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Text
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::INLINE.with_hot_reload()
    }

    fn deserialize(
        &self,
        _identity: &AssetIdentity,
        source: &AssetSource,
        _params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        Ok(AssetData::Text(TextAsset {
            content: source.as_text()?.to_owned(),
        }))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        let text = data
            .as_text()
            .ok_or_else(|| wrong_payload(AssetType::Text, data))?;
        Ok(AssetSource::Text(text.content.clone()))
    }

    fn on_hot_reload(
        &mut self,
        _ctx: &mut HandlerContext<'_>,
        live: &mut AssetData,
        fresh: AssetData,
    ) -> Result<()> {
        match (live, fresh) {
            (AssetData::Text(live), AssetData::Text(fresh)) => {
                live.content = fresh.content;
                Ok(())
            }
            (_, fresh) => Err(wrong_payload(AssetType::Text, &fresh)),
        }
    }
}
