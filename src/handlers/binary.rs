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
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Opaque byte blob
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryAsset {
    pub bytes: Vec<u8>,
}

/// Binary blob handler; loaded inline
pub struct BinaryHandler;

impl AssetHandler for BinaryHandler {
    fn asset_type(&self) -> AssetType {
        AssetType::Binary
    }

    fn capabilities(&self) -> HandlerCapabilities {
        HandlerCapabilities::INLINE
    }

    fn deserialize(
        &self,
        _identity: &AssetIdentity,
        source: &AssetSource,
        _params: Option<&ImportParams>,
    ) -> Result<AssetData> {
        Ok(AssetData::Binary(BinaryAsset {
            bytes: source.as_bytes().to_vec(),
        }))
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        let blob = data
            .as_binary()
            .ok_or_else(|| wrong_payload(AssetType::Binary, data))?;
        Ok(AssetSource::Binary(blob.bytes.clone()))
    }
}
