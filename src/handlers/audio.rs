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

use speedy::{Readable, Writable};

use crate::data::{AssetData, AssetSource};
use crate::error::{AssetError, Result};
use crate::handler::{wrong_payload, AssetHandler, HandlerCapabilities};
use crate::handlers::{read_speedy, write_speedy};
use crate::identity::{AssetIdentity, AssetType};
use crate::request::ImportParams;

/// Interleaved 16-bit PCM; also the on-disk layout
#[derive(Clone, Debug, PartialEq, Eq, Readable, Writable)]
pub struct AudioAsset {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl AudioAsset {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }
}

/// Sound effects and music share a payload; the handler instance decides
/// which type tag it serves.
pub struct AudioHandler {
    asset_type: AssetType,
}

impl AudioHandler {
    pub fn sound() -> Self {
        Self {
            asset_type: AssetType::Audio,
        }
    }

    pub fn music() -> Self {
        Self {
            asset_type: AssetType::Music,
        }
    }
}

impl AssetHandler for AudioHandler {
    fn asset_type(&self) -> AssetType {
        self.asset_type
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
        let audio: AudioAsset = read_speedy(source)?;
        if audio.channels == 0 || audio.sample_rate == 0 {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: {} channels at {} Hz",
                audio.channels, audio.sample_rate
            )));
        }
        if audio.samples.len() % audio.channels as usize != 0 {
            return Err(AssetError::ParseFailed(format!(
                "{identity}: {} samples do not split into {} channels",
                audio.samples.len(),
                audio.channels
            )));
        }
        Ok(match self.asset_type {
            AssetType::Music => AssetData::Music(audio),
            _ => AssetData::Audio(audio),
        })
    }

    fn serialize(&self, data: &AssetData) -> Result<AssetSource> {
        if data.asset_type() != self.asset_type {
            return Err(wrong_payload(self.asset_type, data));
        }
        let audio = data
            .as_audio()
            .ok_or_else(|| wrong_payload(self.asset_type, data))?;
        write_speedy(audio)
    }
}
