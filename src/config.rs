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

use serde::{Deserialize, Serialize};

use crate::error::{AssetError, Result};

/// Asset server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetServerConfig {
    /// Size of the fixed slot table; there is no eviction and no resize
    pub max_asset_count: u32,
    /// Package used when a request does not name one
    pub default_package_name: String,
}

impl AssetServerConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AssetError::Config(format!("malformed asset config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AssetError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_asset_count == 0 {
            return Err(AssetError::Config(
                "max_asset_count must be greater than zero".to_string(),
            ));
        }
        if self.default_package_name.trim().is_empty() {
            return Err(AssetError::Config(
                "default_package_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            max_asset_count: 1024,
            default_package_name: "runtime".to_string(),
        }
    }
}
