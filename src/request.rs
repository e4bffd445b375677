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

use crate::error::{AssetError, Result};
use crate::identity::{AssetIdentity, AssetType, Name};

/// Per-request import options understood by specific handlers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportParams {
    Image { flip_y: bool },
}

/// Everything the caller says about one request
#[derive(Clone, Debug)]
pub struct AssetRequest {
    pub asset_type: AssetType,
    pub package: Option<String>,
    pub name: String,
    /// Tear the asset down when its last reference goes; sticky from the first request
    pub auto_release: bool,
    /// Finish inside the `request` call instead of through `update`
    pub synchronous: bool,
    /// Register a hot-reload watch once loaded
    pub watch: bool,
    pub import_params: Option<ImportParams>,
}

impl AssetRequest {
    pub fn new(asset_type: AssetType, name: impl Into<String>) -> Self {
        Self {
            asset_type,
            package: None,
            name: name.into(),
            auto_release: true,
            synchronous: false,
            watch: false,
            import_params: None,
        }
    }

    /// Request for an already canonical identity
    pub fn for_identity(identity: &AssetIdentity) -> Self {
        Self::new(identity.asset_type(), identity.name().as_str())
            .package(identity.package().as_str())
    }

    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn auto_release(mut self, auto_release: bool) -> Self {
        self.auto_release = auto_release;
        self
    }

    pub fn synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn import_params(mut self, params: ImportParams) -> Self {
        self.import_params = Some(params);
        self
    }

    /// Canonical identity, filling in `default_package` when none was given
    pub fn identity(&self, default_package: &Name) -> Result<AssetIdentity> {
        let package = match &self.package {
            Some(raw) => {
                Name::new(raw).ok_or_else(|| AssetError::InvalidPackage(raw.clone()))?
            }
            None => default_package.clone(),
        };
        let name =
            Name::new(&self.name).ok_or_else(|| AssetError::InvalidName(self.name.clone()))?;
        Ok(AssetIdentity::from_names(package, name, self.asset_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = AssetRequest::new(AssetType::Image, "hero");
        assert!(req.auto_release);
        assert!(!req.synchronous);
        assert!(!req.watch);
    }

    #[test]
    fn test_identity_uses_default_package() {
        let default = Name::new("runtime").unwrap();
        let id = AssetRequest::new(AssetType::Text, "notes")
            .identity(&default)
            .unwrap();
        assert_eq!(id.package(), &default);

        let id = AssetRequest::new(AssetType::Text, "notes")
            .package("game")
            .identity(&default)
            .unwrap();
        assert_eq!(id.package().as_str(), "game");
    }

    #[test]
    fn test_for_identity_round_trips() {
        let default = Name::new("runtime").unwrap();
        let face = AssetIdentity::new("fonts", "sans", AssetType::Binary).unwrap();
        let req = AssetRequest::for_identity(&face);
        assert_eq!(req.identity(&default).unwrap(), face);
    }

    #[test]
    fn test_identity_rejects_blank_parts() {
        let default = Name::new("runtime").unwrap();
        assert!(matches!(
            AssetRequest::new(AssetType::Text, "notes")
                .package("  ")
                .identity(&default),
            Err(AssetError::InvalidPackage(_))
        ));
        assert!(matches!(
            AssetRequest::new(AssetType::Text, "").identity(&default),
            Err(AssetError::InvalidName(_))
        ));
    }
}
