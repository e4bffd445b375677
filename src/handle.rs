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

use crate::identity::AssetType;

/// Generation-checked reference to a cache slot.
///
/// A slot's generation moves forward every time it is handed to a new load,
/// so a handle kept past its asset's release stops matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AssetHandle {
    index: u32,
    generation: u32,
    asset_type: AssetType,
}

impl AssetHandle {
    /// Create a new handle
    pub fn new(index: u32, generation: u32, asset_type: AssetType) -> Self {
        Self {
            index,
            generation,
            asset_type,
        }
    }

    /// Get the slot index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Get the handle's generation (for staleness checks)
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Check if handle is valid (generation matches)
    pub fn is_valid_generation(&self, current_generation: u32) -> bool {
        self.generation == current_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_creation() {
        let handle = AssetHandle::new(42, 1, AssetType::Image);
        assert_eq!(handle.index(), 42);
        assert_eq!(handle.generation(), 1);
        assert_eq!(handle.asset_type(), AssetType::Image);
    }

    #[test]
    fn test_handle_validation() {
        let handle = AssetHandle::new(5, 2, AssetType::Text);
        assert!(handle.is_valid_generation(2));
        assert!(!handle.is_valid_generation(3));
    }
}
