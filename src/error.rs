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

//! Error types

use std::fmt;

use crate::identity::AssetType;

/// Asset system error type
#[derive(Debug, Clone, PartialEq)]
pub enum AssetError {
    /// Package name was empty or otherwise unusable
    InvalidPackage(String),

    /// Asset name was empty or otherwise unusable
    InvalidName(String),

    /// Asset type string did not name a known type
    InvalidAssetType(String),

    /// Handler rejected the source bytes/text
    ParseFailed(String),

    /// Render backend refused the payload
    GpuUploadFailed(String),

    /// No handler is registered for the type, or it cannot load anything
    NoHandler(AssetType),

    /// File missing or I/O failure reported by the VFS
    VfsRequestFailed(String),

    /// Anything the caller cannot act on directly
    InternalFailure(String),

    /// Every slot of the fixed table is occupied
    CapacityExceeded { capacity: usize },

    /// Handle generation no longer matches the slot
    StaleHandle { index: u32, generation: u32 },

    /// Asset exists but has not finished loading
    NotLoaded(String),

    /// No resident asset matches
    NotFound(String),

    /// Handler does not provide the requested operation
    Unsupported {
        asset_type: AssetType,
        operation: &'static str,
    },

    /// Malformed or invalid configuration document
    Config(String),
}

/// Result codes surfaced to request callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    InvalidPackage,
    InvalidName,
    InvalidAssetType,
    ParseFailed,
    GpuUploadFailed,
    NoHandler,
    VfsRequestFailed,
    InternalFailure,
}

impl ResultCode {
    /// Collapse any result into its caller-visible code
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Success,
            Err(err) => err.code(),
        }
    }
}

impl AssetError {
    /// Caller-visible result code for this error
    pub fn code(&self) -> ResultCode {
        match self {
            AssetError::InvalidPackage(_) => ResultCode::InvalidPackage,
            AssetError::InvalidName(_) => ResultCode::InvalidName,
            AssetError::InvalidAssetType(_) => ResultCode::InvalidAssetType,
            AssetError::ParseFailed(_) => ResultCode::ParseFailed,
            AssetError::GpuUploadFailed(_) => ResultCode::GpuUploadFailed,
            AssetError::NoHandler(_) | AssetError::Unsupported { .. } => ResultCode::NoHandler,
            AssetError::VfsRequestFailed(_) => ResultCode::VfsRequestFailed,
            AssetError::InternalFailure(_)
            | AssetError::CapacityExceeded { .. }
            | AssetError::StaleHandle { .. }
            | AssetError::NotLoaded(_)
            | AssetError::NotFound(_)
            | AssetError::Config(_) => ResultCode::InternalFailure,
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::InvalidPackage(msg) => write!(f, "Invalid package: {msg}"),
            AssetError::InvalidName(msg) => write!(f, "Invalid asset name: {msg}"),
            AssetError::InvalidAssetType(msg) => write!(f, "Invalid asset type: {msg}"),
            AssetError::ParseFailed(msg) => write!(f, "Parse failed: {msg}"),
            AssetError::GpuUploadFailed(msg) => write!(f, "GPU upload failed: {msg}"),
            AssetError::NoHandler(asset_type) => {
                write!(f, "No handler registered for asset type {asset_type}")
            }
            AssetError::VfsRequestFailed(msg) => write!(f, "VFS request failed: {msg}"),
            AssetError::InternalFailure(msg) => write!(f, "Internal failure: {msg}"),
            AssetError::CapacityExceeded { capacity } => {
                write!(f, "Asset capacity exceeded (max {capacity} slots)")
            }
            AssetError::StaleHandle { index, generation } => {
                write!(f, "Stale handle: slot {index} generation {generation}")
            }
            AssetError::NotLoaded(msg) => write!(f, "Asset not loaded: {msg}"),
            AssetError::NotFound(msg) => write!(f, "Asset not found: {msg}"),
            AssetError::Unsupported {
                asset_type,
                operation,
            } => write!(f, "Handler for {asset_type} does not support {operation}"),
            AssetError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for AssetError {}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::ParseFailed(err.to_string())
    }
}

impl From<speedy::Error> for AssetError {
    fn from(err: speedy::Error) -> Self {
        AssetError::ParseFailed(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AssetError>;
