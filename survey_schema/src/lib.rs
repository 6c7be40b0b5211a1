//! Persisted survey records and their save-file encodings.

use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current save layout. Files without a version tag read as 0.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// Persisted state of one body's coverage grid.
///
/// Every field is optional: older saves omit the dimensions and damaged
/// saves may lose anything else. Readers default what is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyScanRecord {
    pub data_width: Option<u32>,
    pub data_height: Option<u32>,
    /// Encoded scanned layer.
    pub data: Option<String>,
    /// Encoded revealed layer.
    pub revealed: Option<String>,
    pub mits_transmitted: Option<f32>,
}

impl BodyScanRecord {
    pub fn new(width: u32, height: u32, data: String, revealed: String, mits: f32) -> Self {
        Self {
            data_width: Some(width),
            data_height: Some(height),
            data: Some(data),
            revealed: Some(revealed),
            mits_transmitted: Some(mits),
        }
    }

    /// Persisted dimensions, only when both are present.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.data_width.zip(self.data_height)
    }
}

/// All body records of one save, keyed by body name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveySave {
    #[serde(default)]
    pub version: u32,
    pub bodies: BTreeMap<String, BodyScanRecord>,
    /// Content hash; 0 when the save was never finalized.
    #[serde(default)]
    pub hash: u64,
}

impl SurveySave {
    pub fn new() -> Self {
        Self {
            version: SAVE_FORMAT_VERSION,
            ..Default::default()
        }
    }

    pub fn insert(&mut self, body: impl Into<String>, record: BodyScanRecord) {
        self.bodies.insert(body.into(), record);
    }

    pub fn get(&self, body: &str) -> Option<&BodyScanRecord> {
        self.bodies.get(body)
    }

    /// Stamp the content hash.
    pub fn finalize(mut self) -> Result<Self, SaveFormatError> {
        self.hash = hash_save(&self)?;
        Ok(self)
    }

    /// Whether the stored hash matches the content. Unhashed saves pass.
    pub fn verify_hash(&self) -> Result<bool, SaveFormatError> {
        if self.hash == 0 {
            return Ok(true);
        }
        Ok(hash_save(self)? == self.hash)
    }
}

#[derive(Debug, Error)]
pub enum SaveFormatError {
    #[error("binary save encoding failed: {0}")]
    Binary(#[from] bincode::Error),
    #[error("json save encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Deterministic hash over the binary encoding with the hash field zeroed.
pub fn hash_save(save: &SurveySave) -> Result<u64, SaveFormatError> {
    let mut clone = save.clone();
    clone.hash = 0;
    let encoded = bincode::serialize(&clone)?;
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    Ok(hasher.finish())
}

fn check_version(save: SurveySave) -> Result<SurveySave, SaveFormatError> {
    if save.version > SAVE_FORMAT_VERSION {
        return Err(SaveFormatError::UnsupportedVersion {
            found: save.version,
            supported: SAVE_FORMAT_VERSION,
        });
    }
    Ok(save)
}

pub fn encode_save(save: &SurveySave) -> Result<Vec<u8>, SaveFormatError> {
    Ok(bincode::serialize(save)?)
}

pub fn decode_save(data: &[u8]) -> Result<SurveySave, SaveFormatError> {
    check_version(bincode::deserialize(data)?)
}

pub fn encode_save_json(save: &SurveySave) -> Result<String, SaveFormatError> {
    Ok(serde_json::to_string_pretty(save)?)
}

pub fn decode_save_json(data: &str) -> Result<SurveySave, SaveFormatError> {
    check_version(serde_json::from_str(data)?)
}
