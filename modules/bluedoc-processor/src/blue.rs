//! The content-hashing collaborator.
//!
//! The engine treats `Blue` as a black box: the same logical value must
//! always produce the same blue id. Hashing is the engine's only suspension
//! point besides processor hooks.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait Blue: Send + Sync {
    /// Deterministic content identifier of a canonicalized value.
    async fn calculate_blue_id(&self, value: &Value) -> Result<String>;
}

/// SHA-256 over the canonical JSON encoding, hex encoded.
///
/// Object members serialize in key order, so logically equal values hash
/// equally regardless of how they were built.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Blue;

#[async_trait]
impl Blue for Sha256Blue {
    async fn calculate_blue_id(&self, value: &Value) -> Result<String> {
        let canonical = serde_json::to_vec(value)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}
