// Copyright 2024 The Atlas Crawler Authors
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

//! Stable identifiers shared across every dataset.

use serde::{Deserialize, Serialize};
use sha1::{Digest as Sha1Digest, Sha1};
use sha2::Sha256;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// A globally unique, time-ordered identifier allocated at frontier admission.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Namespace used to derive [AssetId] via UUIDv5; stable across runs so the
/// same asset URL always collapses to the same id.
const ASSET_NAMESPACE: Uuid = Uuid::from_bytes([
    0xa1, 0x7a, 0x5c, 0xd2, 0x9e, 0x3b, 0x44, 0x0a, 0x8f, 0x61, 0x0d, 0x8e, 0x2b, 0x77, 0x4c, 0x91,
]);

/// A deterministic identifier derived from a normalized asset URL.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    pub fn from_normalized_url(normalized_asset_url: &str) -> Self {
        Self(Uuid::new_v5(&ASSET_NAMESPACE, normalized_asset_url.as_bytes()))
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Lower-case hex-encoded SHA-256, used for content_hash/dom_hash/raw_html_hash
/// and for blob content-addressing.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::Digest;
    let digest = Sha256::digest(bytes);
    data_encoding::HEXLOWER.encode(&digest)
}

/// The 16-hex-char url_key: a truncated SHA-1 of the normalized URL.
pub fn url_key(normalized_url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(normalized_url.as_bytes());
    let digest = hasher.finalize();
    data_encoding::HEXLOWER.encode(&digest)[..16].to_string()
}

/// Splits a full hex SHA-256 digest into the `<aa>/<bb>/<full>` blob path components.
pub fn blob_path_components(hex_hash: &str) -> (String, String, String) {
    debug_assert!(hex_hash.len() >= 4, "hash too short to shard: {hex_hash}");
    (
        hex_hash[0..2].to_string(),
        hex_hash[2..4].to_string(),
        hex_hash.to_string(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn asset_id_is_deterministic() {
        let a = AssetId::from_normalized_url("https://example.com/a.png");
        let b = AssetId::from_normalized_url("https://example.com/a.png");
        let c = AssetId::from_normalized_url("https://example.com/b.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn url_key_is_16_hex_chars() {
        let key = url_key("https://example.com/");
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn blob_path_shards_by_first_two_bytes() {
        let hash = sha256_hex(b"hello world");
        let (aa, bb, full) = blob_path_components(&hash);
        assert_eq!(format!("{aa}{bb}"), &hash[0..4]);
        assert_eq!(full, hash);
    }
}
