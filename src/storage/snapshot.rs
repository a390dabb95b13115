use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{Read, Write};

use chacha20poly1305::aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, Tag};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use rand::{rngs::OsRng, RngCore};
use serde_derive::{Deserialize, Serialize};

use crate::access::{Permission, User};
use crate::error::{Error, Result};
use crate::sql::engine::Memory;

/// The snapshot format version written by save().
pub const VERSION: u32 = 1;
/// The only supported payload cipher.
pub const ALGORITHM: &str = "chacha20-poly1305";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// A 256-bit snapshot encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct SnapshotKey([u8; 32]);

impl SnapshotKey {
    /// Parses a key from 64 hex digits.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = hex::decode(hex.trim())?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| Error::Config(format!("Encryption key must be 32 bytes, got {}", b.len())))?;
        Ok(Self(bytes))
    }

    /// Generates a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("SnapshotKey(..)")
    }
}

/// The snapshot header, stored as plaintext JSON ahead of the payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub encrypted: bool,
    pub compressed: bool,
    pub algorithm: Option<String>,
}

/// The persisted state of a database. The query log is not part of it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub tables: Memory,
    pub roles: BTreeMap<String, BTreeSet<Permission>>,
    pub users: BTreeMap<String, User>,
}

/// Serializes a state into a snapshot blob:
/// `[u32 LE header length][JSON header][payload]`, where the payload is the
/// JSON state, gzipped if compressing, then encrypted if a key is given as
/// `nonce ‖ tag ‖ ciphertext`. The header is authenticated along with the
/// payload.
pub fn save(state: &State, key: Option<&SnapshotKey>, compress: bool) -> Result<Vec<u8>> {
    let header = Header {
        version: VERSION,
        created_at: Utc::now(),
        encrypted: key.is_some(),
        compressed: compress,
        algorithm: key.map(|_| ALGORITHM.to_string()),
    };
    let header = serde_json::to_vec(&header)?;

    let mut payload = serde_json::to_vec(state)?;
    if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        payload = encoder.finish()?;
    }
    if let Some(key) = key {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let tag = key
            .cipher()
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), &header, &mut payload)
            .map_err(|e| Error::Internal(format!("Snapshot encryption failed: {}", e)))?;
        let mut sealed = Vec::with_capacity(NONCE_LEN + TAG_LEN + payload.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&tag);
        sealed.extend_from_slice(&payload);
        payload = sealed;
    }

    let length = u32::try_from(header.len())
        .map_err(|_| Error::Snapshot(format!("Header too large: {} bytes", header.len())))?;
    let mut blob = Vec::with_capacity(4 + header.len() + payload.len());
    blob.extend_from_slice(&length.to_le_bytes());
    blob.extend_from_slice(&header);
    blob.extend_from_slice(&payload);
    debug!("Serialized snapshot of {} bytes", blob.len());
    Ok(blob)
}

/// Reads the header of a snapshot blob, returning it and the payload.
pub fn read_header(blob: &[u8]) -> Result<(Header, &[u8], &[u8])> {
    if blob.len() < 4 {
        return Err(Error::Snapshot("Snapshot is truncated".into()));
    }
    let (length, rest) = blob.split_at(4);
    let length = u32::from_le_bytes([length[0], length[1], length[2], length[3]]) as usize;
    if rest.len() < length {
        return Err(Error::Snapshot("Snapshot header is truncated".into()));
    }
    let (raw, payload) = rest.split_at(length);
    let header: Header =
        serde_json::from_slice(raw).map_err(|e| Error::Snapshot(format!("Invalid snapshot header: {}", e)))?;
    if header.version != VERSION {
        return Err(Error::Snapshot(format!("Unsupported snapshot version {}", header.version)));
    }
    if let Some(algorithm) = &header.algorithm {
        if algorithm != ALGORITHM {
            return Err(Error::Snapshot(format!("Unsupported snapshot algorithm {}", algorithm)));
        }
    }
    Ok((header, raw, payload))
}

/// Restores a state from a snapshot blob. Any failure fails the whole load.
pub fn load(blob: &[u8], key: Option<&SnapshotKey>) -> Result<State> {
    let (header, raw, payload) = read_header(blob)?;
    let mut payload = payload.to_vec();

    match (header.encrypted, key) {
        (true, None) => return Err(Error::Snapshot("Snapshot is encrypted but no key is configured".into())),
        (true, Some(key)) => {
            if payload.len() < NONCE_LEN + TAG_LEN {
                return Err(Error::DecryptionFailure);
            }
            let mut ciphertext = payload.split_off(NONCE_LEN + TAG_LEN);
            let (nonce, tag) = payload.split_at(NONCE_LEN);
            key.cipher()
                .decrypt_in_place_detached(Nonce::from_slice(nonce), raw, &mut ciphertext, Tag::from_slice(tag))
                .map_err(|_| Error::DecryptionFailure)?;
            payload = ciphertext;
        },
        (false, Some(_)) => warn!("Loading a plaintext snapshot while an encryption key is configured"),
        (false, None) => {},
    }

    if header.compressed {
        let mut decoded = Vec::new();
        GzDecoder::new(payload.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| Error::Snapshot(format!("Invalid snapshot compression: {}", e)))?;
        payload = decoded;
    }

    let mut state: State =
        serde_json::from_slice(&payload).map_err(|e| Error::Snapshot(format!("Invalid snapshot payload: {}", e)))?;
    state.tables.restore()?;
    for user in state.users.values() {
        if !state.roles.contains_key(&user.role) {
            return Err(Error::Snapshot(format!("User has unknown role {}", user.role)));
        }
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Access;
    use crate::sql::engine::Store;
    use crate::sql::schema::{Catalog, Column, Table};
    use crate::sql::types::{DataType, Row, Value};

    fn state() -> Result<State> {
        let mut tables = Memory::new();
        tables.create_table(Table::new("notes", vec![Column::new("body", DataType::Text)])?)?;
        let row: Row = vec![("id".to_string(), Value::Integer(1)), ("body".to_string(), Value::from("hi"))]
            .into_iter()
            .collect();
        tables.insert("notes", row)?;
        let mut access = Access::new();
        access.add_user("alice", "pw", "operator")?;
        Ok(State { tables, roles: access.roles().clone(), users: access.user_records().clone() })
    }

    #[test]
    fn round_trip() -> Result<()> {
        let state = state()?;
        let key = SnapshotKey::generate();
        for (key, compress) in [(None, false), (None, true), (Some(&key), false), (Some(&key), true)] {
            let blob = save(&state, key, compress)?;
            let (header, _, _) = read_header(&blob)?;
            assert_eq!(header.encrypted, key.is_some());
            assert_eq!(header.compressed, compress);
            assert_eq!(load(&blob, key)?, state);
        }
        Ok(())
    }

    #[test]
    fn ciphertext_hides_plaintext() -> Result<()> {
        let blob = save(&state()?, Some(&SnapshotKey::generate()), false)?;
        let text = String::from_utf8_lossy(&blob);
        assert!(!text.contains("notes"));
        assert!(!text.contains("alice"));
        Ok(())
    }

    #[test]
    fn rejects_tampering() -> Result<()> {
        let state = state()?;
        let key = SnapshotKey::generate();
        let blob = save(&state, Some(&key), true)?;

        assert_eq!(load(&blob, Some(&SnapshotKey::generate())), Err(Error::DecryptionFailure));

        let mut flipped = blob.clone();
        let last = flipped.len() - 1;
        flipped[last] ^= 0x01;
        assert_eq!(load(&flipped, Some(&key)), Err(Error::DecryptionFailure));

        // The header is authenticated too: move the creation year.
        let mut header = blob.clone();
        let at = String::from_utf8_lossy(&header).find("\"createdAt\":\"").map(|i| i + 13);
        if let Some(at) = at {
            header[at] = if header[at] == b'1' { b'2' } else { b'1' };
        }
        assert_eq!(load(&header, Some(&key)), Err(Error::DecryptionFailure));

        assert!(matches!(load(&blob, None), Err(Error::Snapshot(_))));
        assert!(matches!(load(&blob[..3], Some(&key)), Err(Error::Snapshot(_))));
        Ok(())
    }

    #[test]
    fn rejects_unknown_versions() -> Result<()> {
        let header = serde_json::to_vec(&Header {
            version: 2,
            created_at: Utc::now(),
            encrypted: false,
            compressed: false,
            algorithm: None,
        })?;
        let mut blob = (header.len() as u32).to_le_bytes().to_vec();
        blob.extend(header);
        blob.extend(b"{}");
        assert_eq!(load(&blob, None), Err(Error::Snapshot("Unsupported snapshot version 2".into())));
        Ok(())
    }

    #[test]
    fn key_parsing() {
        let key = SnapshotKey::generate();
        assert_eq!(SnapshotKey::from_hex(&key.to_hex()), Ok(key));
        assert!(SnapshotKey::from_hex("abcd").is_err());
        assert!(SnapshotKey::from_hex("zz").is_err());
    }
}
