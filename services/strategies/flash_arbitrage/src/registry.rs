//! # DEX Registry - Protocol Key, Id and Variant Lookup
//!
//! Static table mapping a protocol key (`"UNISWAP_V2"`) to the numeric id used
//! in hop-chain input, a display name for diagnostics and the
//! [`ProtocolVariant`] the adapters dispatch on. Built once, then passed by
//! reference; there is no mutation API.
//!
//! ## Data File
//!
//! ```json
//! {
//!   "THENA": { "id": 4, "name": "Thena",
//!              "protocol": { "family": "constant_product", "fee_bps": 20 } }
//! }
//! ```
//!
//! The built-in table is `config/dex2id.json`, embedded at compile time.

use crate::error::EngineError;
use arb_types::ProtocolVariant;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const BUILTIN_TABLE: &str = include_str!("../config/dex2id.json");

/// Failures while building a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse registry data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("id {id} is used by both {first} and {second}")]
    DuplicateId { id: u8, first: String, second: String },
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: u8,
    name: String,
    protocol: ProtocolVariant,
}

/// One registered protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexEntry {
    pub key: String,
    pub id: u8,
    pub name: String,
    pub protocol: ProtocolVariant,
}

#[derive(Debug, Clone)]
pub struct DexRegistry {
    by_key: HashMap<String, DexEntry>,
    by_id: BTreeMap<u8, String>,
}

impl DexRegistry {
    /// Registry from the embedded table
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_TABLE)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut by_key = HashMap::with_capacity(raw.len());
        let mut by_id: BTreeMap<u8, String> = BTreeMap::new();

        for (key, entry) in raw {
            if let Some(first) = by_id.get(&entry.id) {
                return Err(RegistryError::DuplicateId {
                    id: entry.id,
                    first: first.clone(),
                    second: key,
                });
            }
            by_id.insert(entry.id, key.clone());
            by_key.insert(
                key.clone(),
                DexEntry {
                    key,
                    id: entry.id,
                    name: entry.name,
                    protocol: entry.protocol,
                },
            );
        }

        debug!(entries = by_key.len(), "DEX registry loaded");
        Ok(Self { by_key, by_id })
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn id_of(&self, key: &str) -> Result<u8, EngineError> {
        self.entry(key).map(|e| e.id)
    }

    pub fn name_of(&self, key: &str) -> Result<&str, EngineError> {
        self.entry(key).map(|e| e.name.as_str())
    }

    pub fn entry(&self, key: &str) -> Result<&DexEntry, EngineError> {
        self.by_key
            .get(key)
            .ok_or_else(|| EngineError::UnknownProtocol(key.to_string()))
    }

    pub fn entry_by_id(&self, id: u8) -> Result<&DexEntry, EngineError> {
        self.by_id
            .get(&id)
            .and_then(|key| self.by_key.get(key))
            .ok_or_else(|| EngineError::UnknownProtocol(format!("id {}", id)))
    }

    pub fn key_of(&self, id: u8) -> Result<&str, EngineError> {
        self.entry_by_id(id).map(|e| e.key.as_str())
    }

    pub fn protocol_of(&self, id: u8) -> Result<ProtocolVariant, EngineError> {
        self.entry_by_id(id).map(|e| e.protocol)
    }

    /// All entries ordered by id
    pub fn entries(&self) -> impl Iterator<Item = &DexEntry> + '_ {
        self.by_id.values().filter_map(|key| self.by_key.get(key))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arb_types::{ConcentratedFlavor, CurveStableKind, PairCallShape, ProtocolFamily};

    #[test]
    fn test_builtin_table() {
        let registry = DexRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 28);

        let id = registry.id_of("THENA").unwrap();
        assert_eq!(registry.name_of("THENA").unwrap(), "Thena");
        assert_eq!(registry.protocol_of(id).unwrap(), ProtocolVariant::constant_product(20));
        assert_eq!(registry.key_of(id).unwrap(), "THENA");

        let bakery = registry.entry("BAKERYSWAP").unwrap();
        assert_eq!(
            bakery.protocol,
            ProtocolVariant::ConstantProduct {
                fee_bps: 30,
                shape: PairCallShape::Legacy
            }
        );

        let fusion = registry.entry("THENA_FUSION").unwrap();
        assert_eq!(
            fusion.protocol,
            ProtocolVariant::Concentrated {
                flavor: ConcentratedFlavor::Algebra
            }
        );
    }

    #[test]
    fn test_every_curve_stable_kind_registered() {
        let registry = DexRegistry::builtin().unwrap();
        for kind in CurveStableKind::ALL {
            let found = registry
                .entries()
                .any(|e| e.protocol == ProtocolVariant::CurveStable { kind });
            assert!(found, "{:?} missing", kind);
        }
        let crypto = registry
            .entries()
            .filter(|e| e.protocol.family() == ProtocolFamily::CurveCrypto)
            .count();
        assert_eq!(crypto, 3);
    }

    #[test]
    fn test_unknown_protocol() {
        let registry = DexRegistry::builtin().unwrap();
        assert_eq!(
            registry.id_of("QUICKSWAP"),
            Err(EngineError::UnknownProtocol("QUICKSWAP".into()))
        );
        assert!(matches!(
            registry.entry_by_id(200),
            Err(EngineError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_entries_sorted_by_id() {
        let registry = DexRegistry::builtin().unwrap();
        let ids: Vec<u8> = registry.entries().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let json = r#"{
            "A": { "id": 1, "name": "A", "protocol": { "family": "curve_crypto" } },
            "B": { "id": 1, "name": "B", "protocol": { "family": "curve_crypto" } }
        }"#;
        let err = DexRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { id: 1, .. }));
    }
}
