//! Contract storage modeled as an indirection over the data section.
//!
//! Each storage slot key (hex form of the 256-bit key) maps to the data
//! symbol holding the value of its *first* write in the transaction; later
//! writes to the same key are deliberately ignored and later `SLOAD`s
//! observe the original value. Reads of never-written keys materialize a
//! zero constant. Both are modeling limitations of the snapshot scheme, not
//! general EVM storage semantics.
//!
//! Transient storage (`TSTORE`/`TLOAD`) uses the same mechanism in a second
//! keyspace. Both keyspaces reset at transaction boundaries; the data
//! section does not.

use crate::data_section::DataSection;
use std::collections::HashMap;
use zevm_primitives::Word256;

/// Which keyspace a storage access targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Persistent,
    Transient,
}

/// Per-transaction slot-key to data-symbol map.
#[derive(Debug, Default, Clone)]
pub struct StorageSection {
    persistent: HashMap<String, String>,
    transient: HashMap<String, String>,
}

impl StorageSection {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_mut(&mut self, kind: StorageKind) -> &mut HashMap<String, String> {
        match kind {
            StorageKind::Persistent => &mut self.persistent,
            StorageKind::Transient => &mut self.transient,
        }
    }

    /// Record a store. The first write to a key interns `value` and maps the
    /// key to its symbol; re-writes return the existing symbol unchanged.
    pub fn store(
        &mut self,
        kind: StorageKind,
        key: &Word256,
        value: Word256,
        data: &mut DataSection,
    ) -> String {
        let key = key.to_hex();
        if let Some(symbol) = self.map_mut(kind).get(&key) {
            return symbol.clone();
        }
        let symbol = data.add(value);
        self.map_mut(kind).insert(key, symbol.clone());
        symbol
    }

    /// Resolve a load. Unknown keys are bound to a zero constant.
    pub fn load(&mut self, kind: StorageKind, key: &Word256, data: &mut DataSection) -> String {
        let key = key.to_hex();
        if let Some(symbol) = self.map_mut(kind).get(&key) {
            return symbol.clone();
        }
        let symbol = data.add(Word256::ZERO);
        self.map_mut(kind).insert(key, symbol.clone());
        symbol
    }

    /// Drop all key bindings (transaction boundary).
    pub fn reset(&mut self) {
        self.persistent.clear();
        self.transient.clear();
    }
}
