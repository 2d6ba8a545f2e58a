//! Append-only table of 256-bit constants referenced from the emitted text.
//!
//! Symbols are `data_var_<n>` in insertion order; a value interned twice
//! resolves to its original symbol (content-addressed), so transpiling the
//! same trace twice yields byte-identical output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zevm_primitives::Word256;

/// A data-section entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVariable {
    pub name: String,
    pub value: Word256,
}

/// Append-only, deduplicated constant store.
#[derive(Debug, Default, Clone)]
pub struct DataSection {
    values: Vec<Word256>,
    index: HashMap<Word256, usize>,
}

impl DataSection {
    pub fn new() -> Self {
        Self::default()
    }

    fn symbol(index: usize) -> String {
        format!("data_var_{index}")
    }

    /// Intern a constant, returning its symbol. Idempotent: the same value
    /// always maps to the same symbol, assigned on first insertion.
    pub fn add(&mut self, value: Word256) -> String {
        if let Some(&index) = self.index.get(&value) {
            return Self::symbol(index);
        }
        let index = self.values.len();
        self.values.push(value);
        self.index.insert(value, index);
        Self::symbol(index)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = DataVariable> + '_ {
        self.values.iter().enumerate().map(|(i, &value)| DataVariable {
            name: Self::symbol(i),
            value,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
