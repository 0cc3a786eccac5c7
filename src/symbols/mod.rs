//! Symbol resolution table: imported-symbol name to host address.
//!
//! The table is assembled once at start-up from the default entries plus
//! whatever the graphics and audio collaborators contribute, and never
//! changes afterwards. Duplicate names are rejected while building it.

pub mod defaults;

use std::collections::HashMap;

use thiserror::Error as ThisError;

use crate::abi::stubs::StubKind;

#[derive(ThisError, Debug, PartialEq, Eq)]
pub enum TableError {
    #[error("symbol `{name}` registered twice ({first:?} and {second:?})")]
    Duplicate {
        name: String,
        first: Origin,
        second: Origin,
    },

    #[error("symbol `{name}` has a null address")]
    NullAddress { name: String },
}

pub type Result<T> = std::result::Result<T, TableError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Data,
}

/// Where an entry comes from, for auditing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Host C library, passed through unchanged.
    Libc,
    /// Host reimplementation with the foreign semantics.
    Hook,
    /// Calling-convention helper routines.
    AbiHelper,
    Codec,
    Bridge,
    Audio,
    Graphics,
    /// Constant-return stub.
    Stub(StubKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub address: usize,
    pub kind: SymbolKind,
    pub origin: Origin,
}

impl SymbolEntry {
    pub fn function(name: impl Into<String>, address: usize, origin: Origin) -> Self {
        Self {
            name: name.into(),
            address,
            kind: SymbolKind::Function,
            origin,
        }
    }

    pub fn data(name: impl Into<String>, address: usize, origin: Origin) -> Self {
        Self {
            name: name.into(),
            address,
            kind: SymbolKind::Data,
            origin,
        }
    }

    pub fn stub(name: impl Into<String>, kind: StubKind) -> Self {
        Self::function(name, kind.address(), Origin::Stub(kind))
    }
}

/// Something that contributes entries to the table.
pub trait SymbolProvider {
    fn symbols(&self) -> Vec<SymbolEntry>;
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn builder() -> SymbolTableBuilder {
        SymbolTableBuilder::default()
    }

    /// The default host table plus the collaborators' entries.
    pub fn with_defaults(providers: &[&dyn SymbolProvider]) -> Result<Self> {
        let mut builder = Self::builder();
        builder.extend(defaults::entries())?;
        for provider in providers {
            builder.provide(*provider)?;
        }
        Ok(builder.build())
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn resolve(&self, name: &str) -> Option<usize> {
        self.get(name).map(|entry| entry.address)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }

    /// Entries bound to a constant-return stub, whoever contributed them.
    pub fn stubs(&self) -> impl Iterator<Item = (&SymbolEntry, StubKind)> {
        self.entries.iter().filter_map(|entry| match entry.origin {
            Origin::Stub(kind) => Some((entry, kind)),
            _ => StubKind::ALL
                .iter()
                .find(|kind| kind.address() == entry.address)
                .map(|kind| (entry, *kind)),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
}

impl SymbolTableBuilder {
    pub fn insert(&mut self, entry: SymbolEntry) -> Result<&mut Self> {
        if entry.address == 0 {
            return Err(TableError::NullAddress { name: entry.name });
        }
        if let Some(&existing) = self.index.get(&entry.name) {
            return Err(TableError::Duplicate {
                first: self.entries[existing].origin,
                second: entry.origin,
                name: entry.name,
            });
        }
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(self)
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = SymbolEntry>) -> Result<&mut Self> {
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(self)
    }

    pub fn provide(&mut self, provider: &dyn SymbolProvider) -> Result<&mut Self> {
        self.extend(provider.symbols())
    }

    pub fn build(self) -> SymbolTable {
        SymbolTable {
            entries: self.entries,
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn first() {}
    extern "C" fn second() {}

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = SymbolTable::builder();
        builder
            .insert(SymbolEntry::function("rmdir", first as *const () as usize, Origin::Hook))
            .expect("first insert");
        let err = builder
            .insert(SymbolEntry::function("rmdir", second as *const () as usize, Origin::Libc))
            .expect_err("duplicate");
        assert_eq!(
            err,
            TableError::Duplicate {
                name: "rmdir".into(),
                first: Origin::Hook,
                second: Origin::Libc,
            }
        );
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let mut builder = SymbolTable::builder();
        builder
            .insert(SymbolEntry::function("strlen", first as *const () as usize, Origin::Libc))
            .expect("insert");
        let table = builder.build();
        assert_eq!(table.resolve("strlen"), Some(first as *const () as usize));
        assert_eq!(table.resolve("STRLEN"), None);
        assert_eq!(table.resolve("strle"), None);
    }

    #[test]
    fn null_addresses_are_rejected() {
        let mut builder = SymbolTable::builder();
        let err = builder
            .insert(SymbolEntry::data("nothing", 0, Origin::Hook))
            .expect_err("null");
        assert!(matches!(err, TableError::NullAddress { .. }));
    }

    #[test]
    fn default_table_builds_without_duplicates() {
        let table = SymbolTable::with_defaults(&[]).expect("default table");
        assert!(table.len() > 300);
        for entry in table.iter() {
            assert_ne!(entry.address, 0, "{} has no address", entry.name);
            assert_eq!(table.resolve(&entry.name), Some(entry.address));
        }
    }

    #[test]
    fn every_stub_is_listed() {
        let table = SymbolTable::with_defaults(&[]).expect("default table");
        let stubs: Vec<_> = table.stubs().map(|(e, _)| e.name.as_str()).collect();
        assert!(stubs.contains(&"sched_get_priority_max"));
        assert!(stubs.contains(&"getenv"));
        assert!(!stubs.contains(&"strlen"));
    }
}
