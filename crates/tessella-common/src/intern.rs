//! String interning service.
//!
//! Tag keys and values repeat heavily across a map dataset (`highway`,
//! `building`, `yes`). Objects and compiled selectors store [`Symbol`] handles
//! instead of strings, so tag comparisons become integer comparisons.
//!
//! The service is injected through the [`Interner`] trait rather than living in
//! a global table. The object store owns one and the stylesheet compiler
//! interns its selector literals through the same instance.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// A stable handle for an interned string.
///
/// Two symbols from the same [`Interner`] are equal iff their strings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub u32);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interface of the string-interning collaborator.
pub trait Interner: Send + Sync {
    /// Return the handle for `text`, allocating one if it has not been seen.
    fn intern(&self, text: &str) -> Symbol;

    /// Return the handle for `text` only if it was interned before.
    ///
    /// Lets read-only callers test tags without growing the table.
    fn get(&self, text: &str) -> Option<Symbol>;

    /// Return the string behind `symbol`, or `None` for a foreign handle.
    fn lookup(&self, symbol: Symbol) -> Option<Arc<str>>;
}

#[derive(Debug, Default)]
struct Table {
    ids: HashMap<Arc<str>, Symbol>,
    strings: Vec<Arc<str>>,
}

/// The default [`Interner`]: a growable table behind a read-write lock.
///
/// Symbols are handed out sequentially from zero, so a table filled in the
/// same order always produces the same handles.
#[derive(Debug, Default)]
pub struct StringTable {
    table: RwLock<Table>,
}

impl StringTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct strings interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().strings.len()
    }

    /// Returns true if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Interner for StringTable {
    fn intern(&self, text: &str) -> Symbol {
        if let Some(symbol) = self.get(text) {
            return symbol;
        }

        let mut table = self.table.write();
        // Another writer may have won the race between the two locks.
        if let Some(&symbol) = table.ids.get(text) {
            return symbol;
        }
        let symbol = Symbol(u32::try_from(table.strings.len()).unwrap_or(u32::MAX));
        let shared: Arc<str> = Arc::from(text);
        table.strings.push(Arc::clone(&shared));
        let _ = table.ids.insert(shared, symbol);
        symbol
    }

    fn get(&self, text: &str) -> Option<Symbol> {
        self.table.read().ids.get(text).copied()
    }

    fn lookup(&self, symbol: Symbol) -> Option<Arc<str>> {
        let index = usize::try_from(symbol.0).ok()?;
        self.table.read().strings.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_returns_same_symbol() {
        let table = StringTable::new();
        let a = table.intern("highway");
        let b = table.intern("highway");
        let c = table.intern("building");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_round_trip() {
        let table = StringTable::new();
        let symbol = table.intern("motorway");
        assert_eq!(table.lookup(symbol).as_deref(), Some("motorway"));
        assert_eq!(table.lookup(Symbol(99)), None);
    }

    #[test]
    fn test_get_does_not_allocate() {
        let table = StringTable::new();
        assert_eq!(table.get("name"), None);
        assert!(table.is_empty());
        let symbol = table.intern("name");
        assert_eq!(table.get("name"), Some(symbol));
    }
}
