//! Symbol Interning
//!
//! One process-wide table mapping names to compact ids and back. Ids are
//! stable for the lifetime of the run and symbols are never collected, so
//! the backing strings are leaked into the heap once and handed out as
//! `&'static str`.
//!
//! The table is created on first use and guarded by a single mutex; both
//! directions of the mapping are updated under the same lock, so an id
//! handed out by `intern` is always resolvable by `symbol_name`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock};

/// An interned identifier. Compares by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u64);

impl Symbol {
    /// Rebuild a symbol from a raw id (used by the value encoding).
    #[inline(always)]
    pub const fn from_id(id: u64) -> Symbol {
        Symbol(id)
    }

    #[inline(always)]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match symbol_name(*self) {
            Ok(name) => write!(f, "{name}"),
            Err(_) => write!(f, "<sym:{}>", self.0),
        }
    }
}

/// Failure to resolve a symbol id that did not originate from this table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    pub id: u64,
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown symbol id {}", self.id)
    }
}

impl std::error::Error for SymbolError {}

struct TableInner {
    ids: HashMap<&'static str, u64>,
    names: Vec<&'static str>,
}

fn table() -> &'static Mutex<TableInner> {
    static TABLE: OnceLock<Mutex<TableInner>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mutex::new(TableInner {
            ids: HashMap::new(),
            names: Vec::new(),
        })
    })
}

/// Intern a name, returning its stable id.
///
/// The same string yields the same symbol for the rest of the process
/// lifetime. Safe to call from any thread or fiber.
pub fn intern(name: &str) -> Symbol {
    let mut inner = table().lock().expect("symbol table lock poisoned");
    if let Some(&id) = inner.ids.get(name) {
        return Symbol(id);
    }
    // Symbols are never collected; leak the backing string once.
    let stored: &'static str = Box::leak(name.to_owned().into_boxed_str());
    let id = inner.names.len() as u64;
    inner.names.push(stored);
    inner.ids.insert(stored, id);
    Symbol(id)
}

/// Reverse lookup. Fails only for ids that were never handed out by
/// [`intern`] in this process.
pub fn symbol_name(sym: Symbol) -> Result<&'static str, SymbolError> {
    let inner = table().lock().expect("symbol table lock poisoned");
    inner
        .names
        .get(sym.0 as usize)
        .copied()
        .ok_or(SymbolError { id: sym.0 })
}
