//! Rime core: the value word and the symbol table
//!
//! Key design principles:
//! - `Value`: one machine word, low-nibble type tag, immediates encoded
//!   inline, heap objects as aligned pointers
//! - `Symbol`: an interned identifier; the table lives for the whole
//!   process and ids are stable for the run
//!
//! Everything above this crate (object model, invocation engine, fibers)
//! speaks in `Value`s and `Symbol`s; nothing here knows what a heap object
//! looks like inside.

pub mod symbol;
pub mod value;

pub use symbol::{Symbol, SymbolError, intern, symbol_name};
pub use value::{Kind, Value};
