//! Common utilities for the Tessella tile renderer.
//!
//! This crate provides shared infrastructure used by all renderer components:
//! - **Warning System** - deduplicated warnings for unsupported stylesheet features
//! - **String Interning** - the injected service that turns repeated tag keys and
//!   values into cheap, comparable [`intern::Symbol`] handles

pub mod intern;
pub mod warning;

pub use intern::{Interner, StringTable, Symbol};
