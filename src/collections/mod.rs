//! Collection wrappers - map/set semantics over the raw table engine
//!
//! The engine permits duplicate keys by design; these wrappers make the
//! choice a type: `Dict` and `Set` enforce uniqueness, `MultiMap` exposes
//! the duplicates.

mod dict;
mod multimap;
mod set;


pub use dict::Dict;
pub use multimap::MultiMap;
pub use set::Set;
