//! Filter and sort DSL for RELQ.
//!
//! This crate defines the typed, JSON-shaped filter/sort specification that
//! the compiler in `relq-core` consumes: a recursively nested filter tree
//! with boolean grouping markers (`and`/`or`), dotted relationship paths,
//! per-field operator maps, and an ordered sort list.

pub mod error;
pub mod filter;
pub mod sort;
pub mod value;

pub use error::Error;
pub use filter::{BoolOp, FilterEntry, FilterKey, FilterNode, FilterTree, Operand, Operator};
pub use sort::{parse_sort, SortEntry, SortOrder};
pub use value::Value;
