//! Domain types used throughout the crate.
//!
//! - the typed columnar table (`Dataset`, `Column`, `Value`)
//! - column roles and analysis options
//! - trend / segmentation results

pub mod table;
pub mod types;

pub use table::*;
pub use types::*;
