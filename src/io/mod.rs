//! Input/output helpers.
//!
//! - CSV ingest with type inference (`ingest`)
//! - result exports to CSV (`export`)
//! - JSON documents (`json`)

pub mod export;
pub mod ingest;
pub mod json;

pub use export::*;
pub use ingest::*;
pub use json::*;
