//! `product-pulse` library crate.
//!
//! The binary (`pulse`) is a thin wrapper around this library so that:
//!
//! - the analysis core is testable without spawning processes
//! - the same functions back the CLI, exports and saved analyses
//!
//! Typical flow: load a [`domain::Dataset`] (CSV, store or sample), run
//! [`analysis::clean`] and [`analysis::classify`], then [`analysis::analyze_trend`]
//! or [`analysis::segment`], and narrate with [`narrate::Narrator`].

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod narrate;
pub mod report;
pub mod store;
pub mod telemetry;
